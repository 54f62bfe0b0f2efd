//! Tests for the curator: access control, binder lifecycle, admin
//! fan-out, and shutdown.

use std::sync::Arc;
use std::time::Duration;

use folio::Curator;
use folio::auth::{AccessLevel, Authenticator, OpenAuthenticator, TokenAuthenticator, TokenGrant};
use folio::binder::SubscriberEvent;
use folio::config::{BinderConfig, CuratorConfig};
use folio::document::DocumentId;
use folio::store::{MemoryStore, Store};
use folio::transform::Transform;

use crate::helpers::DEADLINE;

fn open_curator(store: Arc<MemoryStore>) -> Curator {
    Curator::new(
        CuratorConfig::default(),
        store as Arc<dyn Store>,
        Arc::new(OpenAuthenticator::allow_all()) as Arc<dyn Authenticator>,
    )
}

#[tokio::test]
async fn create_then_edit_share_one_binder() {
    let store = Arc::new(MemoryStore::new());
    let curator = open_curator(Arc::clone(&store));

    let creator = curator.create("alice", "", "hello world").await.unwrap();
    let id = creator.document().id.clone();
    assert_eq!(store.read(&id).await.unwrap().content, "hello world");

    let mut editor = curator.edit("bob", "", &id).await.unwrap();
    assert_eq!(editor.document().content, "hello world");

    // One binder serves both sessions: bob hears alice's edit.
    creator
        .send_transform(
            Transform {
                position: 6,
                delete: 5,
                insert: "universe".to_string(),
                version: 2,
            },
            DEADLINE,
        )
        .await
        .unwrap();

    loop {
        match editor.recv().await {
            Some(SubscriberEvent::Transforms(transforms)) => {
                assert_eq!(transforms[0].version, 2);
                assert_eq!(transforms[0].insert, "universe");
                break;
            }
            Some(SubscriberEvent::Update(_)) => continue,
            None => panic!("editor dropped"),
        }
    }

    assert_eq!(curator.open_documents().await, vec![id]);
    curator.close().await;
}

#[tokio::test]
async fn read_joins_are_read_only() {
    let store = Arc::new(MemoryStore::new());
    let curator = open_curator(store);

    let creator = curator.create("alice", "", "hello world").await.unwrap();
    let id = creator.document().id.clone();

    let reader = curator.read("bob", "", &id).await.unwrap();
    assert!(reader.read_only());
    let err = reader
        .send_transform(Transform::insert(0, "x", 2), DEADLINE)
        .await
        .unwrap_err();
    assert!(err.is_read_only());

    curator.close().await;
}

#[tokio::test]
async fn editing_a_missing_document_fails() {
    let store = Arc::new(MemoryStore::new());
    let curator = open_curator(store);

    let err = curator
        .edit("alice", "", &DocumentId::new("no-such-doc"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    curator.close().await;
}

#[tokio::test]
async fn access_levels_gate_each_operation() {
    let store = Arc::new(MemoryStore::new());
    // Seed a document to join against.
    let seeded = folio::document::Document::with_content("hello");
    let id = seeded.id.clone();
    store.create(&seeded).await.unwrap();

    let curator = Curator::new(
        CuratorConfig::default(),
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::new(OpenAuthenticator::new(AccessLevel::Read)) as Arc<dyn Authenticator>,
    );

    assert!(
        curator
            .create("alice", "", "nope")
            .await
            .unwrap_err()
            .is_unauthorized()
    );
    assert!(curator.edit("alice", "", &id).await.unwrap_err().is_unauthorized());
    curator.read("alice", "", &id).await.unwrap();

    curator.close().await;
}

#[tokio::test]
async fn scoped_tokens_grant_exactly_their_document() {
    let store = Arc::new(MemoryStore::new());
    let seeded = folio::document::Document::with_content("hello");
    let id = seeded.id.clone();
    store.create(&seeded).await.unwrap();

    let auth = Arc::new(TokenAuthenticator::new());
    auth.register(
        "share-link",
        TokenGrant {
            level: AccessLevel::Edit,
            document: Some(id.clone()),
        },
    );

    let curator = Curator::new(
        CuratorConfig::default(),
        Arc::clone(&store) as Arc<dyn Store>,
        auth as Arc<dyn Authenticator>,
    );

    curator.edit("alice", "share-link", &id).await.unwrap();
    assert!(
        curator
            .create("alice", "share-link", "other")
            .await
            .unwrap_err()
            .is_unauthorized()
    );
    assert!(
        curator
            .edit("alice", "wrong-token", &id)
            .await
            .unwrap_err()
            .is_unauthorized()
    );

    curator.close().await;
}

#[tokio::test]
async fn admin_operations_span_documents() {
    let store = Arc::new(MemoryStore::new());
    let curator = open_curator(store);

    let a = curator.create("alice", "", "one").await.unwrap();
    let b = curator.create("bob", "", "two").await.unwrap();
    let doc_a = a.document().id.clone();
    let doc_b = b.document().id.clone();
    let _also_a = curator.edit("carol", "", &doc_a).await.unwrap();

    let users = curator.get_users(DEADLINE).await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(
        users[&doc_a],
        vec!["alice".to_string(), "carol".to_string()]
    );
    assert_eq!(users[&doc_b], vec!["bob".to_string()]);

    curator.kick_user(&doc_a, "carol", DEADLINE).await.unwrap();
    let users = curator.get_users(DEADLINE).await.unwrap();
    assert_eq!(users[&doc_a], vec!["alice".to_string()]);

    let err = curator
        .kick_user(&DocumentId::new("missing"), "alice", DEADLINE)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    curator.close().await;
}

#[tokio::test]
async fn failed_binders_leave_the_registry() {
    let store = Arc::new(MemoryStore::new());
    let curator = Curator::new(
        CuratorConfig {
            binder: BinderConfig {
                flush_period_ms: 20,
                max_flush_failures: 1,
                ..BinderConfig::default()
            },
            ..CuratorConfig::default()
        },
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::new(OpenAuthenticator::allow_all()) as Arc<dyn Authenticator>,
    );

    let mut sub = curator.create("alice", "", "doomed").await.unwrap();
    let id = sub.document().id.clone();

    // Lose the backing entry, then dirty the document so the flush loop
    // hits the failure.
    store.remove(&id).unwrap();
    sub.send_transform(Transform::insert(0, "x", 2), DEADLINE)
        .await
        .unwrap();

    // The binder reports fatal, the curator removes it, and the open
    // queues close.
    while sub.recv().await.is_some() {}
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(curator.open_documents().await.is_empty());
    assert!(curator.get_users(DEADLINE).await.unwrap().is_empty());

    curator.close().await;
}

#[tokio::test]
async fn idle_binders_are_reaped() {
    let store = Arc::new(MemoryStore::new());
    let curator = Curator::new(
        CuratorConfig {
            binder: BinderConfig {
                flush_period_ms: 20,
                idle_timeout_ms: 50,
                ..BinderConfig::default()
            },
            ..CuratorConfig::default()
        },
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::new(OpenAuthenticator::allow_all()) as Arc<dyn Authenticator>,
    );

    let id = {
        let sub = curator.create("alice", "", "sleepy").await.unwrap();
        sub.document().id.clone()
    }; // the only subscriber leaves

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(curator.open_documents().await.is_empty());

    // The document itself survives and can be reopened.
    let again = curator.edit("bob", "", &id).await.unwrap();
    assert_eq!(again.document().content, "sleepy");

    curator.close().await;
}

#[tokio::test]
async fn close_drains_every_binder_and_refuses_new_work() {
    let store = Arc::new(MemoryStore::new());
    let curator = open_curator(Arc::clone(&store));

    let sub = curator.create("alice", "", "hello").await.unwrap();
    let id = sub.document().id.clone();
    sub.send_transform(Transform::insert(5, "!", 2), DEADLINE)
        .await
        .unwrap();

    curator.close().await;

    // The last flush landed before close returned.
    assert_eq!(store.read(&id).await.unwrap().content, "hello!");

    let err = curator.create("alice", "", "more").await.unwrap_err();
    assert!(err.is_closing());
    assert!(curator.open_documents().await.is_empty());
}
