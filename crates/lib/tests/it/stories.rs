//! Table-driven edit histories replayed through a live binder.
//!
//! Each story submits a sequence of transforms from one session while a
//! fleet of listeners checks that what the binder fans out matches the
//! expected corrected sequence exactly, and that the final content is
//! right. The submitted transforms deliberately include stale versions,
//! so these stories pin down the rewrite rules end to end, including
//! the same-position tie-break (server acceptance order wins).

use folio::binder::SubscriberEvent;
use folio::transform::Transform;

use crate::helpers::{DEADLINE, spawn_binder};

struct Story {
    name: &'static str,
    content: &'static str,
    transforms: Vec<Transform>,
    corrected: Vec<Transform>,
    result: &'static str,
}

fn t(position: usize, delete: usize, insert: &str, version: u64) -> Transform {
    Transform {
        position,
        delete,
        insert: insert.to_string(),
        version,
    }
}

fn stories() -> Vec<Story> {
    vec![
        Story {
            name: "sequential replace",
            content: "hello world",
            transforms: vec![t(6, 5, "universe", 2)],
            corrected: vec![t(6, 5, "universe", 2)],
            result: "hello universe",
        },
        Story {
            name: "concurrent prepend after replace",
            content: "hello world",
            transforms: vec![t(6, 5, "universe", 2), t(0, 0, "super ", 2)],
            corrected: vec![t(6, 5, "universe", 2), t(0, 0, "super ", 3)],
            result: "super hello universe",
        },
        Story {
            name: "same-position inserts concatenate in acceptance order",
            content: "ab",
            transforms: vec![t(1, 0, "XX", 2), t(1, 0, "YY", 2)],
            corrected: vec![t(1, 0, "XX", 2), t(3, 0, "YY", 3)],
            result: "aXXYYb",
        },
        Story {
            name: "overlapping deletes clip to surviving text",
            content: "0123456789",
            transforms: vec![t(2, 4, "", 2), t(4, 4, "Z", 2)],
            corrected: vec![t(2, 4, "", 2), t(2, 2, "Z", 3)],
            result: "01Z89",
        },
        Story {
            name: "stale replace shifts left over an earlier delete",
            content: "hello world",
            transforms: vec![t(0, 6, "", 2), t(6, 5, "WWW", 2)],
            corrected: vec![t(0, 6, "", 2), t(0, 5, "WWW", 3)],
            result: "WWW",
        },
        Story {
            name: "three-way interleaving at mixed versions",
            content: "abc",
            transforms: vec![t(3, 0, "d", 2), t(0, 1, "A", 2), t(2, 1, "", 3)],
            corrected: vec![t(3, 0, "d", 2), t(0, 1, "A", 3), t(2, 1, "", 4)],
            result: "Abd",
        },
    ]
}

#[tokio::test]
async fn stories_converge_for_every_listener() {
    const LISTENERS: usize = 10;

    for story in stories() {
        let (binder, _store, _id, _events) = spawn_binder(story.content).await;

        let mut listeners = Vec::new();
        for i in 0..LISTENERS {
            let mut sub = binder.subscribe(format!("listener-{i}")).await.unwrap();
            let corrected = story.corrected.clone();
            let name = story.name;
            listeners.push(tokio::spawn(async move {
                let mut index = 0;
                while index < corrected.len() {
                    match sub.recv().await {
                        Some(SubscriberEvent::Transforms(transforms)) => {
                            for received in transforms {
                                assert_eq!(
                                    received, corrected[index],
                                    "story {name:?}: transform {index} mismatch"
                                );
                                index += 1;
                            }
                        }
                        Some(SubscriberEvent::Update(_)) => continue,
                        None => panic!("story {name:?}: listener closed after {index}"),
                    }
                }
            }));
        }

        let submitter = binder.subscribe("submitter").await.unwrap();
        for transform in &story.transforms {
            submitter
                .send_transform(transform.clone(), DEADLINE)
                .await
                .unwrap_or_else(|err| panic!("story {:?}: submit failed: {err}", story.name));
        }

        for listener in listeners {
            listener.await.unwrap();
        }

        let witness = binder.subscribe("witness").await.unwrap();
        assert_eq!(
            witness.document().content,
            story.result,
            "story {:?}: wrong final content",
            story.name
        );
        assert_eq!(
            witness.version(),
            1 + story.transforms.len() as u64,
            "story {:?}: wrong final version",
            story.name
        );

        binder.close().await;
    }
}

#[tokio::test]
async fn rewriting_depends_only_on_acceptance_order() {
    // Two clients whose edits commute under rewriting: whichever
    // arrival order the binder sees, the text converges to the same
    // final content because the server assigns the order.
    let (binder, _store, _id, _events) = spawn_binder("hello world").await;
    let a = binder.subscribe("a").await.unwrap();
    let b = binder.subscribe("b").await.unwrap();

    a.send_transform(t(0, 0, "super ", 2), DEADLINE).await.unwrap();
    b.send_transform(t(6, 5, "universe", 2), DEADLINE)
        .await
        .unwrap();

    let witness = binder.subscribe("w").await.unwrap();
    assert_eq!(witness.document().content, "super hello universe");
    binder.close().await;
}
