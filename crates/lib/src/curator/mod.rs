//! The binder registry and lifecycle manager.
//!
//! A curator keeps track of a live collection of binders, helps
//! prospective clients locate their target binder (creating one on
//! demand), and is fully in control of binder life cycles: binders that
//! go idle or fail report on an event channel and are removed by the
//! curator's supervisor task. Access control happens here, once, at join
//! time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::auth::{AccessLevel, Authenticator};
use crate::binder::{Binder, BinderEvent, BinderHandle, Subscription};
use crate::config::CuratorConfig;
use crate::document::{Document, DocumentId};
use crate::store::Store;
use crate::{Error, Result};

mod errors;

pub use errors::CuratorError;

type Registry = Arc<RwLock<HashMap<DocumentId, BinderHandle>>>;

/// Creates, locates, and retires binders.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Curator {
    config: CuratorConfig,
    store: Arc<dyn Store>,
    authenticator: Arc<dyn Authenticator>,
    binders: Registry,
    events_tx: mpsc::Sender<BinderEvent>,
    close_tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl Curator {
    /// Create a curator and launch its supervisor task.
    pub fn new(
        config: CuratorConfig,
        store: Arc<dyn Store>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity());
        let (close_tx, close_rx) = mpsc::channel(1);
        let binders: Registry = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(
            supervise(Arc::clone(&binders), events_rx, close_rx)
                .instrument(info_span!("curator")),
        );

        Self {
            config,
            store,
            authenticator,
            binders,
            events_tx,
            close_tx,
        }
    }

    /// Create a fresh document with the given content, persist it, bind
    /// it, and subscribe the creator for editing.
    ///
    /// The document id is always server-assigned.
    pub async fn create(
        &self,
        user_id: &str,
        token: &str,
        content: impl Into<String>,
    ) -> Result<Subscription> {
        self.ensure_open()?;
        self.ensure_access(user_id, token, None, AccessLevel::Create)
            .await?;

        let document = Document::with_content(content);
        info!(document = %document.id, user = %user_id, "creating document");
        self.store.create(&document).await?;

        let handle = self.bind(document.id).await?;
        handle.subscribe(user_id).await
    }

    /// Locate or create a binder for an existing document and subscribe
    /// the client for editing.
    pub async fn edit(
        &self,
        user_id: &str,
        token: &str,
        document_id: &DocumentId,
    ) -> Result<Subscription> {
        self.ensure_open()?;
        self.ensure_access(user_id, token, Some(document_id), AccessLevel::Edit)
            .await?;

        let handle = self.bind(document_id.clone()).await?;
        handle.subscribe(user_id).await
    }

    /// Like [`Curator::edit`], but the subscription is read-only.
    pub async fn read(
        &self,
        user_id: &str,
        token: &str,
        document_id: &DocumentId,
    ) -> Result<Subscription> {
        self.ensure_open()?;
        self.ensure_access(user_id, token, Some(document_id), AccessLevel::Read)
            .await?;

        let handle = self.bind(document_id.clone()).await?;
        handle.subscribe_read_only(user_id).await
    }

    /// Connected users of every open document, keyed by document id.
    /// The deadline is shared across the whole fan-out. Binders that
    /// drain mid-snapshot are skipped rather than failing the listing.
    pub async fn get_users(
        &self,
        deadline: Duration,
    ) -> Result<HashMap<DocumentId, Vec<String>>> {
        let handles: Vec<BinderHandle> =
            { self.binders.read().await.values().cloned().collect() };

        let started = Instant::now();
        let mut list = HashMap::new();
        for handle in handles {
            let remaining = deadline.saturating_sub(started.elapsed());
            match handle.get_users(remaining).await {
                Ok(users) if users.is_empty() => {}
                Ok(users) => {
                    list.insert(handle.id().clone(), users);
                }
                Err(err) if err.is_closing() => {
                    debug!(document = %handle.id(), "binder drained during listing");
                }
                Err(err) => {
                    warn!(document = %handle.id(), %err, "user listing failed");
                    return Err(err);
                }
            }
        }
        Ok(list)
    }

    /// Remove a user from one document. Fails with
    /// [`CuratorError::BinderNotFound`] when the document is not open.
    pub async fn kick_user(
        &self,
        document_id: &DocumentId,
        user_id: &str,
        deadline: Duration,
    ) -> Result<()> {
        let handle = {
            self.binders
                .read()
                .await
                .get(document_id)
                .cloned()
                .ok_or_else(|| CuratorError::BinderNotFound(document_id.clone()))?
        };
        handle.kick_user(user_id, deadline).await
    }

    /// Ids of every document with a live binder.
    pub async fn open_documents(&self) -> Vec<DocumentId> {
        self.binders.read().await.keys().cloned().collect()
    }

    /// Shut the curator and every binder down. Blocks until every binder
    /// has drained. The curator accepts no joins afterwards.
    pub async fn close(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.close_tx.send(done_tx).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.close_tx.is_closed() {
            return Err(CuratorError::Closed.into());
        }
        Ok(())
    }

    async fn ensure_access(
        &self,
        user_id: &str,
        token: &str,
        document: Option<&DocumentId>,
        required: AccessLevel,
    ) -> Result<()> {
        let granted = self
            .authenticator
            .authenticate(user_id, token, document)
            .await;
        if granted < required {
            warn!(user = %user_id, ?granted, ?required, "rejected client");
            return Err(Error::Curator(CuratorError::Unauthorized {
                granted,
                required,
            }));
        }
        Ok(())
    }

    /// Return the live binder for `id`, spawning one (which loads the
    /// document from the store) if none exists. The write lock is held
    /// across the spawn so two concurrent joins can never race a second
    /// binder into existence.
    async fn bind(&self, id: DocumentId) -> Result<BinderHandle> {
        let mut binders = self.binders.write().await;
        if let Some(handle) = binders.get(&id) {
            return Ok(handle.clone());
        }

        let handle = Binder::spawn(
            id.clone(),
            Arc::clone(&self.store),
            self.config.binder.clone(),
            self.events_tx.clone(),
        )
        .await?;
        debug!(document = %id, "spawned binder");
        binders.insert(id, handle.clone());
        Ok(handle)
    }
}

/// The supervisor loop: removes binders that exit or fail, and performs
/// the final close.
async fn supervise(
    binders: Registry,
    mut events_rx: mpsc::Receiver<BinderEvent>,
    mut close_rx: mpsc::Receiver<oneshot::Sender<()>>,
) {
    loop {
        tokio::select! {
            maybe_event = events_rx.recv() => {
                let Some(event) = maybe_event else { break };
                match &event {
                    BinderEvent::Exited { document_id } => {
                        info!(document = %document_id, "binder requested shutdown");
                    }
                    BinderEvent::Fatal { document_id, error } => {
                        error!(document = %document_id, %error, "binder failed");
                    }
                }
                let removed = binders.write().await.remove(event.document_id());
                match removed {
                    Some(handle) => {
                        handle.close().await;
                        info!(document = %event.document_id(), "binder closed");
                    }
                    None => {
                        debug!(document = %event.document_id(), "binder already removed");
                    }
                }
            }

            maybe_done = close_rx.recv() => {
                let Some(done) = maybe_done else { break };
                info!("close requested, draining all binders");
                // Refuse new joins before the reply lands, not after.
                close_rx.close();
                let handles: Vec<(DocumentId, BinderHandle)> =
                    binders.write().await.drain().collect();
                for (id, handle) in handles {
                    handle.close().await;
                    debug!(document = %id, "binder closed");
                }
                let _ = done.send(());
                break;
            }
        }
    }
}
