use std::sync::Arc;
use std::time::Duration;

use folio::binder::{Binder, BinderEvent, BinderHandle};
use folio::config::BinderConfig;
use folio::document::{Document, DocumentId};
use folio::store::{MemoryStore, Store};
use tokio::sync::mpsc;

/// Generous deadline for binder-boundary calls in tests.
pub const DEADLINE: Duration = Duration::from_secs(1);

/// A binder configuration that flushes and idles quickly enough to test.
pub fn quick_config() -> BinderConfig {
    BinderConfig {
        flush_period_ms: 20,
        idle_timeout_ms: 100,
        ..BinderConfig::default()
    }
}

/// A memory store pre-seeded with one document holding `content`.
pub fn seeded_store(content: &str) -> (Arc<MemoryStore>, DocumentId) {
    let document = Document::with_content(content);
    let id = document.id.clone();
    (Arc::new(MemoryStore::with_documents([document])), id)
}

/// Spawn a binder over a seeded memory store with the default config.
pub async fn spawn_binder(
    content: &str,
) -> (
    BinderHandle,
    Arc<MemoryStore>,
    DocumentId,
    mpsc::Receiver<BinderEvent>,
) {
    spawn_binder_with(content, BinderConfig::default()).await
}

/// Spawn a binder over a seeded memory store with a specific config.
pub async fn spawn_binder_with(
    content: &str,
    config: BinderConfig,
) -> (
    BinderHandle,
    Arc<MemoryStore>,
    DocumentId,
    mpsc::Receiver<BinderEvent>,
) {
    let (store, id) = seeded_store(content);
    let (events_tx, events_rx) = mpsc::channel(10);
    let handle = Binder::spawn(
        id.clone(),
        Arc::clone(&store) as Arc<dyn Store>,
        config,
        events_tx,
    )
    .await
    .expect("spawning a binder over a seeded store");
    (handle, store, id, events_rx)
}
