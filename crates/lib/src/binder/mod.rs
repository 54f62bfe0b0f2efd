//! The per-document arbiter.
//!
//! One binder owns one open document: its content, its version counter,
//! the retained transform history, and the subscriber set. All of that
//! state is mutated from a single task consuming a command queue, so a
//! binder never needs a lock. Clients talk to it through cloneable
//! handles and per-session [`Subscription`]s; the curator hears about its
//! death on an event channel.
//!
//! Serializing submissions is what makes operational transformation
//! tractable: the binder rewrites each incoming transform against the
//! transforms accepted since the submitter's snapshot, assigns it the
//! next version, and fans it out. Slow subscribers are dropped rather
//! than ever blocking the loop.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::config::BinderConfig;
use crate::document::{Document, DocumentId};
use crate::ot::{self, OtError};
use crate::store::Store;
use crate::transform::Transform;
use crate::{Error, Result};

mod errors;
mod subscription;

pub use errors::BinderError;
pub use subscription::{ClientIdentity, SessionId, SubscriberEvent, Subscription, UserUpdate};

use subscription::request;

/// Lifecycle reports a binder sends its curator.
///
/// Both kinds drive the same registry-removal path; they are separate
/// messages so a clean idle exit is never mistaken for a failure.
#[derive(Debug)]
pub enum BinderEvent {
    /// The binder went idle, flushed, and exited cleanly.
    Exited { document_id: DocumentId },
    /// The binder hit an unrecoverable error and shut down.
    Fatal { document_id: DocumentId, error: Error },
}

impl BinderEvent {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            BinderEvent::Exited { document_id } => document_id,
            BinderEvent::Fatal { document_id, .. } => document_id,
        }
    }
}

/// Commands consumed by the binder task.
pub(crate) enum BinderCommand {
    Subscribe {
        user_id: String,
        read_only: bool,
        reply: oneshot::Sender<Subscription>,
    },
    Transform {
        session_id: SessionId,
        transform: Transform,
        reply: oneshot::Sender<Result<u64>>,
    },
    Update {
        session_id: SessionId,
        payload: serde_json::Value,
        reply: oneshot::Sender<Result<()>>,
    },
    GetUsers {
        reply: oneshot::Sender<Vec<String>>,
    },
    KickUser {
        user_id: String,
        reply: oneshot::Sender<()>,
    },
    Unsubscribe {
        session_id: SessionId,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable path into one binder task.
#[derive(Clone)]
pub struct BinderHandle {
    id: DocumentId,
    commands: mpsc::Sender<BinderCommand>,
}

impl BinderHandle {
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Subscribe a client for editing. Fails only when the binder is
    /// draining.
    pub async fn subscribe(&self, user_id: impl Into<String>) -> Result<Subscription> {
        self.subscribe_inner(user_id.into(), false).await
    }

    /// Subscribe a client read-only; submitted transforms are rejected
    /// with [`BinderError::ReadOnlySession`].
    pub async fn subscribe_read_only(&self, user_id: impl Into<String>) -> Result<Subscription> {
        self.subscribe_inner(user_id.into(), true).await
    }

    async fn subscribe_inner(&self, user_id: String, read_only: bool) -> Result<Subscription> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(BinderCommand::Subscribe {
                user_id,
                read_only,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Binder(BinderError::Closing))?;
        reply_rx
            .await
            .map_err(|_| Error::Binder(BinderError::Closing))
    }

    /// List the user ids currently subscribed, deduplicated.
    pub async fn get_users(&self, deadline: Duration) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = BinderCommand::GetUsers { reply: reply_tx };
        request(&self.commands, command, reply_rx, deadline).await
    }

    /// Drop every session belonging to `user_id`. A user with no
    /// sessions is a no-op.
    pub async fn kick_user(&self, user_id: impl Into<String>, deadline: Duration) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = BinderCommand::KickUser {
            user_id: user_id.into(),
            reply: reply_tx,
        };
        request(&self.commands, command, reply_rx, deadline).await
    }

    /// Drain the binder: flush once more, close every subscriber queue,
    /// and stop the task. Idempotent; closing a dead binder returns
    /// immediately. Draining cannot be cancelled.
    pub async fn close(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(BinderCommand::Close { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

/// One subscriber as the binder task sees it.
struct Subscriber {
    client: ClientIdentity,
    read_only: bool,
    queue: mpsc::Sender<SubscriberEvent>,
}

/// The binder task state. Constructed by [`Binder::spawn`], owned by the
/// spawned task, and never shared.
pub struct Binder {
    id: DocumentId,
    document: Document,
    version: u64,
    history: VecDeque<Transform>,
    subscribers: HashMap<SessionId, Subscriber>,
    store: Arc<dyn Store>,
    config: BinderConfig,
    events: mpsc::Sender<BinderEvent>,
    commands: mpsc::Receiver<BinderCommand>,
    commands_tx: mpsc::Sender<BinderCommand>,
    dirty: bool,
    flush_failures: u32,
    idle_deadline: Option<Instant>,
}

impl Binder {
    /// Load the document and start the binder task.
    ///
    /// A freshly bound document sits at version 1 (the snapshot itself);
    /// the first accepted transform produces version 2.
    pub async fn spawn(
        id: DocumentId,
        store: Arc<dyn Store>,
        config: BinderConfig,
        events: mpsc::Sender<BinderEvent>,
    ) -> Result<BinderHandle> {
        let document = store.read(&id).await?;
        let (commands_tx, commands_rx) = mpsc::channel(config.command_queue_capacity.max(1));

        let idle_deadline = Some(Instant::now() + config.idle_timeout());
        let binder = Binder {
            id: id.clone(),
            document,
            version: 1,
            history: VecDeque::new(),
            subscribers: HashMap::new(),
            store,
            config,
            events,
            commands: commands_rx,
            commands_tx: commands_tx.clone(),
            dirty: false,
            flush_failures: 0,
            idle_deadline,
        };
        tokio::spawn(binder.run());

        Ok(BinderHandle {
            id,
            commands: commands_tx,
        })
    }

    /// Main loop: commands, the flush timer, and the idle deadline.
    async fn run(mut self) {
        let id = self.id.clone();
        async move {
            info!(version = self.version, "binder running");

            let mut flush_timer =
                interval(self.config.flush_period().max(Duration::from_millis(1)));
            flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            flush_timer.tick().await; // the first tick fires immediately

            loop {
                let idle_at = self.idle_deadline;
                let idle = async move {
                    match idle_at {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                };

                tokio::select! {
                    maybe_command = self.commands.recv() => match maybe_command {
                        Some(command) => {
                            if self.handle_command(command).await {
                                break;
                            }
                        }
                        // Unreachable while the binder holds its own
                        // sender; kept so a refactor cannot hang the task.
                        None => break,
                    },

                    _ = flush_timer.tick() => {
                        if let Some(error) = self.flush().await {
                            error!(%error, "flush failures exceeded threshold");
                            self.subscribers.clear();
                            let _ = self.events.send(BinderEvent::Fatal {
                                document_id: self.id.clone(),
                                error: error.into(),
                            }).await;
                            break;
                        }
                    }

                    _ = idle, if idle_at.is_some() => {
                        info!("idle timeout, requesting shutdown");
                        let _ = self.flush().await;
                        let _ = self.events.send(BinderEvent::Exited {
                            document_id: self.id.clone(),
                        }).await;
                        break;
                    }
                }
            }
            info!("binder closed");
        }
        .instrument(info_span!("binder", document = %id))
        .await
    }

    /// Returns true when the loop should exit.
    async fn handle_command(&mut self, command: BinderCommand) -> bool {
        match command {
            BinderCommand::Subscribe {
                user_id,
                read_only,
                reply,
            } => {
                let subscription = self.handle_subscribe(user_id, read_only);
                let _ = reply.send(subscription);
            }

            BinderCommand::Transform {
                session_id,
                transform,
                reply,
            } => {
                let result = self.handle_transform(&session_id, transform);
                let _ = reply.send(result);
            }

            BinderCommand::Update {
                session_id,
                payload,
                reply,
            } => {
                let result = self.handle_update(&session_id, payload);
                let _ = reply.send(result);
            }

            BinderCommand::GetUsers { reply } => {
                let mut users: Vec<String> = self
                    .subscribers
                    .values()
                    .map(|s| s.client.user_id.clone())
                    .collect();
                users.sort();
                users.dedup();
                let _ = reply.send(users);
            }

            BinderCommand::KickUser { user_id, reply } => {
                let sessions: Vec<SessionId> = self
                    .subscribers
                    .iter()
                    .filter(|(_, s)| s.client.user_id == user_id)
                    .map(|(sid, _)| sid.clone())
                    .collect();
                if sessions.is_empty() {
                    debug!(user = %user_id, "kick: user not subscribed");
                } else {
                    info!(user = %user_id, sessions = sessions.len(), "kicking user");
                    self.drop_sessions(sessions);
                }
                let _ = reply.send(());
            }

            BinderCommand::Unsubscribe { session_id } => {
                if self.subscribers.contains_key(&session_id) {
                    self.drop_sessions(vec![session_id]);
                }
            }

            BinderCommand::Close { reply } => {
                info!("close requested, draining");
                if let Some(error) = self.flush().await {
                    warn!(%error, "final flush failed");
                }
                // Dropping the queues closes every subscriber.
                self.subscribers.clear();
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    fn handle_subscribe(&mut self, user_id: String, read_only: bool) -> Subscription {
        let session_id = SessionId::generate();
        let client = ClientIdentity {
            user_id,
            session_id: session_id.clone(),
        };
        debug!(session = %session_id, user = %client.user_id, read_only, "subscribing");

        // Announce before inserting so the joiner does not hear itself.
        let overflow = self.broadcast_update(
            UserUpdate {
                client: client.clone(),
                active: true,
                payload: None,
            },
            None,
        );
        self.drop_sessions(overflow);

        let (queue_tx, queue_rx) = mpsc::channel(self.config.subscriber_queue_capacity.max(1));
        self.subscribers.insert(
            session_id,
            Subscriber {
                client: client.clone(),
                read_only,
                queue: queue_tx,
            },
        );
        self.refresh_idle_deadline();

        Subscription {
            client,
            document: self.document.clone(),
            version: self.version,
            read_only,
            events: queue_rx,
            commands: self.commands_tx.clone(),
        }
    }

    /// Accept one transform: rewrite it against concurrent history, apply
    /// it, and fan it out. Returns the version finally assigned.
    fn handle_transform(&mut self, session_id: &SessionId, mut t: Transform) -> Result<u64> {
        let subscriber = self
            .subscribers
            .get(session_id)
            .ok_or(BinderError::UnknownSession)?;
        if subscriber.read_only {
            return Err(BinderError::ReadOnlySession.into());
        }
        if t.version == 0 {
            return Err(OtError::ZeroVersion.into());
        }
        if t.version > self.version + 1 {
            return Err(Error::Binder(BinderError::VersionAhead {
                submitted: t.version,
                current: self.version,
            }));
        }

        if t.version <= self.version {
            // Composed against an older state: walk it across everything
            // accepted since the submitter's snapshot, in order.
            let oldest = self
                .history
                .front()
                .map(|u| u.version)
                .unwrap_or(self.version + 1);
            if t.version < oldest {
                return Err(Error::Binder(BinderError::VersionTooOld {
                    submitted: t.version,
                    oldest,
                }));
            }
            let start = (t.version - oldest) as usize;
            for applied in self.history.iter().skip(start) {
                ot::rewrite(&mut t, applied);
            }
        }

        let next = self.version + 1;
        t.version = next;
        self.document.content = ot::apply(&self.document.content, &t)?;
        self.version = next;
        self.history.push_back(t.clone());
        self.dirty = true;
        trace!(version = next, position = t.position, delete = t.delete, "accepted transform");

        self.broadcast_transform(&t, session_id);
        Ok(next)
    }

    fn handle_update(&mut self, session_id: &SessionId, payload: serde_json::Value) -> Result<()> {
        let subscriber = self
            .subscribers
            .get(session_id)
            .ok_or(BinderError::UnknownSession)?;
        let update = UserUpdate {
            client: subscriber.client.clone(),
            active: true,
            payload: Some(payload),
        };
        let overflow = self.broadcast_update(update, Some(session_id));
        self.drop_sessions(overflow);
        Ok(())
    }

    fn broadcast_transform(&mut self, t: &Transform, submitter: &SessionId) {
        let mut dropped = Vec::new();
        for (session_id, subscriber) in &self.subscribers {
            if session_id == submitter {
                continue;
            }
            let event = SubscriberEvent::Transforms(vec![t.clone()]);
            if let Err(err) = subscriber.queue.try_send(event) {
                if matches!(err, TrySendError::Full(_)) {
                    warn!(session = %session_id, "subscriber queue full, dropping subscriber");
                }
                dropped.push(session_id.clone());
            }
        }
        self.drop_sessions(dropped);
    }

    /// Fan a presence update out to everyone but `skip`. Returns the
    /// sessions whose queues rejected it.
    fn broadcast_update(&self, update: UserUpdate, skip: Option<&SessionId>) -> Vec<SessionId> {
        let mut overflow = Vec::new();
        for (session_id, subscriber) in &self.subscribers {
            if Some(session_id) == skip {
                continue;
            }
            let event = SubscriberEvent::Update(update.clone());
            if subscriber.queue.try_send(event).is_err() {
                overflow.push(session_id.clone());
            }
        }
        overflow
    }

    /// Remove sessions, closing their queues and announcing each
    /// departure. A departure announcement can itself overflow another
    /// slow subscriber, so removals cascade until quiet.
    fn drop_sessions(&mut self, mut ids: Vec<SessionId>) {
        while let Some(session_id) = ids.pop() {
            let Some(subscriber) = self.subscribers.remove(&session_id) else {
                continue;
            };
            debug!(session = %session_id, user = %subscriber.client.user_id, "subscriber left");
            let leave = UserUpdate {
                client: subscriber.client,
                active: false,
                payload: None,
            };
            ids.extend(self.broadcast_update(leave, None));
        }
        self.refresh_idle_deadline();
    }

    fn refresh_idle_deadline(&mut self) {
        if self.subscribers.is_empty() {
            if self.idle_deadline.is_none() {
                self.idle_deadline = Some(Instant::now() + self.config.idle_timeout());
            }
        } else {
            self.idle_deadline = None;
        }
    }

    /// Write the document out if it changed. Returns the error once
    /// consecutive failures pass the configured threshold; short of that,
    /// failures are logged and retried on the next tick.
    async fn flush(&mut self) -> Option<crate::store::StoreError> {
        if !self.dirty {
            return None;
        }
        match self.store.update(&self.document).await {
            Ok(()) => {
                self.dirty = false;
                self.flush_failures = 0;
                // Everything up to the current version is persisted;
                // only the rewrite window needs to stay resident.
                while self.history.len() > self.config.retention_window {
                    self.history.pop_front();
                }
                trace!(version = self.version, retained = self.history.len(), "flushed");
                None
            }
            Err(error) => {
                self.flush_failures += 1;
                warn!(
                    %error,
                    failures = self.flush_failures,
                    threshold = self.config.max_flush_failures,
                    "flush failed"
                );
                (self.flush_failures >= self.config.max_flush_failures).then_some(error)
            }
        }
    }
}
