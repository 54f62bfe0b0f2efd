//! The client-side handle to one binder session.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::{BinderCommand, BinderError};
use crate::document::Document;
use crate::transform::Transform;
use crate::{Error, Result};

/// Server-assigned identifier for one live session on one binder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub(super) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub user_id: String,
    pub session_id: SessionId,
}

/// A presence broadcast: someone joined, left, or shared ephemeral state
/// such as a cursor position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub client: ClientIdentity,
    /// False exactly once, when the session leaves.
    pub active: bool,
    /// Client-defined payload; the server never interprets it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// What a subscriber receives on its outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberEvent {
    /// Transforms accepted from other sessions, in version order.
    Transforms(Vec<Transform>),
    /// A presence update from another session.
    Update(UserUpdate),
}

/// One live subscription to a document.
///
/// Returned by the curator's join operations. Holds the snapshot taken at
/// subscribe time, the outbound event queue, and the path back into the
/// binder for submitting transforms and presence.
///
/// Dropping the subscription leaves the session; the binder broadcasts
/// the departure to everyone else.
pub struct Subscription {
    pub(super) client: ClientIdentity,
    pub(super) document: Document,
    pub(super) version: u64,
    pub(super) read_only: bool,
    pub(super) events: mpsc::Receiver<SubscriberEvent>,
    pub(super) commands: mpsc::Sender<BinderCommand>,
}

impl Subscription {
    pub fn client(&self) -> &ClientIdentity {
        &self.client
    }

    pub fn session_id(&self) -> &SessionId {
        &self.client.session_id
    }

    /// The document snapshot taken when this session subscribed.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The document version of the snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Receive the next outbound event. Returns `None` once the binder
    /// has dropped this session (close, kick, or queue overflow).
    pub async fn recv(&mut self) -> Option<SubscriberEvent> {
        self.events.recv().await
    }

    /// Submit a transform, waiting up to `deadline` for the correction.
    ///
    /// On success the returned version is the one the binder finally
    /// assigned, which is also what every other subscriber sees.
    pub async fn send_transform(&self, transform: Transform, deadline: Duration) -> Result<u64> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = BinderCommand::Transform {
            session_id: self.client.session_id.clone(),
            transform,
            reply: reply_tx,
        };
        request(&self.commands, command, reply_rx, deadline).await?
    }

    /// Broadcast a presence payload to every other subscriber.
    pub async fn send_update(
        &self,
        payload: serde_json::Value,
        deadline: Duration,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = BinderCommand::Update {
            session_id: self.client.session_id.clone(),
            payload,
            reply: reply_tx,
        };
        request(&self.commands, command, reply_rx, deadline).await?
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Best effort; a closed binder has already forgotten the session.
        let _ = self.commands.try_send(BinderCommand::Unsubscribe {
            session_id: self.client.session_id.clone(),
        });
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("client", &self.client)
            .field("document", &self.document.id)
            .field("version", &self.version)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Send a command and await its reply under one deadline.
pub(super) async fn request<T>(
    commands: &mpsc::Sender<BinderCommand>,
    command: BinderCommand,
    reply: oneshot::Receiver<T>,
    deadline: Duration,
) -> Result<T> {
    let exchange = async {
        commands
            .send(command)
            .await
            .map_err(|_| Error::Binder(BinderError::Closing))?;
        reply.await.map_err(|_| Error::Binder(BinderError::Closing))
    };
    match tokio::time::timeout(deadline, exchange).await {
        Ok(result) => result,
        Err(_) => Err(Error::Binder(BinderError::Timeout)),
    }
}
