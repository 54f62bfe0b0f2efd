//! The WebSocket session: wire messages and the per-socket pump.
//!
//! A socket speaks JSON text frames. The first frame must be a join
//! command (`find`, `create`, or `read`); every later frame is a
//! `transform` or `update`. The server answers with typed messages:
//! `document` (the join snapshot), `transforms`, `correction`, `update`,
//! and `error`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use folio::Subscription;
use folio::binder::{SubscriberEvent, UserUpdate};
use folio::document::{Document, DocumentId};
use folio::transform::Transform;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::AppState;

/// How long a submit waits on the binder before reporting a retryable
/// timeout to the client.
const SUBMIT_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join an existing document for editing.
    Find {
        document_id: String,
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        token: String,
    },
    /// Create a new document and join it.
    Create {
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        token: String,
        #[serde(default)]
        content: String,
    },
    /// Join an existing document read-only.
    Read {
        document_id: String,
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        token: String,
    },
    /// Submit an edit.
    Transform { transform: Transform },
    /// Share ephemeral presence state with the other subscribers.
    Update { payload: serde_json::Value },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Document {
        session_id: String,
        document: Document,
        version: u64,
    },
    Transforms {
        transforms: Vec<Transform>,
    },
    Correction {
        version: u64,
    },
    Update {
        update: UserUpdate,
    },
    Error {
        error: String,
    },
}

/// Drive one client socket from join to disconnect.
pub async fn handle_socket(state: Arc<AppState>, mut socket: WebSocket) {
    let mut subscription = match join(&state, &mut socket).await {
        Some(subscription) => subscription,
        None => return,
    };

    let snapshot = ServerMessage::Document {
        session_id: subscription.session_id().to_string(),
        document: subscription.document().clone(),
        version: subscription.version(),
    };
    if send(&mut socket, &snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                let Message::Text(text) = message else { continue };
                if handle_client_frame(&subscription, &mut socket, text.as_str()).await {
                    break;
                }
            }

            outbound = subscription.recv() => {
                let Some(event) = outbound else {
                    // Binder dropped us: kicked, overflowed, or closing.
                    let _ = send(&mut socket, &ServerMessage::Error {
                        error: "session closed by server".to_string(),
                    }).await;
                    break;
                };
                let message = match event {
                    SubscriberEvent::Transforms(transforms) => {
                        ServerMessage::Transforms { transforms }
                    }
                    SubscriberEvent::Update(update) => ServerMessage::Update { update },
                };
                if send(&mut socket, &message).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!(session = %subscription.session_id(), "socket finished");
}

/// Run the join phase. On failure an error frame has already been sent.
async fn join(state: &AppState, socket: &mut WebSocket) -> Option<Subscription> {
    let text = loop {
        match socket.recv().await? {
            Ok(Message::Text(text)) => break text,
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    };

    let command: ClientMessage = match serde_json::from_str(text.as_str()) {
        Ok(command) => command,
        Err(err) => {
            let _ = send(socket, &ServerMessage::Error {
                error: format!("malformed join command: {err}"),
            })
            .await;
            return None;
        }
    };

    let joined = match command {
        ClientMessage::Find {
            document_id,
            user_id,
            token,
        } => {
            state
                .curator
                .edit(&user_id, &token, &DocumentId::new(document_id))
                .await
        }
        ClientMessage::Create {
            user_id,
            token,
            content,
        } => state.curator.create(&user_id, &token, content).await,
        ClientMessage::Read {
            document_id,
            user_id,
            token,
        } => {
            state
                .curator
                .read(&user_id, &token, &DocumentId::new(document_id))
                .await
        }
        _ => {
            let _ = send(socket, &ServerMessage::Error {
                error: "expected a join command first".to_string(),
            })
            .await;
            return None;
        }
    };

    match joined {
        Ok(subscription) => Some(subscription),
        Err(err) => {
            warn!(%err, "join rejected");
            let _ = send(socket, &ServerMessage::Error {
                error: err.to_string(),
            })
            .await;
            None
        }
    }
}

/// Handle one post-join frame. Returns true when the socket should close.
async fn handle_client_frame(
    subscription: &Subscription,
    socket: &mut WebSocket,
    text: &str,
) -> bool {
    let command: ClientMessage = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(err) => {
            let _ = send(socket, &ServerMessage::Error {
                error: format!("malformed command: {err}"),
            })
            .await;
            return true;
        }
    };

    match command {
        ClientMessage::Transform { transform } => {
            match subscription.send_transform(transform, SUBMIT_DEADLINE).await {
                Ok(version) => {
                    send(socket, &ServerMessage::Correction { version })
                        .await
                        .is_err()
                }
                Err(err) => {
                    let _ = send(socket, &ServerMessage::Error {
                        error: err.to_string(),
                    })
                    .await;
                    // A submitter that is confused about versions or
                    // bounds cannot be trusted to continue; one that is
                    // merely slow or stale can retry or rejoin.
                    err.is_invalid_transform() || err.is_version_ahead() || err.is_closing()
                }
            }
        }

        ClientMessage::Update { payload } => {
            match subscription.send_update(payload, SUBMIT_DEADLINE).await {
                Ok(()) => false,
                Err(err) => {
                    let _ = send(socket, &ServerMessage::Error {
                        error: err.to_string(),
                    })
                    .await;
                    err.is_closing()
                }
            }
        }

        _ => {
            let _ = send(socket, &ServerMessage::Error {
                error: "already joined".to_string(),
            })
            .await;
            false
        }
    }
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).expect("server messages always serialize");
    socket.send(Message::Text(json.into())).await
}
