//! The folio server binary: store + authenticator + curator behind an
//! axum router with one WebSocket endpoint and a small admin surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use folio::Curator;
use folio::auth::{Authenticator, OpenAuthenticator};
use folio::config::CuratorConfig;
use folio::document::DocumentId;
use folio::store::{FileStore, MemoryStore, Store};
use serde::Deserialize;
use tracing::{error, info};

mod cli;
mod ws;

use cli::{Args, StoreKind};

/// Deadline for admin fan-out across all binders.
const ADMIN_DEADLINE: Duration = Duration::from_secs(5);

pub struct AppState {
    pub curator: Curator,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(err) = run(Args::parse()).await {
        error!(%err, "server failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            let bytes = tokio::fs::read(path).await?;
            serde_json::from_slice::<CuratorConfig>(&bytes)?
        }
        None => CuratorConfig::default(),
    };

    let store: Arc<dyn Store> = match args.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::File => Arc::new(FileStore::open(&args.data_dir).await?),
    };
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(OpenAuthenticator::new(args.access.into()));

    let state = Arc::new(AppState {
        curator: Curator::new(config, store, authenticator),
    });

    let app = Router::new()
        .route("/socket", get(socket_handler))
        .route("/admin/users", get(list_users))
        .route("/admin/kick", post(kick_user))
        .with_state(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening; use CTRL+C to close");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    state.curator.close().await;
    info!("all binders drained");
    Ok(())
}

async fn socket_handler(
    State(state): State<Arc<AppState>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| ws::handle_socket(state, socket))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Response {
    match state.curator.get_users(ADMIN_DEADLINE).await {
        Ok(users) => Json(users).into_response(),
        Err(err) => (StatusCode::GATEWAY_TIMEOUT, err.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct KickRequest {
    document_id: String,
    user_id: String,
}

async fn kick_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<KickRequest>,
) -> Response {
    let document_id = DocumentId::new(request.document_id);
    match state
        .curator
        .kick_user(&document_id, &request.user_id, ADMIN_DEADLINE)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) if err.is_not_found() => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Err(err) => (StatusCode::GATEWAY_TIMEOUT, err.to_string()).into_response(),
    }
}
