//! HTTP surface: the WebSocket control channel and a health probe.

use crate::{AppError, AppResult, Inbound, serve_connection};

use gesture_control_core::{CommandDispatcher, DetectionSession, Notification};

use std::{future::Future, panic::Location, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use error_location::ErrorLocation;
use futures_util::{SinkExt, StreamExt, future};
use serde_json::{Value, json};
use tokio::{
    net::TcpListener,
    sync::{OwnedSemaphorePermit, Semaphore, broadcast},
};
use tower_http::cors::CorsLayer;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Shared handles every route needs.
#[derive(Clone)]
pub struct ServerState {
    pub(crate) dispatcher: Arc<CommandDispatcher>,
    pub(crate) session: Arc<DetectionSession>,
    pub(crate) notifications: broadcast::Sender<Notification>,
    pub(crate) client_slot: Arc<Semaphore>,
}

impl ServerState {
    /// State allowing one connected client at a time.
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        session: Arc<DetectionSession>,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            dispatcher,
            session,
            notifications,
            client_slot: Arc::new(Semaphore::new(1)),
        }
    }
}

/// `GET /` upgrades to the control channel, `GET /health` reports liveness.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(control_channel))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> AppResult<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AppError::Transport {
            reason: format!("Server failed: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
}

async fn health(State(state): State<ServerState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessionActive": state.session.is_active(),
    }))
}

#[instrument(skip_all)]
async fn control_channel(
    State(state): State<ServerState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let permit = match Arc::clone(&state.client_slot).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            warn!("Rejected connection, a client is already connected");
            return (StatusCode::CONFLICT, "another client is already connected").into_response();
        }
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "Upgrading control channel");

    upgrade.on_upgrade(move |socket| handle_socket(socket, state, connection_id, permit))
}

async fn handle_socket(
    socket: WebSocket,
    state: ServerState,
    connection_id: Uuid,
    _permit: OwnedSemaphorePermit,
) {
    let (sender, receiver) = socket.split();
    let incoming = receiver.filter_map(|message| future::ready(inbound(message)));
    let outgoing = sender.with(|text: String| {
        future::ready(Ok::<Message, axum::Error>(Message::Text(text.into())))
    });

    if let Err(e) = serve_connection(
        connection_id,
        incoming,
        outgoing,
        Arc::clone(&state.dispatcher),
        state.notifications.subscribe(),
    )
    .await
    {
        warn!(connection_id = %connection_id, error = ?e, "Connection ended with error");
    }
}

/// Ping and pong frames are answered by the WebSocket layer and skipped here.
fn inbound(message: Result<Message, axum::Error>) -> Option<AppResult<Inbound>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(Inbound::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(bytes)) => Some(Ok(Inbound::Binary(bytes.to_vec()))),
        Ok(Message::Close(_)) => Some(Ok(Inbound::Close)),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
        Err(e) => Some(Err(AppError::Transport {
            reason: format!("Failed to receive message: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })),
    }
}
