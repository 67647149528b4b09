//! Per-client request/response loop.
//!
//! Generic over the inbound frame stream and the outbound text sink so the
//! same loop runs over a WebSocket or over in-memory channels.

use crate::{AppError, AppResult};

use gesture_control_core::{CommandDispatcher, Notification, Response};

use std::{fmt::Display, panic::Location, pin::pin, sync::Arc};

use error_location::ErrorLocation;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One frame received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame carrying one JSON request.
    Text(String),
    /// A binary frame, treated as UTF-8 JSON.
    Binary(Vec<u8>),
    /// The client closed the channel.
    Close,
}

/// Serve one client until it closes the channel or the transport fails.
///
/// Requests are executed strictly one at a time, and each response is sent
/// before the next request is read. Notifications are written only between
/// responses.
#[instrument(skip_all, fields(connection_id = %connection_id))]
pub async fn serve_connection<S, K>(
    connection_id: Uuid,
    incoming: S,
    outgoing: K,
    dispatcher: Arc<CommandDispatcher>,
    mut notifications: broadcast::Receiver<Notification>,
) -> AppResult<()>
where
    S: Stream<Item = AppResult<Inbound>>,
    K: Sink<String>,
    K::Error: Display,
{
    let mut incoming = pin!(incoming);
    let mut outgoing = pin!(outgoing);
    let mut notifications_open = true;
    let mut handled: u64 = 0;

    info!("Client connected");

    loop {
        tokio::select! {
            frame = incoming.next() => {
                let text = match frame {
                    Some(Ok(Inbound::Text(text))) => Some(text),
                    Some(Ok(Inbound::Binary(bytes))) => String::from_utf8(bytes).ok(),
                    Some(Ok(Inbound::Close)) | None => break,
                    Some(Err(e)) => {
                        warn!(error = ?e, "Receive failed, closing connection");
                        break;
                    }
                };

                let response = match text {
                    Some(text) => dispatcher.handle_text(&text).await,
                    None => {
                        warn!("Binary frame is not UTF-8");
                        Response::error("invalid input")
                    }
                };

                send(&mut outgoing, response.encode()).await?;
                handled += 1;
            }
            pushed = notifications.recv(), if notifications_open => match pushed {
                Ok(notification) => {
                    debug!(notification = ?notification, "Pushing notification");
                    send(&mut outgoing, notification.encode()).await?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Client fell behind, notifications dropped");
                }
                Err(RecvError::Closed) => notifications_open = false,
            }
        }
    }

    info!(requests = handled, "Client disconnected");

    Ok(())
}

async fn send<K>(outgoing: &mut K, text: String) -> AppResult<()>
where
    K: Sink<String> + Unpin,
    K::Error: Display,
{
    outgoing
        .send(text)
        .await
        .map_err(|e| AppError::Transport {
            reason: format!("Failed to send message: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
}
