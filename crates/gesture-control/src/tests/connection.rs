use crate::{
    App, AppError, AppResult, Inbound, serve_connection,
    tests::fakes::test_app,
};

use gesture_control_core::Notification;

use std::{convert::Infallible, panic::Location, time::Duration};

use error_location::ErrorLocation;
use futures_util::{Sink, Stream, sink, stream};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

fn text(json: &str) -> AppResult<Inbound> {
    Ok(Inbound::Text(json.to_string()))
}

fn reply_sink(tx: mpsc::UnboundedSender<String>) -> impl Sink<String, Error = Infallible> {
    sink::unfold(tx, |tx, reply: String| async move {
        let _ = tx.send(reply);
        Ok::<_, Infallible>(tx)
    })
}

/// Serve `incoming` to completion and collect every reply.
#[allow(clippy::unwrap_used)]
async fn serve_all(app: &App, incoming: impl Stream<Item = AppResult<Inbound>>) -> Vec<String> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    serve_connection(
        Uuid::new_v4(),
        incoming,
        reply_sink(tx),
        app.dispatcher.clone(),
        app.notifications.subscribe(),
    )
    .await
    .unwrap();

    let mut replies = Vec::new();
    while let Ok(reply) = rx.try_recv() {
        replies.push(reply);
    }
    replies
}

#[allow(clippy::unwrap_used)]
fn parsed(replies: &[String]) -> Vec<Value> {
    replies
        .iter()
        .map(|reply| serde_json::from_str(reply).unwrap())
        .collect()
}

/// WHAT: Each request gets exactly one response, in request order
/// WHY: The client pairs responses with requests by position
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_request_sequence_when_serving_then_responses_in_order() {
    // Given
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    let incoming = stream::iter(vec![
        text(r#"{"ping": true}"#),
        text("garbage"),
        text(r#"{"getCamera": true}"#),
        text(r#"{"getCamerasDisponiveis": true}"#),
    ]);

    // When
    let replies = serve_all(&app, incoming).await;

    // Then
    assert_eq!(
        parsed(&replies),
        vec![
            json!({"pong": true}),
            json!({"error": "invalid input"}),
            json!({"camera_selecionada": null}),
            json!({"cameras_disponiveis": ["Test Pattern"]}),
        ]
    );
}

/// WHAT: Binary frames are read as UTF-8 JSON; non-UTF-8 is invalid input
/// WHY: Some clients send JSON in binary frames
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_binary_frames_when_serving_then_utf8_decoded() {
    // Given
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    let incoming = stream::iter(vec![
        Ok(Inbound::Binary(br#"{"ping": true}"#.to_vec())),
        Ok(Inbound::Binary(vec![0xFF, 0xFE, 0x00])),
    ]);

    // When
    let replies = serve_all(&app, incoming).await;

    // Then
    assert_eq!(
        parsed(&replies),
        vec![json!({"pong": true}), json!({"error": "invalid input"})]
    );
}

/// WHAT: A close frame or a receive error ends the loop
/// WHY: Frames after close must not be processed
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_close_or_error_when_serving_then_loop_ends() {
    // Given
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    let closed = stream::iter(vec![
        text(r#"{"ping": true}"#),
        Ok(Inbound::Close),
        text(r#"{"ping": true}"#),
    ]);
    let failed = stream::iter(vec![
        Err(AppError::Transport {
            reason: "reset".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
        text(r#"{"ping": true}"#),
    ]);

    // When
    let after_close = serve_all(&app, closed).await;
    let after_error = serve_all(&app, failed).await;

    // Then
    assert_eq!(after_close.len(), 1);
    assert!(after_error.is_empty());
}

/// WHAT: Gesture notifications are pushed between responses
/// WHY: The client shows detections live without polling
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_gesture_notification_when_idle_then_pushed_to_client() {
    // Given: A connection fed from a channel so it stays open
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    let (in_tx, in_rx) = mpsc::unbounded_channel::<AppResult<Inbound>>();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let incoming = stream::unfold(in_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    });
    let connection = tokio::spawn(serve_connection(
        Uuid::new_v4(),
        incoming,
        reply_sink(out_tx),
        app.dispatcher.clone(),
        app.notifications.subscribe(),
    ));

    // When: A gesture is broadcast, then the client pings and closes
    app.notifications
        .send(Notification::GestureDetected {
            gesture: "A".to_string(),
        })
        .unwrap();
    let pushed = tokio::time::timeout(WAIT, out_rx.recv()).await.unwrap().unwrap();

    in_tx.send(text(r#"{"ping": true}"#)).unwrap();
    let pong = tokio::time::timeout(WAIT, out_rx.recv()).await.unwrap().unwrap();

    in_tx.send(Ok(Inbound::Close)).unwrap();
    tokio::time::timeout(WAIT, connection)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Then
    assert_eq!(
        serde_json::from_str::<Value>(&pushed).unwrap(),
        json!({"gestoDetectado": "A"})
    );
    assert_eq!(
        serde_json::from_str::<Value>(&pong).unwrap(),
        json!({"pong": true})
    );
}
