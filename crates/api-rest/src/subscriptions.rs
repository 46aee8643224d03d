//! WebSocket subscriptions to broadcast topics.
//!
//! `GET /ws/{topic}` upgrades and streams each event on `patients` or `visits` as a
//! JSON text frame. Events published before the upgrade are not replayed; a client
//! that falls behind skips the events it missed.

use crate::error_response;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use relay_core::{Event, EventBroadcaster, Topic};
use tokio::sync::broadcast;

/// Upgrade to a WebSocket streaming one topic.
pub async fn subscribe(
    Path(topic): Path<String>,
    State(events): State<EventBroadcaster>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(topic) = Topic::from_name(&topic) else {
        return error_response(StatusCode::NOT_FOUND, format!("unknown topic '{topic}'"));
    };

    let receiver = events.subscribe(topic);
    ws.on_upgrade(move |socket| stream_events(socket, topic, receiver))
}

async fn stream_events(socket: WebSocket, topic: Topic, mut receiver: broadcast::Receiver<Event>) {
    let (mut ws_write, mut ws_read) = socket.split();
    tracing::info!(topic = %topic, "subscriber connected");

    let mut read_task = tokio::spawn(async move {
        while let Some(message) = ws_read.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    loop {
        tokio::select! {
            result = receiver.recv() => match result {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        if let Err(err) = ws_write.send(Message::Text(json)).await {
                            tracing::debug!(topic = %topic, error = %err, "subscriber write failed");
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(topic = %topic, error = %err, "failed to serialise event"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %topic, skipped, "subscriber lagged; events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut read_task => break,
        }
    }

    read_task.abort();
    tracing::info!(topic = %topic, "subscriber disconnected");
}
