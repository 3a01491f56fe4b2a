use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::ports::AdmissionLimiter;
use crate::application::{RelayHandle, SubscribeRequest, SubscribeUseCase};
use crate::domain::{Clock, ConnectionEvent, ConnectionId};
use crate::infrastructure::FixedWindowRateLimiter;
use crate::presentation::rest::ApiError;

use super::message::{ClientMessage, ServerMessage};

/// WebSocket connection state
pub struct WsState<C: Clock> {
    pub clock: Arc<C>,
    pub relay: RelayHandle,
    pub rate_limiter: Arc<FixedWindowRateLimiter>,
    pub subscribe: SubscribeUseCase<C, FixedWindowRateLimiter>,
}

impl<C: Clock> WsState<C> {
    pub fn new(clock: Arc<C>, relay: RelayHandle, rate_limiter: Arc<FixedWindowRateLimiter>) -> Self {
        let subscribe =
            SubscribeUseCase::new(Arc::clone(&clock), Arc::clone(&rate_limiter), relay.clone());
        WsState {
            clock,
            relay,
            rate_limiter,
            subscribe,
        }
    }
}

/// Router serving the WebSocket endpoint at `/ws`
pub fn create_ws_router<C: Clock + 'static>(state: Arc<WsState<C>>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::<C>))
        .with_state(state)
}

/// Handle WebSocket upgrade. The upgrade itself counts against the peer's
/// request window.
pub async fn ws_handler<C: Clock + 'static>(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<WsState<C>>>,
) -> Response {
    let origin = peer.ip().to_string();

    if let Err(limited) = state.rate_limiter.admit(&origin, state.clock.now_millis()) {
        tracing::warn!(
            origin = %origin,
            retry_after = limited.retry_after_seconds,
            "WebSocket upgrade rate limited"
        );
        return ApiError::rate_limited(limited.retry_after_seconds).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, origin))
}

/// Handle WebSocket connection
async fn handle_socket<C: Clock>(socket: WebSocket, state: Arc<WsState<C>>, origin: String) {
    let (mut sender, mut receiver) = socket.split();
    let id = ConnectionId::new();

    // Everything bound for this client, from the engine or from here
    let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();

    if let Err(e) = state.relay.connect(id, origin.clone(), tx.clone()).await {
        tracing::error!(connection_id = %id, error = %e, "Failed to register connection");
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&ServerMessage::from(event)) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode outbound event");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        if let Err(e) = state.relay.touch(id).await {
            tracing::debug!(connection_id = %id, error = %e, "Closing socket, relay engine stopped");
            break;
        }

        match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Subscribe(payload)) => {
                let request = payload.extra.iter().fold(
                    SubscribeRequest::new(payload.key.clone()),
                    |request, (name, value)| match value.as_str() {
                        Some(field) => request.with_field(name.clone(), field),
                        None => request,
                    },
                );
                if let Err(e) = state.subscribe.execute(id, &origin, request).await {
                    let _ = tx.send(e.to_event(state.clock.now()));
                }
            }
            Ok(ClientMessage::Unsubscribe) => match state.relay.unsubscribe(id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::debug!(connection_id = %id, "Unsubscribe without a subscription");
                }
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Unsubscribe failed");
                }
            },
            Ok(ClientMessage::Ping) => {
                let _ = tx.send(ConnectionEvent::Pong {
                    timestamp: state.clock.now(),
                });
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Invalid client frame");
                let _ = tx.send(ConnectionEvent::error(
                    "Invalid request",
                    Some(json!({ "reason": e.to_string() })),
                    state.clock.now(),
                ));
            }
        }
    }

    // Cleanup
    if let Err(e) = state.relay.disconnect(id).await {
        tracing::debug!(connection_id = %id, error = %e, "Disconnect after engine stopped");
    }
    drop(tx);
    let _ = send_task.await;
}
