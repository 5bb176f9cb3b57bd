// =============================================================================
// WebSocket Handler — Push-based dashboard updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. An immediate DashboardSnapshot on connect.
//   2. A fresh DashboardSnapshot on every 500 ms tick where the state_version
//      has moved since the last push.
//
// The handler also answers Ping frames with Pong frames and keeps the shared
// `ws_clients` counter current.
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::app_state::AppState;

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle.
///
/// Runs two concurrent branches via `tokio::select!`:
///   1. **Push** — every 500 ms, send a new snapshot if the version changed.
///   2. **Recv** — answer Ping, stop on Close or error, ignore everything else.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let clients = state.ws_clients.fetch_add(1, Ordering::Relaxed) + 1;
    debug!(clients, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let mut last_sent_version = state.current_state_version();
    if let Err(e) = send_dashboard(&mut sender, &state).await {
        warn!(error = %e, "Failed to send initial WebSocket snapshot");
        cleanup(&state);
        return;
    }

    let mut push_interval = interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let current_version = state.current_state_version();
                if current_version != last_sent_version {
                    if let Err(e) = send_dashboard(&mut sender, &state).await {
                        debug!(error = %e, "WebSocket send failed — disconnecting");
                        break;
                    }
                    last_sent_version = current_version;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "Failed to send Pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket Close frame received — disconnecting");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Text / Binary / Pong carry nothing the feed needs.
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    cleanup(&state);
}

/// Serialize and send the current DashboardSnapshot over the WebSocket.
async fn send_dashboard<S>(
    sender: &mut S,
    state: &Arc<AppState>,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let dashboard = state.build_dashboard();

    match serde_json::to_string(&dashboard) {
        Ok(json) => {
            sender.send(Message::Text(json.into())).await?;
            debug!(version = dashboard.state_version, "WebSocket snapshot sent");
            Ok(())
        }
        Err(e) => {
            // Serialisation errors are not network errors; don't disconnect.
            warn!(error = %e, "Failed to serialize dashboard");
            Ok(())
        }
    }
}

fn cleanup(state: &Arc<AppState>) {
    let remaining = state.ws_clients.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
    info!(remaining, "WebSocket connection closed — cleanup complete");
}
