//! `/ws/frames` — forwards every encoded SYNC_FRAME to subscribed clients
//! over a WebSocket, mirroring the teacher's `websocket_broker.rs` but with
//! a single topic, since the gateway has exactly one frame stream.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct FrameSinkState {
    pub frames_tx: broadcast::Sender<Arc<Vec<u8>>>,
}

pub fn ws_frames_route(frames_tx: broadcast::Sender<Arc<Vec<u8>>>) -> Router {
    let state = FrameSinkState { frames_tx };
    Router::new().route("/ws/frames", get(upgrade_handler)).with_state(state)
}

async fn upgrade_handler(ws: WebSocketUpgrade, State(state): State<FrameSinkState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_client(socket, state.frames_tx.subscribe()))
}

async fn serve_client(mut socket: WebSocket, mut rx: broadcast::Receiver<Arc<Vec<u8>>>) {
    loop {
        match rx.recv().await {
            Ok(bytes) => {
                if socket.send(Message::Binary((*bytes).clone())).await.is_err() {
                    debug!("ws client disconnected");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "ws client lagged, some frames dropped for it");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
