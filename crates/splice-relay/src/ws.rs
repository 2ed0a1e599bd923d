//! `GET /ws` - relay socket

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use crate::app::AppState;
use crate::hub::Hub;

pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| serve_client(socket, hub))
}

async fn serve_client(socket: WebSocket, hub: Arc<Hub>) {
    let mut registration = hub.register();
    let id = registration.id;
    log::info!(
        "client {} connected ({} total), replaying {} messages",
        id,
        hub.client_count(),
        registration.replay.len()
    );

    let (mut sender, mut receiver) = socket.split();

    for text in registration.replay.drain(..) {
        if sender.send(Message::Text(text.into())).await.is_err() {
            hub.unregister(id);
            return;
        }
    }

    loop {
        tokio::select! {
            outgoing = registration.inbox.recv() => {
                let Some(text) = outgoing else { break };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                let Some(Ok(frame)) = incoming else { break };
                match frame {
                    Message::Text(text) => {
                        if let Some(kind) = hub.receive(id, text.as_str()) {
                            log::debug!("client {} -> {}", id, kind);
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    hub.unregister(id);
    log::info!("client {} disconnected", id);
}
