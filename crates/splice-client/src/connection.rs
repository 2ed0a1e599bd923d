//! Websocket link to the relay
//!
//! Outgoing messages are queued on an unbounded channel and written by a
//! background task. Incoming frames are decoded into [`SyncMessage`]s at
//! this boundary; anything that does not parse is dropped with a warning.

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use splice_core::sync::SyncMessage;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay connection failures
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("Websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Relay closed the connection")]
    Closed,
}

/// Read half of the relay connection
pub struct RelayLink {
    reader: SplitStream<Socket>,
    writer: JoinHandle<()>,
}

/// Connect to the relay and start draining `outbox` into the socket
pub async fn connect(
    url: &str,
    outbox: UnboundedReceiver<SyncMessage>,
) -> Result<RelayLink, ConnectionError> {
    let (socket, _) = connect_async(url).await.map_err(|source| ConnectionError::Connect {
        url: url.to_string(),
        source,
    })?;
    log::info!("Connected to relay at {}", url);

    let (sink, reader) = socket.split();
    let writer = tokio::spawn(write_loop(sink, outbox));
    Ok(RelayLink { reader, writer })
}

async fn write_loop(
    mut sink: futures_util::stream::SplitSink<Socket, Message>,
    mut outbox: UnboundedReceiver<SyncMessage>,
) {
    while let Some(message) = outbox.recv().await {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                log::error!("Failed to encode {} message: {}", message.kind(), e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            log::warn!("Relay write failed: {}", e);
            break;
        }
    }
    let _ = sink.close().await;
}

impl RelayLink {
    /// Wait for the next well-formed message from the relay
    pub async fn next_message(&mut self) -> Result<SyncMessage, ConnectionError> {
        loop {
            let frame = match self.reader.next().await {
                Some(frame) => frame?,
                None => return Err(ConnectionError::Closed),
            };
            match frame {
                Message::Text(text) => match SyncMessage::from_json(text.as_str()) {
                    Ok(message) => return Ok(message),
                    Err(e) => log::warn!("Dropping malformed relay message: {}", e),
                },
                Message::Close(_) => return Err(ConnectionError::Closed),
                _ => {}
            }
        }
    }
}

impl Drop for RelayLink {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_core::engine::Knobs;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Single-connection echo relay: sends one garbage frame, then echoes
    async fn spawn_echo() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text("not json".into())).await.unwrap();
            while let Some(Ok(frame)) = ws.next().await {
                if frame.is_text() {
                    ws.send(frame).await.unwrap();
                }
            }
        });
        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_round_trip_through_socket() {
        let url = spawn_echo().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut link = connect(&url, rx).await.unwrap();

        let sent = SyncMessage::Parameters {
            knobs: Knobs([0.5, 0.1, 0.2, 0.3]),
        };
        tx.send(sent.clone()).unwrap();

        // The garbage frame is skipped
        let received = link.next_message().await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (_tx, rx) = mpsc::unbounded_channel();
        let result = connect(&format!("ws://{}", addr), rx).await;
        assert!(matches!(result, Err(ConnectionError::Connect { .. })));
    }
}
