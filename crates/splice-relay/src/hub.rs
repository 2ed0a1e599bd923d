//! Client registry and last-state store
//!
//! Messages are kept and forwarded as the exact text a client sent; the
//! relay only parses them to check they are valid and to learn their kind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use splice_core::engine::Knobs;
use splice_core::sync::{MessageKind, SyncMessage};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub type ClientId = u64;

/// Fan-out hub shared by every connection
#[derive(Default)]
pub struct Hub {
    latest: Mutex<HashMap<MessageKind, String>>,
    clients: Mutex<HashMap<ClientId, UnboundedSender<String>>>,
    next_id: AtomicU64,
}

/// A registered connection
pub struct Registration {
    pub id: ClientId,
    pub inbox: UnboundedReceiver<String>,
    /// Latest message of each kind, in replay order
    pub replay: Vec<String>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client and snapshot the state it must be sent first
    pub fn register(&self) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, inbox) = mpsc::unbounded_channel();

        // Held across the insert so nothing published in between is missed
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let replay = MessageKind::ALL
            .iter()
            .filter_map(|kind| latest.get(kind).cloned())
            .collect();
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        drop(latest);

        Registration { id, inbox, replay }
    }

    pub fn unregister(&self, id: ClientId) {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Validate a client's message; store and forward it to everyone else
    ///
    /// Returns the message kind, or `None` if the text was dropped.
    pub fn receive(&self, from: ClientId, text: &str) -> Option<MessageKind> {
        match SyncMessage::from_json(text) {
            Ok(message) => {
                let kind = message.kind();
                self.publish(Some(from), kind, text.to_string());
                Some(kind)
            }
            Err(e) => {
                log::warn!("receive: dropping malformed message from client {}: {}", from, e);
                None
            }
        }
    }

    /// Store `text` as the latest of its kind and send it to every client
    /// except `from`
    pub fn publish(&self, from: Option<ClientId>, kind: MessageKind, text: String) {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        for (id, tx) in clients.iter() {
            if Some(*id) != from {
                // A closed inbox belongs to a connection that is shutting down
                let _ = tx.send(text.clone());
            }
        }
        latest.insert(kind, text);
    }

    /// Knob values of the stored `parameters` message, if there is one
    pub fn latest_knobs(&self) -> Option<Knobs> {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let text = latest.get(&MessageKind::Parameters)?;
        match SyncMessage::from_json(text) {
            Ok(SyncMessage::Parameters { knobs }) => Some(knobs),
            _ => None,
        }
    }

    /// Encode and publish a relay-originated message to every client
    pub fn broadcast(&self, message: &SyncMessage) -> serde_json::Result<()> {
        let text = message.to_json()?;
        self.publish(None, message.kind(), text);
        Ok(())
    }
}
