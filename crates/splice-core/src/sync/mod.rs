//! Multi-client synchronization
//!
//! Clients never share state directly. Each keeps its own [`Session`] and
//! exchanges [`SyncMessage`]s through the relay, which forwards every message
//! to every *other* client. Last writer wins per message kind, in relay
//! delivery order; no clocks and no conflict resolution. Divergence between
//! clients is tolerated.

mod message;
mod session;

pub use message::{MessageKind, SyncMessage};
pub use session::{Command, Followup, Mutation, Session, SessionError, SessionResult};
