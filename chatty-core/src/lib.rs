// ABOUTME: Core of a single-group chat relay
// ABOUTME: Roster, identity persistence, directive parsing and message routing

pub mod commands;
pub mod config;
pub mod identity;
pub mod metrics;
pub mod paths;
pub mod roster;
pub mod router;
pub mod storage;
pub mod traits;

pub use identity::{IdentityStore, LoadReport};
pub use roster::Roster;
pub use router::{RouteResult, Router};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};

// Re-export core traits for convenient access
pub use traits::{InboundMessage, MessageKind, MessagingTransport, OutboundMessage, TransportEvent};
