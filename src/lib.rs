// ABOUTME: Root library module for the chatty relay binary
// ABOUTME: Session driver, admin one-shots, CLI and transport, plus chatty-core re-exports

pub mod admin;
pub mod cli;
pub mod logging;
pub mod session;
#[cfg(feature = "xmpp")]
pub mod xmpp;

// Re-export platform-agnostic modules from chatty-core
pub use chatty_core::commands;
pub use chatty_core::config;
pub use chatty_core::identity;
pub use chatty_core::paths;
pub use chatty_core::roster;
pub use chatty_core::router;
pub use chatty_core::storage;
pub use chatty_core::traits;
