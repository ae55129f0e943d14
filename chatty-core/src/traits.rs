// ABOUTME: Transport seam between the relay core and the messaging protocol
// ABOUTME: Defines inbound/outbound message types and the MessagingTransport trait

use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Message Types
// =============================================================================

/// Protocol-level message type. Only `Chat` messages are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// One-to-one chat message
    Chat,
    /// Multi-user chat message
    GroupChat,
    /// Headline / broadcast notification
    Headline,
    /// Untyped message
    Normal,
    /// Error bounce from the server or peer
    Error,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::GroupChat => write!(f, "groupchat"),
            Self::Headline => write!(f, "headline"),
            Self::Normal => write!(f, "normal"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A message received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Raw sender address, possibly carrying a `/resource` qualifier
    pub sender: String,
    pub kind: MessageKind,
    /// Message body
    pub text: String,
}

impl InboundMessage {
    pub fn chat(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            kind: MessageKind::Chat,
            text: text.into(),
        }
    }

    /// Whether this message should be handed to the router
    pub fn is_chat(&self) -> bool {
        self.kind == MessageKind::Chat
    }
}

/// A message the router wants delivered to one roster member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Recipient identity
    pub to: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            text: text.into(),
        }
    }
}

/// Event produced by a blocking receive on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A message arrived
    Message(InboundMessage),
    /// The connection is gone for good; the session cannot continue
    Disconnected { reason: String },
}

// =============================================================================
// Transport
// =============================================================================

/// Messaging protocol collaborator.
///
/// Implementations must be shareable between the receive loop and the
/// presence heartbeat, so every method takes `&self`.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Block until the next inbound event.
    ///
    /// An `Err` is a recoverable per-receive failure; the caller logs it and
    /// receives again. Unrecoverable loss of the connection is reported as
    /// `Ok(TransportEvent::Disconnected { .. })`.
    async fn receive(&self) -> Result<TransportEvent>;

    /// Send a message to an address
    async fn send(&self, to: &str, kind: MessageKind, text: &str) -> Result<()>;

    /// Emit a presence/liveness signal to keep the session alive
    async fn signal_presence(&self) -> Result<()>;

    /// Transport identifier (e.g., "xmpp")
    fn transport_id(&self) -> &'static str;

    /// Gracefully shut down the connection
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
