//! Outbound message transport contract.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// Category of a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The transport refused the message itself (malformed markup, bad entities).
    Rejected,
    /// The message never got a definite answer: connection failure, timeout,
    /// rate limiting, server error or an unreadable response.
    Network,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Rejected => write!(f, "rejected"),
            TransportErrorKind::Network => write!(f, "network"),
        }
    }
}

/// Structured send failure with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw response body)
    pub details: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Rejected, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Something that can deliver one formatted message.
///
/// `Destination` names where messages go; `Handle` identifies a delivered
/// message so later messages can reply to it.
pub trait Transport {
    type Destination: ?Sized + Sync;
    type Handle: Clone + Send + Sync;

    /// Sends `text` formatted in `dialect`, optionally as a reply.
    fn send(
        &self,
        destination: &Self::Destination,
        text: &str,
        dialect: Dialect,
        reply_to: Option<&Self::Handle>,
    ) -> impl Future<Output = TransportResult<Self::Handle>> + Send;
}
