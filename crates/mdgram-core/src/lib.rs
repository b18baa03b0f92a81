//! Core mdgram library: dialects, rendering, splitting, balancing and
//! fallback delivery of Markdown-like text over Telegram-style transports.

pub mod balance;
pub mod config;
pub mod deliver;
pub mod dialect;
pub mod markers;
pub mod render;
pub mod split;
pub mod transport;

pub use balance::{BalancedChunk, Carry, SpanTracker, balance_chunk};
pub use config::{ChunkingConfig, Config};
pub use deliver::{DeliveryAttempt, DeliveryError, DeliveryReport, deliver};
pub use dialect::Dialect;
pub use markers::{Marker, MarkerTable, QuoteMode, Span, SpanKind};
pub use render::{Rendered, render};
pub use split::{Chunk, split};
pub use transport::{Transport, TransportError, TransportErrorKind, TransportResult};
