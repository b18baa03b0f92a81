//! Fallback delivery cascade.
//!
//! Tries each dialect in [`Dialect::FALLBACK_ORDER`]. Within a dialect the
//! undelivered source is rendered, split and balanced, then sent chunk by
//! chunk, each chunk replying to the previous one. The first failed chunk
//! abandons the dialect; what was not yet delivered is rendered again in the
//! next weaker dialect from a clean tracker state.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::balance::SpanTracker;
use crate::config::ChunkingConfig;
use crate::dialect::Dialect;
use crate::markers::MarkerTable;
use crate::render::render;
use crate::split::split;
use crate::transport::{Transport, TransportError};

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport<H> {
    /// Handle of the last message sent, `None` when nothing was sent.
    pub last_message: Option<H>,
    pub messages_sent: usize,
    /// Dialect of the last message sent.
    pub dialect: Option<Dialect>,
}

/// One abandoned dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub dialect: Dialect,
    /// Index of the failed chunk within that dialect's chunks.
    pub chunk: usize,
    pub error: TransportError,
}

/// Every dialect failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    pub attempts: Vec<DeliveryAttempt>,
    /// Messages delivered before the final failure. They stay delivered.
    pub messages_sent: usize,
}

impl DeliveryError {
    pub fn last_error(&self) -> Option<&TransportError> {
        self.attempts.last().map(|attempt| &attempt.error)
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivery failed in every dialect ({} message(s) sent)",
            self.messages_sent
        )?;
        if let Some(last) = self.last_error() {
            write!(f, ": {last}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DeliveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

/// Delivers `source` to `destination`, downgrading the dialect on failure.
///
/// The first message replies to `reply_to`; later messages reply to the one
/// sent before them. Messages already sent are never resent.
pub async fn deliver<T: Transport>(
    transport: &T,
    config: &ChunkingConfig,
    source: &str,
    destination: &T::Destination,
    reply_to: Option<T::Handle>,
) -> Result<DeliveryReport<T::Handle>, DeliveryError> {
    let mut consumed = 0;
    let mut reply = reply_to;
    let mut last_message = None;
    let mut last_dialect = None;
    let mut messages_sent = 0;
    let mut attempts = Vec::new();

    for dialect in Dialect::FALLBACK_ORDER {
        let table = MarkerTable::for_dialect(dialect);
        let base = consumed;
        let rendered = render(&source[base..], table);
        let chunks = split(rendered.text(), table, config);
        let mut tracker = SpanTracker::new(table);
        debug!(%dialect, offset = base, chunks = chunks.len(), "delivering");

        let mut failure = None;
        for (index, chunk) in chunks.iter().enumerate() {
            let text = tracker.balance(chunk.text);
            let chunk_end = base + rendered.source_offset(chunk.range.end);
            if text.trim().is_empty() {
                debug!(%dialect, chunk = index, "skipping blank chunk");
                consumed = chunk_end;
                continue;
            }

            match transport
                .send(destination, &text, dialect, reply.as_ref())
                .await
            {
                Ok(handle) => {
                    messages_sent += 1;
                    consumed = chunk_end;
                    info!(%dialect, chunk = index, chars = text.chars().count(), "sent chunk");
                    reply = Some(handle.clone());
                    last_message = Some(handle);
                    last_dialect = Some(dialect);
                }
                Err(error) => {
                    warn!(
                        %dialect,
                        chunk = index,
                        kind = %error.kind,
                        error = %error,
                        next = ?dialect.weaker(),
                        "send failed, abandoning dialect"
                    );
                    failure = Some(DeliveryAttempt {
                        dialect,
                        chunk: index,
                        error,
                    });
                    break;
                }
            }
        }

        match failure {
            Some(attempt) => attempts.push(attempt),
            None => {
                return Ok(DeliveryReport {
                    last_message,
                    messages_sent,
                    dialect: last_dialect,
                });
            }
        }
    }

    let failure = DeliveryError {
        attempts,
        messages_sent,
    };
    error!(error = %failure, "delivery failed");
    Err(failure)
}
