//! Telegram Bot API transport for mdgram.

pub mod telegram;

use anyhow::{Context, Result};
use mdgram_core::config::Config;
use mdgram_core::{DeliveryReport, deliver};

pub use telegram::{ChatTarget, MessageId, TelegramClient, TelegramSettings};

/// Delivers `source` to `target`, falling back through weaker formats.
pub async fn send_markdown(
    config: &Config,
    client: &TelegramClient,
    target: ChatTarget,
    source: &str,
    reply_to: Option<MessageId>,
) -> Result<DeliveryReport<MessageId>> {
    deliver(client, &config.chunking, source, &target, reply_to)
        .await
        .with_context(|| format!("Failed to deliver message to chat {}", target.chat_id))
}
