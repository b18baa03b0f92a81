//! Delivers input to Telegram through the fallback cascade.

use std::path::Path;

use anyhow::Result;
use mdgram_bot::{ChatTarget, MessageId, TelegramClient, TelegramSettings, send_markdown};
use mdgram_core::config::Config;
use tracing::info;

pub struct SendOptions<'a> {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
    pub reply_to: Option<i64>,
    pub bot_token: Option<&'a str>,
    pub file: Option<&'a Path>,
}

pub async fn run(config: &Config, options: &SendOptions<'_>) -> Result<()> {
    let source = super::read_input(options.file)?;
    let settings = TelegramSettings::from_config(config, options.bot_token)?;
    let client = TelegramClient::new(&settings)?;
    let target = ChatTarget {
        chat_id: options.chat_id,
        message_thread_id: options.thread_id,
    };

    let report = send_markdown(
        config,
        &client,
        target,
        &source,
        options.reply_to.map(MessageId),
    )
    .await?;

    match (report.last_message, report.dialect) {
        (Some(MessageId(id)), Some(dialect)) => {
            info!(messages = report.messages_sent, %dialect, "delivered");
            println!("{id}");
        }
        _ => info!("nothing to send"),
    }
    Ok(())
}
