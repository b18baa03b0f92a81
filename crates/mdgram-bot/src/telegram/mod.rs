use std::time::Duration;

use anyhow::{Context, Result, bail};
use mdgram_core::config::Config;
use mdgram_core::{Dialect, Transport, TransportError, TransportResult};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

mod types;

pub use types::{Chat, Message};
use types::{LinkPreviewOptions, SendMessageRequest, TelegramResponse};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";
const BOT_TOKEN_ENV: &str = "MDGRAM_TELEGRAM_BOT_TOKEN";

pub struct TelegramSettings {
    pub bot_token: String,
    pub api_base_url: String,
    pub disable_link_preview: bool,
    pub request_timeout: Option<Duration>,
}

impl TelegramSettings {
    /// Resolves settings from config. The token comes from `token_override`,
    /// then `telegram.bot_token`, then `MDGRAM_TELEGRAM_BOT_TOKEN`.
    pub fn from_config(config: &Config, token_override: Option<&str>) -> Result<Self> {
        let token = normalize_optional(token_override)
            .or_else(|| normalize_optional(config.telegram.bot_token.as_deref()))
            .or_else(|| normalize_optional(std::env::var(BOT_TOKEN_ENV).ok().as_deref()));
        let Some(bot_token) = token else {
            bail!("telegram.bot_token or {BOT_TOKEN_ENV} is required");
        };

        let api_base_url = normalize_optional(config.telegram.api_base_url.as_deref())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            bot_token,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            disable_link_preview: config.telegram.disable_link_preview,
            request_timeout: config.telegram.request_timeout(),
        })
    }
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Where a message goes: a chat, optionally a forum topic inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatTarget {
    pub chat_id: i64,
    pub message_thread_id: Option<i64>,
}

impl ChatTarget {
    pub fn chat(chat_id: i64) -> Self {
        Self {
            chat_id,
            message_thread_id: None,
        }
    }
}

/// Id of a delivered Telegram message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    disable_link_preview: bool,
}

impl TelegramClient {
    pub fn new(settings: &TelegramSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            http,
            base_url: settings.api_base_url.clone(),
            token: settings.bot_token.clone(),
            disable_link_preview: settings.disable_link_preview,
        })
    }

    /// Sends one message. `parse_mode` is omitted for plain text.
    pub async fn send_message(
        &self,
        target: ChatTarget,
        text: &str,
        reply_to: Option<MessageId>,
        parse_mode: Option<&str>,
    ) -> TransportResult<Message> {
        let request = SendMessageRequest {
            chat_id: target.chat_id,
            text,
            message_thread_id: target.message_thread_id,
            parse_mode,
            reply_to_message_id: reply_to.map(|id| id.0),
            allow_sending_without_reply: reply_to.map(|_| true),
            link_preview_options: self
                .disable_link_preview
                .then_some(LinkPreviewOptions { is_disabled: true }),
        };
        self.post("sendMessage", &request).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &str,
        body: &B,
    ) -> TransportResult<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                TransportError::network("Telegram request failed")
                    .with_details(err.without_url().to_string())
            })?;

        let status = response.status();
        let raw = response.text().await.map_err(|err| {
            TransportError::network("Failed to read Telegram response")
                .with_details(err.without_url().to_string())
        })?;

        let payload: TelegramResponse<T> = serde_json::from_str(&raw).map_err(|err| {
            TransportError::network(format!("Failed to decode Telegram response ({status})"))
                .with_details(format!("{err}: {raw}"))
        })?;

        if !payload.ok {
            return Err(api_error(status, payload, raw));
        }

        payload.result.ok_or_else(|| {
            TransportError::network("Telegram response has no result").with_details(raw)
        })
    }
}

/// Maps an `ok: false` answer. Only a 400 means the message itself was
/// refused; rate limits and server errors are network trouble.
fn api_error<T>(status: StatusCode, payload: TelegramResponse<T>, raw: String) -> TransportError {
    let description = payload
        .description
        .unwrap_or_else(|| "Telegram API error".to_string());
    let code = payload.error_code.unwrap_or(status.as_u16());

    if code == StatusCode::BAD_REQUEST.as_u16() {
        return TransportError::rejected(description).with_details(raw);
    }
    if let Some(retry_after) = payload.parameters.and_then(|params| params.retry_after) {
        warn!(retry_after, "Telegram rate limit hit");
    }
    TransportError::network(description).with_details(raw)
}

impl Transport for TelegramClient {
    type Destination = ChatTarget;
    type Handle = MessageId;

    async fn send(
        &self,
        destination: &ChatTarget,
        text: &str,
        dialect: Dialect,
        reply_to: Option<&MessageId>,
    ) -> TransportResult<MessageId> {
        let message = self
            .send_message(*destination, text, reply_to.copied(), dialect.parse_mode())
            .await?;
        debug!(
            chat_id = message.chat.id,
            message_id = message.message_id,
            "telegram message sent"
        );
        Ok(MessageId(message.message_id))
    }
}

#[cfg(test)]
mod tests {
    use mdgram_core::TransportErrorKind;
    use mdgram_core::config::TelegramConfig;

    use super::*;

    fn config_with_token(token: &str) -> Config {
        Config {
            telegram: TelegramConfig {
                bot_token: Some(token.to_string()),
                api_base_url: Some("http://localhost:9/".to_string()),
                ..TelegramConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_settings_prefer_override_token() {
        let settings =
            TelegramSettings::from_config(&config_with_token("from-config"), Some(" flag "))
                .unwrap();
        assert_eq!(settings.bot_token, "flag");
    }

    #[test]
    fn test_settings_trim_config_values() {
        let settings =
            TelegramSettings::from_config(&config_with_token("  123:abc "), Some("   ")).unwrap();
        assert_eq!(settings.bot_token, "123:abc");
        assert_eq!(settings.api_base_url, "http://localhost:9");
        assert!(settings.disable_link_preview);
        assert_eq!(settings.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_bad_request_is_rejection() {
        let payload: TelegramResponse<Message> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities"}"#,
        )
        .unwrap();
        let err = api_error(StatusCode::BAD_REQUEST, payload, String::new());
        assert_eq!(err.kind, TransportErrorKind::Rejected);
        assert_eq!(err.message, "Bad Request: can't parse entities");
    }

    #[test]
    fn test_rate_limit_is_network_error() {
        let payload: TelegramResponse<Message> = serde_json::from_str(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":3}}"#,
        )
        .unwrap();
        let err = api_error(StatusCode::TOO_MANY_REQUESTS, payload, String::new());
        assert_eq!(err.kind, TransportErrorKind::Network);
    }

    #[test]
    fn test_plain_request_omits_parse_mode() {
        let request = SendMessageRequest {
            chat_id: 1,
            text: "hi",
            message_thread_id: None,
            parse_mode: None,
            reply_to_message_id: None,
            allow_sending_without_reply: None,
            link_preview_options: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": 1, "text": "hi"}));
    }
}
