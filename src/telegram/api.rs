//! Telegram Bot API client over HTTPS.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::error::{Result, WirdError};
use crate::telegram::traits::{MediaPair, Messenger};

/// Description fragments Telegram uses when a chat is gone for good.
const UNREACHABLE_MARKERS: &[&str] = &[
    "bot was kicked",
    "bot was blocked",
    "chat not found",
    "forbidden",
    "user is deactivated",
    "bot is not a member",
];

/// One entry from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update identifier; the next poll offset is `max + 1`.
    pub update_id: i64,
    /// Present for message updates.
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    /// Present when the bot's own membership in a chat changed.
    #[serde(default)]
    pub my_chat_member: Option<ChatMemberUpdated>,
}

/// An inbound chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// Membership change of the bot itself in some chat.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub new_chat_member: ChatMember,
}

impl ChatMemberUpdated {
    /// The bot was added (or demoted to) a plain member and cannot post
    /// media until the chat grants it admin rights.
    pub fn needs_admin_prompt(&self) -> bool {
        self.new_chat_member.status == "member"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

/// Concrete Bot API client.
pub struct BotApi {
    client: reqwest::Client,
    api_base: String,
    token: String,
    poll_timeout_secs: u64,
}

impl BotApi {
    /// Build a client from config. The request timeout bounds every send
    /// so one unresponsive chat cannot stall a whole scheduler tick.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(WirdError::Config("telegram bot token is empty".to_owned()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| WirdError::Config(format!("cannot build http client: {e}")))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value> {
        let request = self.client.post(self.method_url(method)).json(&payload);
        // getUpdates long-polls server-side; give it headroom past the
        // poll timeout instead of the default request timeout.
        let request = if method == "getUpdates" {
            request.timeout(Duration::from_secs(self.poll_timeout_secs + 10))
        } else {
            request
        };

        let response = request
            .send()
            .await
            .map_err(|e| WirdError::Transient(format!("{method}: {e}")))?;

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| WirdError::Transient(format!("{method}: invalid response: {e}")))?;

        if envelope.ok {
            debug!("telegram {method} ok");
            return Ok(envelope.result);
        }
        Err(classify_rejection(
            method,
            envelope.error_code,
            envelope.description.as_deref(),
        ))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "my_chat_member"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        let result = self.call("getUpdates", payload).await?;
        serde_json::from_value(result)
            .map_err(|e| WirdError::Telegram(format!("getUpdates: bad payload: {e}")))
    }
}

/// Map a Bot API rejection onto the delivery error taxonomy.
fn classify_rejection(method: &str, error_code: Option<u16>, description: Option<&str>) -> WirdError {
    let description = description.unwrap_or("no description").to_owned();
    let lowered = description.to_lowercase();

    if error_code == Some(403) || UNREACHABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return WirdError::Unreachable(format!("{method}: {description}"));
    }
    if error_code == Some(429) || lowered.contains("too many requests") {
        return WirdError::Transient(format!("{method}: {description}"));
    }
    WirdError::Telegram(format!(
        "{method}: {} {description}",
        error_code.unwrap_or(0)
    ))
}

#[async_trait]
impl Messenger for BotApi {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    async fn send_page_pair(&self, chat_id: &str, pair: &MediaPair) -> Result<()> {
        // sendMediaGroup needs at least two items; a lone photo goes
        // through sendPhoto instead.
        match &pair.second_url {
            Some(second_url) => {
                let media = json!([
                    { "type": "photo", "media": pair.first_url, "caption": pair.caption },
                    { "type": "photo", "media": second_url },
                ]);
                self.call("sendMediaGroup", json!({ "chat_id": chat_id, "media": media }))
                    .await?;
            }
            None => {
                self.call(
                    "sendPhoto",
                    json!({
                        "chat_id": chat_id,
                        "photo": pair.first_url,
                        "caption": pair.caption,
                    }),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn is_administrator(&self, chat_id: &str, user_id: &str) -> Result<bool> {
        let result = self
            .call(
                "getChatMember",
                json!({ "chat_id": chat_id, "user_id": user_id }),
            )
            .await?;
        let member: ChatMember = serde_json::from_value(result)
            .map_err(|e| WirdError::Telegram(format!("getChatMember: bad payload: {e}")))?;
        Ok(matches!(member.status.as_str(), "administrator" | "creator"))
    }
}
