use async_trait::async_trait;

use crate::error::Result;

/// One or two photos sent in a single delivery, captioned on the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPair {
    /// URL of the first photo.
    pub first_url: String,
    /// Caption attached to the first photo.
    pub caption: String,
    /// URL of the second photo. Absent on the last mushaf page, which has
    /// no partner page.
    pub second_url: Option<String>,
}

/// Outbound messaging contract.
///
/// Implementations must classify permanently-unreachable destinations as
/// [`crate::WirdError::Unreachable`] so the scheduler can drop them, and
/// network-level failures as [`crate::WirdError::Transient`].
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a plain text message to a chat.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Send a delivery's page image(s) as a single message.
    async fn send_page_pair(&self, chat_id: &str, pair: &MediaPair) -> Result<()>;

    /// Whether `user_id` is an administrator (or the creator) of the chat.
    async fn is_administrator(&self, chat_id: &str, user_id: &str) -> Result<bool>;
}
