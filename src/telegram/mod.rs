//! Telegram messenger capability.
//!
//! The rest of the crate only sees the [`Messenger`] trait; [`BotApi`] is
//! the concrete Bot API client. Keeping the seam here lets scheduler and
//! command tests run against in-memory doubles.

mod api;
pub mod traits;

pub use api::{BotApi, Chat, ChatMember, ChatMemberUpdated, IncomingMessage, Update, User};
pub use traits::{MediaPair, Messenger};
