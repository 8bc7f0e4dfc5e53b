//! Error types for the wird delivery pipeline.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum WirdError {
    /// The durable state file exists but cannot be parsed. Fatal at
    /// startup; the file is never silently replaced.
    #[error("corrupt state file: {0}")]
    CorruptState(String),

    /// Writing the state file failed. In-memory state stays authoritative
    /// and the write is retried on the next mutation.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// The destination is permanently unreachable (bot kicked, blocked,
    /// or the chat no longer exists). The destination entry is removed.
    #[error("destination unreachable: {0}")]
    Unreachable(String),

    /// Transient delivery failure (network hiccup, rate limit). Retried
    /// naturally on the next matching trigger.
    #[error("transient delivery error: {0}")]
    Transient(String),

    /// Telegram API rejected the request for a non-fatal reason.
    #[error("telegram error: {0}")]
    Telegram(String),

    /// Content lookup (page metadata, random ayah) failed. Callers
    /// substitute a placeholder instead of failing the delivery.
    #[error("content provider error: {0}")]
    Content(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, WirdError>;
