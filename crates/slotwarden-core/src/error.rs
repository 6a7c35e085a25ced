//! Slotwarden error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SlotwardenError>;

#[derive(Debug, Error)]
pub enum SlotwardenError {
    /// Messaging bridge request failed (network, HTTP status, bad payload).
    #[error("channel error: {0}")]
    Channel(String),

    #[error("config error: {0}")]
    Config(String),

    /// Poll creation did not complete within the allowed window.
    #[error("poll creation timed out after {0}s")]
    CreationTimeout(u64),

    /// The platform accepted the poll but returned no id.
    #[error("poll created without an id")]
    MissingPollId,

    /// The group chat is not available on the platform right now.
    #[error("chat not found: {0}")]
    ChatNotFound(String),

    /// The poll message no longer exists in the chat.
    #[error("poll message not found: {0}")]
    MessageNotFound(String),

    #[error("invalid cron expression: '{0}'")]
    Cron(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SlotwardenError {
    /// Snapshot-fetch failures that warrant one bounded retry after the
    /// chat has been reloaded.
    pub fn is_recoverable_fetch(&self) -> bool {
        matches!(self, Self::ChatNotFound(_) | Self::MessageNotFound(_))
    }
}
