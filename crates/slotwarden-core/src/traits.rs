//! Collaborator seams.
//!
//! The moderation engine never talks to the platform directly; everything
//! goes through `PollChannel` so implementations (and test mocks) can be
//! swapped freely.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{GroupChat, Vote};

/// Messaging-platform collaborator: poll creation, vote snapshots, and
/// group notifications.
#[async_trait]
pub trait PollChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Create a poll in the group; returns the platform-assigned poll id.
    async fn create_poll(
        &self,
        group_id: &str,
        question: &str,
        options: &[String],
        selectable_count: u8,
    ) -> Result<String>;

    /// Current vote snapshot for a poll. Implementations perform their own
    /// bounded retry on recoverable fetch errors; callers never retry.
    async fn get_votes(&self, poll_id: &str) -> Result<Vec<Vote>>;

    /// Post a text message to the group, optionally mentioning voters.
    async fn send_text(&self, group_id: &str, message: &str, mentions: &[String]) -> Result<()>;

    /// Display name for a voter id. Callers fall back to a generic label
    /// when this fails.
    async fn contact_display_name(&self, voter_id: &str) -> Result<String>;

    /// Best-effort chat preload before vote reads.
    async fn ensure_chat_loaded(&self, group_id: &str) -> Result<()>;

    /// All group chats visible to the session.
    async fn list_groups(&self) -> Result<Vec<GroupChat>>;
}
