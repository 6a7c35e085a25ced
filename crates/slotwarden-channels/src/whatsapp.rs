//! WhatsApp channel via a WPPConnect-style session bridge.
//!
//! The bridge holds the authenticated WhatsApp Web session; this client
//! talks to its REST API: poll creation, vote snapshots, text messages,
//! contact lookup, and chat management.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use slotwarden_core::config::BridgeConfig;
use slotwarden_core::error::{Result, SlotwardenError};
use slotwarden_core::traits::PollChannel;
use slotwarden_core::types::{GroupChat, Vote};

/// Delay before the single retry of a recoverable vote-snapshot fetch.
const FETCH_RETRY_DELAY: Duration = Duration::from_millis(1500);
/// Per-request HTTP timeout against the bridge.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// WhatsApp bridge channel implementation.
pub struct WhatsAppChannel {
    config: BridgeConfig,
    group_id: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: BridgeConfig, group_id: &str) -> Self {
        Self {
            config,
            group_id: group_id.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.session,
            path
        )
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.token)
    }

    /// Verify the bridge session is up and authenticated.
    pub async fn connect(&self) -> Result<()> {
        let response = self
            .client
            .get(self.api_url("status-session"))
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("bridge unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(SlotwardenError::Channel(format!(
                "bridge status check failed: HTTP {}",
                response.status()
            )));
        }

        let status: BridgeEnvelope<SessionStatus> = response
            .json()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("invalid bridge response: {e}")))?;

        match status.result {
            Some(s) if s.connected => {
                tracing::info!("📱 WhatsApp bridge: session '{}' connected", self.config.session);
                Ok(())
            }
            _ => Err(SlotwardenError::Channel(format!(
                "session '{}' is not connected — scan the QR code on the bridge first",
                self.config.session
            ))),
        }
    }

    /// One raw snapshot fetch, without the retry policy.
    async fn fetch_votes(&self, poll_id: &str) -> Result<Vec<Vote>> {
        let response = self
            .client
            .get(self.api_url(&format!("poll-votes/{poll_id}")))
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("vote fetch failed: {e}")))?;

        let envelope: BridgeEnvelope<PollVotes> = response
            .json()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("invalid vote payload: {e}")))?;

        let payload = envelope.into_result()?;
        Ok(payload.votes.iter().map(PollVoteRecord::to_vote).collect())
    }
}

#[async_trait]
impl PollChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn create_poll(
        &self,
        group_id: &str,
        question: &str,
        options: &[String],
        selectable_count: u8,
    ) -> Result<String> {
        let body = serde_json::json!({
            "phone": group_id,
            "isGroup": true,
            "name": question,
            "choices": options,
            "options": { "selectableCount": selectable_count },
        });

        let response = self
            .client
            .post(self.api_url("send-poll-message"))
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("poll creation failed: {e}")))?;

        let envelope: BridgeEnvelope<CreatedPoll> = response
            .json()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("invalid creation response: {e}")))?;

        let created = envelope.into_result()?;
        match created.id {
            Some(id) if !id.is_empty() => {
                tracing::debug!("poll created: {id}");
                Ok(id)
            }
            _ => Err(SlotwardenError::MissingPollId),
        }
    }

    /// Vote snapshot with the bounded one-shot retry: on a recoverable
    /// failure, reload the chat, wait briefly, and try once more.
    async fn get_votes(&self, poll_id: &str) -> Result<Vec<Vote>> {
        match self.fetch_votes(poll_id).await {
            Ok(votes) => Ok(votes),
            Err(e) if e.is_recoverable_fetch() => {
                tracing::debug!("vote fetch hiccup ({e}), reloading chat and retrying once");
                self.ensure_chat_loaded(&self.group_id).await.ok();
                tokio::time::sleep(FETCH_RETRY_DELAY).await;
                self.fetch_votes(poll_id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn send_text(&self, group_id: &str, message: &str, mentions: &[String]) -> Result<()> {
        let body = serde_json::json!({
            "phone": group_id,
            "isGroup": true,
            "message": message,
            "mentioned": mentions,
        });

        let response = self
            .client
            .post(self.api_url("send-message"))
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("send failed: {e}")))?;

        let envelope: BridgeEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("invalid send response: {e}")))?;
        envelope.into_result()?;
        Ok(())
    }

    async fn contact_display_name(&self, voter_id: &str) -> Result<String> {
        let response = self
            .client
            .get(self.api_url(&format!("contact/{voter_id}")))
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("contact lookup failed: {e}")))?;

        let envelope: BridgeEnvelope<Contact> = response
            .json()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("invalid contact payload: {e}")))?;

        let contact = envelope.into_result()?;
        contact
            .pushname
            .or(contact.formatted_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SlotwardenError::Channel(format!("no display name for {voter_id}")))
    }

    /// Best-effort: ask the bridge to (re)load the chat so poll messages
    /// are resolvable. Failures are logged, not propagated.
    async fn ensure_chat_loaded(&self, group_id: &str) -> Result<()> {
        let body = serde_json::json!({ "phone": group_id, "isGroup": true });
        let result = self
            .client
            .post(self.api_url("load-chat"))
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!("⚠️ chat preload failed for {group_id}: {e}");
        }
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupChat>> {
        let response = self
            .client
            .get(self.api_url("all-chats"))
            .query(&[("onlyGroups", "true")])
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("chat listing failed: {e}")))?;

        let envelope: BridgeEnvelope<Vec<ChatSummary>> = response
            .json()
            .await
            .map_err(|e| SlotwardenError::Channel(format!("invalid chat listing: {e}")))?;

        let chats = envelope.into_result()?;
        Ok(chats
            .into_iter()
            .map(|chat| GroupChat {
                id: chat.id,
                name: chat.name.unwrap_or_else(|| "<unnamed>".into()),
            })
            .collect())
    }
}

// --- Bridge API Types ---

/// Standard bridge response envelope.
#[derive(Debug, Deserialize)]
struct BridgeEnvelope<T> {
    success: bool,
    result: Option<T>,
    /// Machine-readable failure code, e.g. "CHAT_NOT_FOUND".
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> BridgeEnvelope<T> {
    /// Unwrap the payload, mapping bridge failure codes onto the error
    /// taxonomy the engine understands.
    fn into_result(self) -> Result<T> {
        if self.success {
            return self
                .result
                .ok_or_else(|| SlotwardenError::Channel("bridge returned empty result".into()));
        }

        let detail = self.message.unwrap_or_else(|| "no detail".into());
        match self.code.as_deref() {
            Some("CHAT_NOT_FOUND") => Err(SlotwardenError::ChatNotFound(detail)),
            Some("MESSAGE_NOT_FOUND") => Err(SlotwardenError::MessageNotFound(detail)),
            Some(code) => Err(SlotwardenError::Channel(format!("{code}: {detail}"))),
            None => Err(SlotwardenError::Channel(detail)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionStatus {
    #[serde(default)]
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedPoll {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollVotes {
    #[serde(default)]
    votes: Vec<PollVoteRecord>,
}

/// One ballot as the bridge reports it.
#[derive(Debug, Clone, Deserialize)]
struct PollVoteRecord {
    #[serde(default, rename = "selectedOptions")]
    selected_options: Vec<SelectedOption>,
    timestamp: i64,
    sender: VoteSender,
}

/// Option entries can arrive without a name; those are dropped here and
/// the resulting empty ballot is skipped downstream by the tally.
#[derive(Debug, Clone, Deserialize)]
struct SelectedOption {
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct VoteSender {
    id: String,
}

impl PollVoteRecord {
    fn to_vote(&self) -> Vote {
        Vote {
            selected_options: self
                .selected_options
                .iter()
                .filter_map(|option| option.name.clone())
                .collect(),
            timestamp: self.timestamp,
            voter_id: self.sender.id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Contact {
    #[serde(default)]
    pushname: Option<String>,
    #[serde(default, rename = "formattedName")]
    formatted_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatSummary {
    id: String,
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_record_conversion_drops_nameless_options() {
        let record: PollVoteRecord = serde_json::from_value(serde_json::json!({
            "selectedOptions": [{"name": "6h"}, {"name": null}],
            "timestamp": 1700000000000_i64,
            "sender": {"id": "5591999999999@c.us"},
        }))
        .unwrap();

        let vote = record.to_vote();
        assert_eq!(vote.selected_options, vec!["6h".to_string()]);
        assert_eq!(vote.voter_id, "5591999999999@c.us");
    }

    #[test]
    fn test_envelope_maps_bridge_codes() {
        let envelope: BridgeEnvelope<PollVotes> = serde_json::from_value(serde_json::json!({
            "success": false,
            "result": null,
            "code": "CHAT_NOT_FOUND",
            "message": "group@test",
        }))
        .unwrap();

        let err = envelope.into_result().unwrap_err();
        assert!(matches!(err, SlotwardenError::ChatNotFound(_)));
        assert!(err.is_recoverable_fetch());
    }

    #[test]
    fn test_envelope_unknown_code_is_a_channel_error() {
        let envelope: BridgeEnvelope<serde_json::Value> =
            serde_json::from_value(serde_json::json!({
                "success": false,
                "code": "RATE_LIMITED",
                "message": "slow down",
            }))
            .unwrap();

        let err = envelope.into_result().unwrap_err();
        assert!(matches!(err, SlotwardenError::Channel(_)));
        assert!(!err.is_recoverable_fetch());
    }
}
