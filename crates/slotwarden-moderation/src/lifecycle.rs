//! Poll lifecycle — owns the active poll id per track, runs check cycles,
//! and rolls polls over on the reset schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;

use slotwarden_core::config::TrackConfig;
use slotwarden_core::error::{Result, SlotwardenError};
use slotwarden_core::traits::PollChannel;
use slotwarden_scheduler::{CronJob, schedule};

use crate::messages;
use crate::moderator::{ModerationState, NotificationIntent, reconcile};
use crate::tally::tally;

/// How long poll creation may take before it counts as failed. Not retried
/// within the cycle; the next scheduled reset is the retry point.
const CREATE_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-track mutable state. One lock guards the poll id, the moderation
/// state, and the check job, so a reset and a check cycle never interleave.
#[derive(Default)]
struct TrackState {
    poll_id: Option<String>,
    moderation: ModerationState,
    check_job: Option<CronJob>,
}

/// One named recurring poll slot (morning/afternoon/saturday/...).
///
/// Exactly one poll instance is active per track; replacing it stops the
/// previous instance's check job first, so a stale job never fires against
/// a superseded poll id.
pub struct PollTrack {
    config: TrackConfig,
    group_id: String,
    tz: Tz,
    channel: Arc<dyn PollChannel>,
    create_timeout: Duration,
    state: Mutex<TrackState>,
}

impl PollTrack {
    pub fn new(
        config: TrackConfig,
        group_id: &str,
        tz: Tz,
        channel: Arc<dyn PollChannel>,
    ) -> Self {
        Self {
            config,
            group_id: group_id.to_string(),
            tz,
            channel,
            create_timeout: CREATE_POLL_TIMEOUT,
            state: Mutex::new(TrackState::default()),
        }
    }

    /// Override the creation timeout (tests use short values).
    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Active poll id, if a poll is live.
    pub async fn poll_id(&self) -> Option<String> {
        self.state.lock().await.poll_id.clone()
    }

    /// Kick off the track: create the first poll now, then keep replacing
    /// it on the reset schedule. Returns the reset job handle.
    ///
    /// A failed initial creation is logged, not fatal — the first reset
    /// tick tries again.
    pub async fn start(self: Arc<Self>) -> Result<CronJob> {
        if let Err(e) = self.clone().reset_poll().await {
            tracing::warn!("⚠️ track '{}': initial poll creation failed: {e}", self.config.name);
        }

        let track = Arc::clone(&self);
        schedule(
            &format!("{}-reset", self.config.name),
            &self.config.reset_cron,
            self.tz,
            move || {
                let track = Arc::clone(&track);
                async move {
                    let name = track.config.name.clone();
                    if let Err(e) = track.clone().reset_poll().await {
                        tracing::warn!("⚠️ track '{name}': reset failed: {e}");
                    }
                }
            },
        )
    }

    /// Replace the active poll: stop the bound check job, create the next
    /// poll with a bounded timeout, reset moderation state, and schedule a
    /// fresh check job against the new poll id.
    ///
    /// On creation failure nothing is recorded — the previous poll id (if
    /// any) stays in place and no check job runs until a reset succeeds.
    pub async fn reset_poll(self: Arc<Self>) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some(job) = state.check_job.take() {
            job.stop();
        }

        let question = render_question(&self.config.question, self.tz);
        let created = tokio::time::timeout(
            self.create_timeout,
            self.channel
                .create_poll(&self.group_id, &question, &self.config.options, 1),
        )
        .await;

        let poll_id = match created {
            Ok(Ok(id)) if !id.is_empty() => id,
            Ok(Ok(_)) => return Err(SlotwardenError::MissingPollId),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(SlotwardenError::CreationTimeout(
                    self.create_timeout.as_secs(),
                ));
            }
        };

        tracing::info!(
            "📊 track '{}': poll {} created ({} options, capacity {})",
            self.config.name,
            poll_id,
            self.config.options.len(),
            self.config.capacity
        );

        state.poll_id = Some(poll_id);
        state.moderation = ModerationState::default();

        let track = Arc::clone(&self);
        let job = schedule(
            &format!("{}-check", self.config.name),
            &self.config.check_cron,
            self.tz,
            move || {
                let track = Arc::clone(&track);
                async move {
                    if let Err(e) = track.check_cycle().await {
                        tracing::warn!("⚠️ track '{}': check cycle failed: {e}", track.config.name);
                    }
                }
            },
        )?;
        state.check_job = Some(job);

        Ok(())
    }

    /// One scheduled check: snapshot → tally → reconcile → dispatch.
    ///
    /// State is mutated only after the snapshot is fully retrieved; a fetch
    /// failure skips the cycle and leaves state untouched. Dispatch runs
    /// after the mutation, in intent order, and a delivery failure never
    /// rolls a decision back.
    pub async fn check_cycle(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        let Some(poll_id) = state.poll_id.clone() else {
            tracing::debug!("track '{}': no active poll, skipping check", self.config.name);
            return Ok(());
        };

        let votes = self.channel.get_votes(&poll_id).await?;
        let counts = tally(&votes);
        let intents = reconcile(&counts, &votes, &mut state.moderation, self.config.capacity);

        for intent in &intents {
            self.dispatch(intent).await;
        }

        Ok(())
    }

    async fn dispatch(&self, intent: &NotificationIntent) {
        let result = match intent {
            NotificationIntent::CapacityReached { option } => {
                self.channel
                    .send_text(
                        &self.group_id,
                        &messages::capacity_reached(option, self.config.capacity),
                        &[],
                    )
                    .await
            }
            NotificationIntent::SlotOpened { option } => {
                self.channel
                    .send_text(&self.group_id, &messages::slot_opened(option), &[])
                    .await
            }
            NotificationIntent::OverflowVoterWarned { option, voter_id } => {
                let display_name = self
                    .channel
                    .contact_display_name(voter_id)
                    .await
                    .unwrap_or_else(|_| messages::FALLBACK_DISPLAY_NAME.to_string());
                self.channel
                    .send_text(
                        &self.group_id,
                        &messages::overflow_warning(&display_name, option),
                        std::slice::from_ref(voter_id),
                    )
                    .await
            }
        };

        if let Err(e) = result {
            tracing::warn!(
                "⚠️ track '{}': notification not delivered: {e}",
                self.config.name
            );
        }
    }
}

/// Expand the `{date}` placeholder with tomorrow's date in the track tz.
fn render_question(template: &str, tz: Tz) -> String {
    if !template.contains("{date}") {
        return template.to_string();
    }
    let today = Utc::now().with_timezone(&tz).date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    template.replace("{date}", &tomorrow.format("%d/%m/%Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono_tz::UTC;
    use slotwarden_core::types::{GroupChat, Vote};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[derive(Default)]
    struct MockChannel {
        votes: StdMutex<Vec<Vote>>,
        sent: StdMutex<Vec<String>>,
        created: AtomicU32,
        refuse_create: AtomicBool,
        blank_poll_id: AtomicBool,
        fail_votes: AtomicBool,
        create_delay_ms: AtomicU32,
    }

    impl MockChannel {
        fn sent_messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn set_votes(&self, votes: Vec<Vote>) {
            *self.votes.lock().unwrap() = votes;
        }
    }

    #[async_trait]
    impl PollChannel for MockChannel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn create_poll(
            &self,
            _group_id: &str,
            _question: &str,
            _options: &[String],
            _selectable_count: u8,
        ) -> Result<String> {
            let delay = self.create_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            }
            if self.refuse_create.load(Ordering::SeqCst) {
                return Err(SlotwardenError::Channel("creation refused".into()));
            }
            if self.blank_poll_id.load(Ordering::SeqCst) {
                return Ok(String::new());
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("poll-{n}"))
        }

        async fn get_votes(&self, _poll_id: &str) -> Result<Vec<Vote>> {
            if self.fail_votes.load(Ordering::SeqCst) {
                return Err(SlotwardenError::ChatNotFound("group".into()));
            }
            Ok(self.votes.lock().unwrap().clone())
        }

        async fn send_text(
            &self,
            _group_id: &str,
            message: &str,
            _mentions: &[String],
        ) -> Result<()> {
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }

        async fn contact_display_name(&self, voter_id: &str) -> Result<String> {
            Ok(format!("User {voter_id}"))
        }

        async fn ensure_chat_loaded(&self, _group_id: &str) -> Result<()> {
            Ok(())
        }

        async fn list_groups(&self) -> Result<Vec<GroupChat>> {
            Ok(vec![])
        }
    }

    fn morning_config() -> TrackConfig {
        TrackConfig {
            name: "morning".into(),
            question: "Which slot for {date}?".into(),
            options: vec!["6h".into(), "7h".into(), "8h".into()],
            capacity: 1,
            reset_cron: "0 20 * * *".into(),
            check_cron: "*/1 * * * *".into(),
        }
    }

    fn track_with(channel: Arc<MockChannel>) -> Arc<PollTrack> {
        Arc::new(PollTrack::new(morning_config(), "group@test", UTC, channel))
    }

    #[tokio::test]
    async fn test_reset_records_poll_id_and_starts_check_job() {
        let channel = Arc::new(MockChannel::default());
        let track = track_with(channel.clone());

        track.clone().reset_poll().await.unwrap();

        assert_eq!(track.poll_id().await, Some("poll-1".into()));
        assert!(track.state.lock().await.check_job.is_some());
    }

    #[tokio::test]
    async fn test_reset_replaces_the_active_poll() {
        let channel = Arc::new(MockChannel::default());
        let track = track_with(channel.clone());

        track.clone().reset_poll().await.unwrap();
        track.clone().reset_poll().await.unwrap();

        assert_eq!(track.poll_id().await, Some("poll-2".into()));
        assert_eq!(channel.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_creation_keeps_previous_poll_id() {
        let channel = Arc::new(MockChannel::default());
        let track = track_with(channel.clone());
        track.clone().reset_poll().await.unwrap();

        channel.refuse_create.store(true, Ordering::SeqCst);
        let result = track.clone().reset_poll().await;

        assert!(matches!(result, Err(SlotwardenError::Channel(_))));
        assert_eq!(track.poll_id().await, Some("poll-1".into()));
    }

    #[tokio::test]
    async fn test_blank_poll_id_is_a_creation_failure() {
        let channel = Arc::new(MockChannel::default());
        channel.blank_poll_id.store(true, Ordering::SeqCst);
        let track = track_with(channel);

        let result = track.clone().reset_poll().await;

        assert!(matches!(result, Err(SlotwardenError::MissingPollId)));
        assert_eq!(track.poll_id().await, None);
    }

    #[tokio::test]
    async fn test_slow_creation_times_out() {
        let channel = Arc::new(MockChannel::default());
        channel.create_delay_ms.store(200, Ordering::SeqCst);
        let track = Arc::new(
            PollTrack::new(morning_config(), "group@test", UTC, channel)
                .with_create_timeout(Duration::from_millis(20)),
        );

        let result = track.clone().reset_poll().await;

        assert!(matches!(result, Err(SlotwardenError::CreationTimeout(_))));
        assert_eq!(track.poll_id().await, None);
    }

    #[tokio::test]
    async fn test_check_cycle_announces_transitions_in_order() {
        let channel = Arc::new(MockChannel::default());
        let track = track_with(channel.clone());
        track.clone().reset_poll().await.unwrap();

        // alice fills the slot.
        channel.set_votes(vec![Vote::single("6h", 100, "alice")]);
        track.check_cycle().await.unwrap();
        assert_eq!(channel.sent_messages(), vec![messages::capacity_reached("6h", 1)]);

        // bob votes over capacity → personally addressed warning.
        channel.set_votes(vec![
            Vote::single("6h", 100, "alice"),
            Vote::single("6h", 200, "bob"),
        ]);
        track.check_cycle().await.unwrap();
        assert_eq!(
            channel.sent_messages().last().unwrap(),
            &messages::overflow_warning("User bob", "6h")
        );

        // everyone withdraws → the slot reopens.
        channel.set_votes(vec![]);
        track.check_cycle().await.unwrap();
        assert_eq!(
            channel.sent_messages().last().unwrap(),
            &messages::slot_opened("6h")
        );
    }

    #[tokio::test]
    async fn test_snapshot_failure_skips_cycle_without_mutation() {
        let channel = Arc::new(MockChannel::default());
        let track = track_with(channel.clone());
        track.clone().reset_poll().await.unwrap();

        channel.fail_votes.store(true, Ordering::SeqCst);
        let result = track.check_cycle().await;

        assert!(matches!(result, Err(SlotwardenError::ChatNotFound(_))));
        assert!(channel.sent_messages().is_empty());

        // Next tick proceeds normally once the fetch recovers.
        channel.fail_votes.store(false, Ordering::SeqCst);
        channel.set_votes(vec![Vote::single("6h", 100, "alice")]);
        track.check_cycle().await.unwrap();
        assert_eq!(channel.sent_messages(), vec![messages::capacity_reached("6h", 1)]);
    }

    #[tokio::test]
    async fn test_check_cycle_without_active_poll_is_a_noop() {
        let channel = Arc::new(MockChannel::default());
        let track = track_with(channel.clone());

        track.check_cycle().await.unwrap();
        assert!(channel.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_moderation_state() {
        let channel = Arc::new(MockChannel::default());
        let track = track_with(channel.clone());
        track.clone().reset_poll().await.unwrap();

        channel.set_votes(vec![Vote::single("6h", 100, "alice")]);
        track.check_cycle().await.unwrap();
        assert!(track.state.lock().await.moderation.is_full("6h"));

        track.clone().reset_poll().await.unwrap();
        assert!(!track.state.lock().await.moderation.is_full("6h"));

        // The same close announces again on the new poll instance.
        track.check_cycle().await.unwrap();
        assert_eq!(
            channel.sent_messages().last().unwrap(),
            &messages::capacity_reached("6h", 1)
        );
    }

    #[test]
    fn test_render_question_expands_date() {
        let rendered = render_question("Which slot for {date}?", UTC);
        assert!(!rendered.contains("{date}"));
        // DD/MM/YYYY
        assert!(rendered.contains('/'));

        assert_eq!(render_question("Static question", UTC), "Static question");
    }
}
