//! # Slotwarden Moderation
//!
//! The capacity-bounded poll moderation engine.
//!
//! ```text
//! check job tick (scheduler)
//!   └── PollTrack::check_cycle
//!         ├── channel.get_votes(poll_id)        snapshot
//!         ├── tally(votes)                      per-option counts
//!         ├── reconcile(tally, state, cap)      transition intents
//!         │     ├── phase 1: reopenings         (SlotOpened)
//!         │     └── phase 2: closings/overflow  (CapacityReached,
//!         │                                      OverflowVoterWarned)
//!         └── dispatch each intent in order     channel.send_text
//!
//! reset job tick (scheduler)
//!   └── PollTrack::reset_poll
//!         ├── stop the bound check job
//!         ├── channel.create_poll (bounded timeout)
//!         └── fresh ModerationState + new check job
//! ```

pub mod lifecycle;
pub mod messages;
pub mod moderator;
pub mod tally;

pub use lifecycle::PollTrack;
pub use moderator::{ModerationState, NotificationIntent, reconcile};
pub use tally::{last_qualifying_voter, tally};
