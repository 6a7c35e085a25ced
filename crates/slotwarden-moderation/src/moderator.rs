//! Capacity moderation — turns a tally into notification intents.

use std::collections::BTreeSet;

use slotwarden_core::types::{Tally, Vote};

use crate::tally::last_qualifying_voter;

/// Notification decisions for one poll instance, carried across check
/// cycles so each transition is announced exactly once.
///
/// Created empty when a poll is created, mutated only by [`reconcile`],
/// and discarded when the poll is superseded.
#[derive(Debug, Clone, Default)]
pub struct ModerationState {
    /// Options at or above capacity that the group was already told about.
    full_options: BTreeSet<String>,
    /// (option, voter) pairs already warned for an over-capacity vote.
    /// Invariant: a pair exists only while its option is in `full_options`.
    notified_overflow: BTreeSet<(String, String)>,
}

impl ModerationState {
    pub fn is_full(&self, option: &str) -> bool {
        self.full_options.contains(option)
    }

    pub fn overflow_warned(&self, option: &str, voter_id: &str) -> bool {
        self.notified_overflow
            .contains(&(option.to_string(), voter_id.to_string()))
    }
}

/// A decided notification action, not yet delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationIntent {
    /// An option reached (or jumped past) capacity and is now closed.
    CapacityReached { option: String },
    /// A previously full option dropped back below capacity.
    SlotOpened { option: String },
    /// A voter pushed or kept an option above capacity after closure.
    OverflowVoterWarned { option: String, voter_id: String },
}

/// Compare the current tally against `state` and decide what to announce.
///
/// Two phases, reopening strictly before closing. Phase 1 judges the
/// pre-cycle `full_options` membership against current counts, so an option
/// that lost votes since the last cycle resolves to a reopen alone and can
/// never pick up a stale overflow warning in the same cycle.
pub fn reconcile(
    tally: &Tally,
    votes: &[Vote],
    state: &mut ModerationState,
    capacity: u32,
) -> Vec<NotificationIntent> {
    let mut intents = Vec::new();

    // Phase 1 — reopening
    let reopened: Vec<String> = state
        .full_options
        .iter()
        .filter(|option| tally.count(option.as_str()) < capacity)
        .cloned()
        .collect();
    for option in reopened {
        state.full_options.remove(&option);
        state.notified_overflow.retain(|(opt, _)| *opt != option);
        intents.push(NotificationIntent::SlotOpened { option });
    }

    // Phase 2 — closing and overflow
    for (option, count) in tally.iter() {
        if count >= capacity && !state.full_options.contains(option) {
            state.full_options.insert(option.to_string());
            intents.push(NotificationIntent::CapacityReached {
                option: option.to_string(),
            });
        }
        if count > capacity
            && let Some(voter) = last_qualifying_voter(votes, option)
        {
            let key = (option.to_string(), voter.to_string());
            if state.full_options.contains(option) && !state.notified_overflow.contains(&key) {
                state.notified_overflow.insert(key);
                intents.push(NotificationIntent::OverflowVoterWarned {
                    option: option.to_string(),
                    voter_id: voter.to_string(),
                });
            }
        }
    }

    intents
}
