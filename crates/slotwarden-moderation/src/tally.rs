//! Vote tallying — pure functions over a poll snapshot.

use slotwarden_core::types::{Tally, Vote};

/// Count votes per option.
///
/// Ballots with an empty selection are anomalies under single-select polls;
/// they are skipped and logged, never an error. Counts do not depend on the
/// order votes arrive in.
pub fn tally(votes: &[Vote]) -> Tally {
    let mut counts = Tally::default();
    for vote in votes {
        if vote.selected_options.is_empty() {
            tracing::debug!("ballot from {} carries no selection, skipping", vote.voter_id);
            continue;
        }
        for option in &vote.selected_options {
            counts.increment(option);
        }
    }
    counts
}

/// The voter who most recently selected `option`: maximum timestamp, with
/// ties going to the vote that appears last in the snapshot.
pub fn last_qualifying_voter<'a>(votes: &'a [Vote], option: &str) -> Option<&'a str> {
    votes
        .iter()
        .filter(|vote| vote.selected_options.iter().any(|name| name == option))
        .max_by_key(|vote| vote.timestamp)
        .map(|vote| vote.voter_id.as_str())
}
