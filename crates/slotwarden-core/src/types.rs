//! Domain types shared across crates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One submitted ballot, as read from a poll snapshot. Immutable once read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    /// Option names this ballot selected. Single-select polls produce one
    /// entry, but the platform can hand back several or none.
    #[serde(default)]
    pub selected_options: Vec<String>,
    /// Epoch millis at which the vote was cast.
    pub timestamp: i64,
    /// Stable platform identifier of the voter.
    pub voter_id: String,
}

impl Vote {
    /// A single-selection ballot.
    pub fn single(option: &str, timestamp: i64, voter_id: &str) -> Self {
        Self {
            selected_options: vec![option.to_string()],
            timestamp,
            voter_id: voter_id.to_string(),
        }
    }
}

/// Per-option vote counts for one snapshot.
///
/// Rebuilt from scratch every check cycle, never mutated in place. Backed by
/// a BTreeMap so iteration (and therefore notification order) is always
/// lexicographic by option name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally(BTreeMap<String, u32>);

impl Tally {
    pub fn count(&self, option: &str) -> u32 {
        self.0.get(option).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, option: &str) {
        *self.0.entry(option.to_string()).or_insert(0) += 1;
    }

    /// Options with at least one vote, in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A group chat visible to the bridge session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChat {
    pub id: String,
    pub name: String,
}
