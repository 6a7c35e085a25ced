//! # Slotwarden Core
//! Shared foundation: error taxonomy, configuration, domain types, and the
//! collaborator traits the moderation engine talks through.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{BridgeConfig, SlotwardenConfig, TrackConfig};
pub use error::{Result, SlotwardenError};
pub use traits::PollChannel;
pub use types::{GroupChat, Tally, Vote};
