//! Group-facing message rendering for notification intents.

/// Generic label when the platform cannot resolve a contact.
pub const FALLBACK_DISPLAY_NAME: &str = "Participant";

pub fn capacity_reached(option: &str, capacity: u32) -> String {
    format!("🚫 *{option}* hit the limit of {capacity} participant(s) and is now closed.")
}

pub fn slot_opened(option: &str) -> String {
    format!("🔓 *{option}* has an open spot again!")
}

pub fn overflow_warning(display_name: &str, option: &str) -> String {
    format!("{display_name}, *{option}* is already closed. Please pick another option.")
}
