//! # Slotwarden Channels
//! Messaging-platform implementations of the `PollChannel` seam.

pub mod whatsapp;

pub use whatsapp::WhatsAppChannel;
