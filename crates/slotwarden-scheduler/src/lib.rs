//! # Slotwarden Scheduler
//!
//! Cron parsing + cancellable jobs on tokio timers.
//!
//! ```text
//! schedule("*/1 * * * *", tz, callback) ─▶ CronJob
//!   └── spawned loop: next fire time → sleep → callback().await → repeat
//!       CronJob::stop() aborts the loop before the next tick
//! ```
//!
//! Schedules are evaluated in a named IANA timezone; "0 20 * * *" in
//! America/Belem fires at 20:00 Belém time regardless of the host clock.

pub mod cron;
pub mod job;

pub use job::{CronJob, schedule};
