//! Cancellable cron jobs on tokio timers.
//! Zero overhead when idle: each job is one task sleeping until its next
//! fire time.

use std::future::Future;

use chrono::Utc;
use chrono_tz::Tz;

use slotwarden_core::error::{Result, SlotwardenError};

use crate::cron;

/// Handle to a running scheduled job. A stopped job never fires again.
pub struct CronJob {
    name: String,
    handle: tokio::task::JoinHandle<()>,
}

impl CronJob {
    /// Stop the job. Effective immediately; the pending tick is cancelled.
    pub fn stop(&self) {
        tracing::debug!("⏹ job '{}' stopped", self.name);
        self.handle.abort();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CronJob {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Schedule `callback` on a cron cadence evaluated in `tz`.
///
/// The callback owns its own error handling — anything it needs reported it
/// must log itself, so one bad tick can never kill the schedule.
pub fn schedule<F, Fut>(name: &str, expression: &str, tz: Tz, callback: F) -> Result<CronJob>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    if !cron::validate(expression) {
        return Err(SlotwardenError::Cron(expression.to_string()));
    }

    let expr = expression.to_string();
    let job_name = name.to_string();
    let handle = tokio::spawn({
        let job_name = job_name.clone();
        async move {
            loop {
                let now = Utc::now();
                let Some(next) = cron::next_run_from_cron(&expr, now, tz) else {
                    tracing::warn!("⏰ job '{}': no future run for '{}', stopping", job_name, expr);
                    return;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                tracing::debug!("🔔 job '{}' fired", job_name);
                callback().await;
            }
        }
    });

    tracing::info!("⏰ job '{}' scheduled: '{}' ({})", name, expression, tz);
    Ok(CronJob {
        name: job_name,
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;

    #[tokio::test]
    async fn test_schedule_rejects_invalid_expression() {
        let result = schedule("bad-job", "not a cron", UTC, || async {});
        assert!(matches!(result, Err(SlotwardenError::Cron(_))));
    }

    #[tokio::test]
    async fn test_stop_cancels_the_job() {
        let job = schedule("idle-job", "0 0 * * *", UTC, || async {}).unwrap();
        assert!(!job.is_stopped());

        job.stop();
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(job.is_stopped());
    }
}
