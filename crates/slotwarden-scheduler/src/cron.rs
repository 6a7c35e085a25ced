//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Wildcards: *, */N, N, comma lists
//! Example: "0 20 * * *" = every day at 20:00, "0 8 * * 6" = Saturdays at 8:00
//!
//! Evaluated in a named timezone, so schedules track local wall-clock time.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use chrono_tz::Tz;

/// Parsed field sets for one cron expression.
pub(crate) struct CronFields {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days: Vec<u32>,
    months: Vec<u32>,
    /// 0 = Sunday .. 6 = Saturday.
    weekdays: Vec<u32>,
}

impl CronFields {
    fn matches(&self, t: &DateTime<Tz>) -> bool {
        self.minutes.contains(&t.minute())
            && self.hours.contains(&t.hour())
            && self.days.contains(&t.day())
            && self.months.contains(&t.month())
            && self.weekdays.contains(&t.weekday().num_days_from_sunday())
    }
}

/// Parse a cron expression into its field sets.
pub(crate) fn parse_expression(expression: &str) -> Option<CronFields> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 {
        tracing::warn!(
            "Invalid cron expression: '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
            expression
        );
        return None;
    }

    Some(CronFields {
        minutes: parse_field(parts[0], 0, 59)?,
        hours: parse_field(parts[1], 0, 23)?,
        days: parse_field(parts[2], 1, 31)?,
        months: parse_field(parts[3], 1, 12)?,
        weekdays: parse_field(parts[4], 0, 6)?,
    })
}

/// Whether an expression parses.
pub fn validate(expression: &str) -> bool {
    parse_expression(expression).is_some()
}

/// Compute the next run time after `after`, evaluating the expression in `tz`.
pub fn next_run_from_cron(expression: &str, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let fields = parse_expression(expression)?;

    let mut candidate = after.with_timezone(&tz) + Duration::minutes(1);
    // Zero out sub-minute precision
    candidate = candidate.with_second(0).unwrap_or(candidate);
    candidate = candidate.with_nanosecond(0).unwrap_or(candidate);

    // Scan up to 35 days ahead — covers weekly and monthly schedules
    for _ in 0..(35 * 24 * 60) {
        if fields.matches(&candidate) {
            return Some(candidate.with_timezone(&Utc));
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Parse a cron field into a list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N — every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    // Comma-separated: "0,15,30,45"
    if field.contains(',') {
        let vals: std::result::Result<Vec<u32>, _> =
            field.split(',').map(|s| s.trim().parse()).collect();
        return vals
            .ok()
            .map(|v| v.into_iter().filter(|x| *x >= min && *x <= max).collect());
    }

    // Single number
    let n: u32 = field.parse().ok()?;
    if n >= min && n <= max { Some(vec![n]) } else { None }
}
