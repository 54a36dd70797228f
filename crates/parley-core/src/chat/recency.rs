//! Human-friendly "last active" labels for chat listings.

use chrono::{DateTime, Utc};

/// Label a timestamp relative to `now`: `Today`, `Yesterday`, `N days ago`
/// for the past week, and the calendar date beyond that.
///
/// Days are counted as whole 24-hour periods, so something 23 hours old is
/// still "Today". Timestamps in the future also read as "Today".
pub fn recency_label(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - at).num_days();
    match days {
        i64::MIN..=0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{days} days ago"),
        _ => at.format("%Y-%m-%d").to_string(),
    }
}
