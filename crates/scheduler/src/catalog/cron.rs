//! Cron normalization, parsing and next-occurrence helpers.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::CatalogError;

/// Turn a crontab expression into the form the `cron` crate parses.
///
/// Projects publish classic five-field crontab (`min hour dom month dow`,
/// Sunday = 0 or 7). Those gain a leading `0` seconds field and their
/// numeric day-of-week items are rewritten to the crate's numbering
/// (Sunday = 1 … Saturday = 7). Six- and seven-field expressions are already
/// in the crate's dialect and only get trimmed.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.as_slice() {
        [minute, hour, dom, month, dow] => {
            format!("0 {minute} {hour} {dom} {month} {}", crontab_day_of_week(dow))
        }
        _ => expr.trim().to_string(),
    }
}

/// Rewrite a crontab day-of-week field item by item. Named days and items
/// that do not parse as numbers are left for the crate to judge.
fn crontab_day_of_week(field: &str) -> String {
    if field == "*" || field == "?" {
        return field.to_string();
    }
    field
        .split(',')
        .map(|item| match crontab_days(item) {
            Some(days) => days
                .into_iter()
                .map(|day| (day + 1).to_string())
                .collect::<Vec<_>>()
                .join(","),
            None => item.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Crontab days (Sunday = 0) selected by one list item: `n`, `a-b`, `*/s`,
/// `a-b/s` or `a/s`.
fn crontab_days(item: &str) -> Option<BTreeSet<u32>> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, step.parse::<usize>().ok().filter(|s| *s > 0)?),
        None => (item, 1),
    };
    let (start, end): (u32, u32) = if base == "*" {
        (0, 6)
    } else if let Some((a, b)) = base.split_once('-') {
        (a.parse().ok()?, b.parse().ok()?)
    } else {
        let day = base.parse().ok()?;
        if item.contains('/') {
            (day, 6)
        } else {
            (day, day)
        }
    };
    if start > end || end > 7 {
        return None;
    }
    Some((start..=end).step_by(step).map(|day| day % 7).collect())
}

/// Parse a task's cron expression, accepting 5-, 6- and 7-field forms.
pub fn parse_cron(task: &str, expr: &str) -> Result<Schedule, CatalogError> {
    Schedule::from_str(&normalize_cron(expr)).map_err(|source| CatalogError::CronParse {
        task: task.to_string(),
        expression: expr.to_string(),
        source,
    })
}

/// Resolve an IANA timezone name.
pub fn resolve_timezone(name: &str) -> Result<Tz, CatalogError> {
    name.parse::<Tz>()
        .map_err(|_| CatalogError::Timezone(name.to_string()))
}

/// Time from `now` until the schedule's next occurrence strictly after it,
/// paired with that occurrence in UTC. `None` when the schedule never fires
/// again.
pub fn time_until_next<Z: TimeZone>(
    schedule: &Schedule,
    now: &DateTime<Z>,
) -> Option<(chrono::Duration, DateTime<Utc>)> {
    schedule
        .after(now)
        .next()
        .map(|next| {
            let occurrence = next.with_timezone(&Utc);
            (next.signed_duration_since(now), occurrence)
        })
}
