//! [`TaskCatalog`]: one project's cached task schedules and settings.

use std::collections::BTreeMap;
use std::time::Duration;

use beatle_core::ProjectConfig;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::warn;

use crate::client::RemotePayload;
use crate::error::CatalogError;

use super::cron::{parse_cron, resolve_timezone, time_until_next};

/// A task whose cron expression parsed successfully.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: String,
    /// Expression as published by the project.
    pub expression: String,
    pub schedule: Schedule,
}

/// A task whose next occurrence falls inside the current tick window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTask {
    pub name: String,
    /// Time left until the occurrence.
    pub remaining: chrono::Duration,
    /// The occurrence being fired, in UTC.
    pub occurrence: DateTime<Utc>,
}

/// Cached view of a project's tasks plus the effective settings.
///
/// Catalogs are never mutated in place; [`refreshed`](TaskCatalog::refreshed)
/// returns a replacement.
#[derive(Debug, Clone)]
pub struct TaskCatalog {
    tasks: BTreeMap<String, ScheduledTask>,
    /// IANA timezone name, resolved on every evaluation.
    pub timezone: String,
    pub update_every: Duration,
    pub timeout: Duration,
    last_update: Option<DateTime<Utc>>,
}

impl TaskCatalog {
    /// An empty, never-refreshed catalog carrying the project defaults.
    pub fn empty(project: &ProjectConfig) -> Self {
        Self {
            tasks: BTreeMap::new(),
            timezone: project.timezone.clone(),
            update_every: project.update_every,
            timeout: project.timeout,
            last_update: None,
        }
    }

    /// When the catalog was last replaced by a successful refresh.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Whether the catalog must be fetched again at `now`.
    ///
    /// True when it was never refreshed, or when `update_every` has elapsed
    /// since the last refresh.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_update else {
            return true;
        };
        match now.signed_duration_since(last).to_std() {
            Ok(age) => age >= self.update_every,
            // Clock moved backwards; the catalog is younger than zero.
            Err(_) => false,
        }
    }

    /// Build the catalog that replaces `self` after a successful fetch.
    ///
    /// Tasks are replaced wholesale. Timezone, timeout and refresh interval
    /// come from the payload when present and keep their current values
    /// otherwise; zero or negative timeouts and intervals count as absent.
    ///
    /// An unparseable cron expression drops that task with a warning, or,
    /// when `strict` is set, rejects the whole payload.
    pub fn refreshed(
        &self,
        payload: RemotePayload,
        now: DateTime<Utc>,
        strict: bool,
    ) -> Result<Self, CatalogError> {
        let mut tasks = BTreeMap::new();
        for (name, expression) in payload.tasks.unwrap_or_default() {
            match parse_cron(&name, &expression) {
                Ok(schedule) => {
                    tasks.insert(
                        name.clone(),
                        ScheduledTask {
                            name,
                            expression,
                            schedule,
                        },
                    );
                }
                Err(e) if strict => return Err(e),
                Err(e) => {
                    warn!(task = %name, error = %e, "dropping task with invalid cron expression");
                }
            }
        }

        Ok(Self {
            tasks,
            timezone: payload
                .time_zone
                .filter(|tz| !tz.is_empty())
                .unwrap_or_else(|| self.timezone.clone()),
            update_every: payload
                .update_every
                .filter(|secs| *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .unwrap_or(self.update_every),
            timeout: payload
                .timeout
                .filter(|secs| *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .unwrap_or(self.timeout),
            last_update: Some(now),
        })
    }

    /// `now` expressed in the catalog's timezone.
    pub fn local_now(&self, now: DateTime<Utc>) -> Result<DateTime<Tz>, CatalogError> {
        let tz = resolve_timezone(&self.timezone)?;
        Ok(now.with_timezone(&tz))
    }

    /// Tasks whose next occurrence after `now` is less than `window` away,
    /// ordered by task name.
    pub fn due_tasks<Z: TimeZone>(&self, now: &DateTime<Z>, window: Duration) -> Vec<DueTask> {
        self.tasks
            .values()
            .filter_map(|task| {
                let (remaining, occurrence) = time_until_next(&task.schedule, now)?;
                let inside = remaining.to_std().map_or(true, |left| left < window);
                inside.then(|| DueTask {
                    name: task.name.clone(),
                    remaining,
                    occurrence,
                })
            })
            .collect()
    }

    /// Get a scheduled task by name.
    pub fn get(&self, name: &str) -> Option<&ScheduledTask> {
        self.tasks.get(name)
    }

    /// Task names in sorted order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Number of scheduled tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the catalog has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
