//! [`ProjectScheduler`]: one project's refresh, evaluate and dispatch cycle.
//!
//! Each call to [`call`](ProjectScheduler::call) runs the cycle once:
//!
//! 1. **Refresh** the catalog when it is stale. A failed fetch keeps the old
//!    catalog and leaves `last_update` alone so the next tick retries.
//! 2. **Evaluate** which tasks fire before the next tick, in the catalog's
//!    timezone (UTC when that timezone is unknown).
//! 3. **Dispatch** every due task in one signed POST.
//!
//! Nothing inside the cycle returns an error to the caller. Failures are
//! logged here, at the project boundary, and reported in the [`CycleReport`].

use std::collections::HashMap;
use std::sync::Arc;

use beatle_core::ProjectConfig;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::catalog::{DueTask, TaskCatalog};
use crate::client::ProjectClient;
use crate::error::SchedulerError;

/// What happened to the catalog during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Catalog was fresh; no fetch.
    Fresh,
    /// Catalog replaced by a newly fetched one.
    Refreshed,
    /// Fetch or rebuild failed; the previous catalog stays in use.
    Failed,
}

/// Summary of one cycle, mostly for tests and debug logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub project: String,
    pub refresh: RefreshOutcome,
    /// Names sent (or attempted) in this cycle's POST.
    pub due: Vec<String>,
    /// Whether the POST succeeded. `false` when nothing was due.
    pub dispatched: bool,
}

/// Owns one project's catalog and dispatch state.
///
/// Cycles of the same project may overlap when a previous tick is slow. The
/// catalog is swapped as a whole behind a lock and never mutated in place.
pub struct ProjectScheduler {
    config: ProjectConfig,
    client: ProjectClient,
    catalog: RwLock<Arc<TaskCatalog>>,
    fire_log: Mutex<FireLog>,
}

/// Occurrence bookkeeping that keeps a task from firing twice.
#[derive(Debug, Default)]
struct FireLog {
    /// Task name → occurrence most recently dispatched with success.
    fired: HashMap<String, DateTime<Utc>>,
    /// Task name → occurrence held by a cycle whose POST is in flight.
    claimed: HashMap<String, DateTime<Utc>>,
}

impl ProjectScheduler {
    pub fn new(config: ProjectConfig, http: reqwest::Client) -> Result<Self, SchedulerError> {
        let client = ProjectClient::new(&config, http)?;
        let catalog = TaskCatalog::empty(&config);
        Ok(Self {
            config,
            client,
            catalog: RwLock::new(Arc::new(catalog)),
            fire_log: Mutex::new(FireLog::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Current catalog snapshot.
    pub async fn catalog(&self) -> Arc<TaskCatalog> {
        self.catalog.read().await.clone()
    }

    /// Run one cycle against the current time.
    pub async fn call(&self) -> CycleReport {
        self.call_at(Utc::now()).await
    }

    /// Run one cycle as if the current time were `now`.
    pub async fn call_at(&self, now: DateTime<Utc>) -> CycleReport {
        let refresh = self.refresh_if_stale(now).await;
        let catalog = self.catalog().await;

        let due = self.evaluate(&catalog, now);
        let due = self.claim(due).await;

        let mut report = CycleReport {
            project: self.config.name.clone(),
            refresh,
            due: due.iter().map(|t| t.name.clone()).collect(),
            dispatched: false,
        };

        if due.is_empty() {
            debug!(project = %self.config.name, tasks = catalog.len(), "no tasks due");
            return report;
        }

        report.dispatched = self.dispatch(&catalog, &due).await;
        report
    }

    async fn refresh_if_stale(&self, now: DateTime<Utc>) -> RefreshOutcome {
        let current = self.catalog().await;
        if !current.is_stale(now) {
            return RefreshOutcome::Fresh;
        }

        let payload = match self.client.fetch(current.timeout).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    project = %self.config.name,
                    error = %e,
                    cached_tasks = current.len(),
                    "catalog fetch failed, keeping previous catalog"
                );
                return RefreshOutcome::Failed;
            }
        };

        match current.refreshed(payload, now, self.config.strict_cron) {
            Ok(next) => {
                info!(
                    project = %self.config.name,
                    tasks = next.len(),
                    timezone = %next.timezone,
                    update_every_secs = next.update_every.as_secs(),
                    "catalog refreshed"
                );
                *self.catalog.write().await = Arc::new(next);
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                warn!(
                    project = %self.config.name,
                    error = %e,
                    "catalog rejected, keeping previous catalog"
                );
                RefreshOutcome::Failed
            }
        }
    }

    fn evaluate(&self, catalog: &TaskCatalog, now: DateTime<Utc>) -> Vec<DueTask> {
        let local = match catalog.local_now(now) {
            Ok(local) => local,
            Err(e) => {
                error!(
                    project = %self.config.name,
                    error = %e,
                    "wrong timezone provided, evaluating in UTC"
                );
                now.with_timezone(&Tz::UTC)
            }
        };
        catalog.due_tasks(&local, self.config.loop_timeout)
    }

    /// Claim the due occurrences for this cycle.
    ///
    /// Tasks whose occurrence was already dispatched, or is claimed by an
    /// overlapping cycle still waiting on its POST, are dropped.
    async fn claim(&self, due: Vec<DueTask>) -> Vec<DueTask> {
        let mut log = self.fire_log.lock().await;
        due.into_iter()
            .filter(|task| {
                let taken = log.fired.get(&task.name) == Some(&task.occurrence)
                    || log.claimed.get(&task.name) == Some(&task.occurrence);
                if taken {
                    debug!(
                        project = %self.config.name,
                        task = %task.name,
                        occurrence = %task.occurrence,
                        "occurrence already dispatched or in flight"
                    );
                } else {
                    log.claimed.insert(task.name.clone(), task.occurrence);
                }
                !taken
            })
            .collect()
    }

    /// Release this cycle's claims. Successful occurrences become fired; failed
    /// ones stay eligible for the next tick.
    async fn settle(&self, catalog: &TaskCatalog, due: &[DueTask], delivered: bool) {
        let mut log = self.fire_log.lock().await;
        for task in due {
            if log.claimed.get(&task.name) == Some(&task.occurrence) {
                log.claimed.remove(&task.name);
            }
        }
        if delivered {
            log.fired.retain(|name, _| catalog.get(name).is_some());
            for task in due {
                log.fired.insert(task.name.clone(), task.occurrence);
            }
        }
    }

    async fn dispatch(&self, catalog: &TaskCatalog, due: &[DueTask]) -> bool {
        let names: Vec<String> = due.iter().map(|t| t.name.clone()).collect();

        let delivered = match self.client.dispatch(&names, catalog.timeout).await {
            Ok(response) => {
                info!(
                    project = %self.config.name,
                    tasks = ?names,
                    has_response = response.is_some(),
                    "tasks dispatched"
                );
                true
            }
            Err(e) => {
                warn!(
                    project = %self.config.name,
                    tasks = ?names,
                    error = %e,
                    "dispatch failed"
                );
                false
            }
        };

        self.settle(catalog, due, delivered).await;
        delivered
    }
}
