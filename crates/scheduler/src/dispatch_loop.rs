//! Leader-gated tick loop fanning out one cycle per project.
//!
//! Every tick the loop asks the [`LeaderGate`] whether this node leads. If
//! it does, one [`ProjectScheduler::call`] per project is spawned into a
//! [`JoinSet`]; the loop does not wait for them before sleeping. Finished
//! cycles are reaped at the start of the next tick.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beatle_core::BeatleConfig;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::SchedulerError;
use crate::leader::LeaderGate;
use crate::project::{CycleReport, ProjectScheduler};

/// How long in-flight cycles may run after shutdown is requested.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// This node is not the leader; nothing was started.
    NotLeader,
    /// This many project cycles were spawned.
    Dispatched(usize),
}

/// The top-level dispatcher.
pub struct DispatchLoop {
    node_id: String,
    tick: Duration,
    gate: Arc<dyn LeaderGate>,
    projects: Vec<Arc<ProjectScheduler>>,
    shutdown_grace: Duration,
    was_leader: AtomicBool,
}

impl DispatchLoop {
    /// Build a scheduler for every configured project, sharing one HTTP
    /// connection pool.
    pub fn new(
        node_id: impl Into<String>,
        config: &BeatleConfig,
        gate: Arc<dyn LeaderGate>,
    ) -> Result<Self, SchedulerError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(SchedulerError::HttpClient)?;

        let projects = config
            .projects
            .iter()
            .map(|p| ProjectScheduler::new(p.clone(), http.clone()).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_schedulers(node_id, config.loop_timeout, gate, projects))
    }

    pub fn from_schedulers(
        node_id: impl Into<String>,
        tick: Duration,
        gate: Arc<dyn LeaderGate>,
        projects: Vec<Arc<ProjectScheduler>>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            tick,
            gate,
            projects,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            was_leader: AtomicBool::new(false),
        }
    }

    /// Set how long in-flight cycles may run after shutdown (default: 5s).
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn projects(&self) -> &[Arc<ProjectScheduler>] {
        &self.projects
    }

    /// Run ticks until `shutdown` resolves, then drain in-flight cycles.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        info!(
            node = %self.node_id,
            tick_secs = self.tick.as_secs(),
            projects = self.projects.len(),
            "dispatch loop started"
        );

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    reap(&mut in_flight);
                    self.tick(&mut in_flight).await;
                }
                _ = &mut shutdown => {
                    info!(node = %self.node_id, "dispatch loop shutting down");
                    break;
                }
            }
        }

        self.drain(in_flight).await;
    }

    /// Run one tick: check leadership and spawn a cycle per project.
    pub async fn tick(&self, in_flight: &mut JoinSet<CycleReport>) -> TickOutcome {
        let leader = self.gate.is_leader(&self.node_id).await;
        let was_leader = self.was_leader.swap(leader, Ordering::SeqCst);

        if leader && !was_leader {
            info!(node = %self.node_id, "{} is leader", self.node_id);
        } else if !leader && was_leader {
            warn!(node = %self.node_id, "leadership lost, dispatch paused");
        }

        if !leader {
            debug!(node = %self.node_id, "not leader, skipping tick");
            return TickOutcome::NotLeader;
        }

        for project in &self.projects {
            let project = Arc::clone(project);
            in_flight.spawn(async move { project.call().await });
        }
        TickOutcome::Dispatched(self.projects.len())
    }

    async fn drain(&self, mut in_flight: JoinSet<CycleReport>) {
        if in_flight.is_empty() {
            return;
        }
        let pending = in_flight.len();
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(result) = in_flight.join_next().await {
                log_join(result);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                node = %self.node_id,
                pending,
                grace = ?self.shutdown_grace,
                "in-flight cycles did not finish, aborting"
            );
            in_flight.abort_all();
        }
    }
}

/// Collect cycles that already finished without waiting for the rest.
fn reap(in_flight: &mut JoinSet<CycleReport>) {
    while let Some(result) = in_flight.try_join_next() {
        log_join(result);
    }
}

fn log_join(result: Result<CycleReport, tokio::task::JoinError>) {
    match result {
        Ok(report) => debug!(
            project = %report.project,
            refresh = ?report.refresh,
            due = ?report.due,
            dispatched = report.dispatched,
            "cycle finished"
        ),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "project cycle panicked"),
    }
}
