//! Cluster leadership as seen by the dispatcher.
//!
//! Consensus itself runs elsewhere. The dispatcher only asks whether this
//! node currently leads, through the [`LeaderGate`] trait:
//!
//! - [`StandaloneGate`]: single-node deployments, always leader
//! - [`WatchLeaderGate`]: leadership pushed in by an in-process consensus adapter
//! - [`FileLeaderGate`]: leader id published to a file by an external agent

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

/// Poll interval used by the default [`LeaderGate::wait_until_leader`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Leadership status source consumed by the dispatch loop.
#[async_trait]
pub trait LeaderGate: Send + Sync {
    /// Whether `node_id` is the current leader.
    async fn is_leader(&self, node_id: &str) -> bool;

    /// Resolve once `node_id` becomes leader.
    async fn wait_until_leader(&self, node_id: &str) {
        while !self.is_leader(node_id).await {
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

/// Gate for a node running without peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandaloneGate;

#[async_trait]
impl LeaderGate for StandaloneGate {
    async fn is_leader(&self, _node_id: &str) -> bool {
        true
    }

    async fn wait_until_leader(&self, _node_id: &str) {}
}

/// Gate fed by a consensus adapter living in the same process.
///
/// The adapter calls [`set_leader`](WatchLeaderGate::set_leader) whenever
/// the elected node changes.
#[derive(Debug)]
pub struct WatchLeaderGate {
    leader: watch::Sender<Option<String>>,
}

impl WatchLeaderGate {
    pub fn new() -> Self {
        let (leader, _) = watch::channel(None);
        Self { leader }
    }

    /// Record the current leader (`None` while an election is in progress).
    pub fn set_leader(&self, node_id: Option<&str>) {
        self.leader.send_replace(node_id.map(str::to_string));
    }

    pub fn current_leader(&self) -> Option<String> {
        self.leader.borrow().clone()
    }
}

impl Default for WatchLeaderGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaderGate for WatchLeaderGate {
    async fn is_leader(&self, node_id: &str) -> bool {
        self.leader.borrow().as_deref() == Some(node_id)
    }

    async fn wait_until_leader(&self, node_id: &str) {
        let mut rx = self.leader.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|leader| leader.as_deref() == Some(node_id)).await;
    }
}

/// Gate reading the leader's node id from a file.
///
/// The file holds a single node id; surrounding whitespace is ignored. A
/// missing or unreadable file means no leader.
#[derive(Debug, Clone)]
pub struct FileLeaderGate {
    path: PathBuf,
}

impl FileLeaderGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LeaderGate for FileLeaderGate {
    async fn is_leader(&self, node_id: &str) -> bool {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content.trim() == node_id,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "leader file unreadable");
                false
            }
        }
    }
}
