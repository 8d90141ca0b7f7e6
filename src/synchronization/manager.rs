use crate::config::file::{ClusterConfig, WorkerEndpoint};
use crate::config::policy::RetryPolicy;
use crate::health::tracker::{ClusterHealth, NodeIndex};
use crate::wire::codec::{JsonConnection, WireError};
use crate::wire::protocol::{EXCHANGE_DEADLINE, SYNC_STATUS_OK, SyncRequest, SyncResponse};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{JoinHandle, JoinSet};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown node {0}")]
    UnknownNode(NodeIndex),
    #[error("transport error: {0}")]
    Wire(#[from] WireError),
    #[error("node rejected the snapshot with status {0}")]
    Rejected(i32),
}

/// Outcome of one synchronization pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub synchronized: Vec<NodeIndex>,
    pub failed: Vec<NodeIndex>,
}

pub struct SyncManager {
    payload: Arc<SyncRequest>,
    endpoints: Vec<WorkerEndpoint>,
    health: Arc<ClusterHealth>,
    retry: RetryPolicy,
    deadline: Duration,
}

impl SyncManager {
    pub fn new(
        payload: SyncRequest,
        endpoints: Vec<WorkerEndpoint>,
        health: Arc<ClusterHealth>,
    ) -> Arc<Self> {
        Arc::new(Self {
            payload: Arc::new(payload),
            endpoints,
            health,
            retry: RetryPolicy::default(),
            deadline: EXCHANGE_DEADLINE,
        })
    }

    /// Builds the manager for a loaded config; `R` and `P` are stripped from the payload.
    pub fn from_config(
        config: &ClusterConfig,
        controller_ip: String,
        endpoints: Vec<WorkerEndpoint>,
        health: Arc<ClusterHealth>,
    ) -> Arc<Self> {
        let payload = SyncRequest {
            master_ip: controller_ip,
            movie_genre_ids: config.movie_genre_ids.clone(),
            model_config: config.model_config.redacted(),
        };
        Self::new(payload, endpoints, health)
    }

    /// Like [`SyncManager::new`] with an explicit resync policy and exchange deadline.
    pub fn with_retry_policy(
        payload: SyncRequest,
        endpoints: Vec<WorkerEndpoint>,
        health: Arc<ClusterHealth>,
        retry: RetryPolicy,
        deadline: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            payload: Arc::new(payload),
            endpoints,
            health,
            retry,
            deadline,
        })
    }

    pub fn payload(&self) -> &SyncRequest {
        &self.payload
    }

    /// Pushes the snapshot to one node and records the outcome in the health table.
    pub async fn sync_node(&self, id: NodeIndex) -> Result<(), SyncError> {
        let result = self.exchange(id).await;
        match &result {
            Ok(()) => {
                tracing::info!("Node {} synchronized", id);
                self.health.write_status(id, true);
            }
            Err(e) => {
                tracing::warn!("Synchronization of node {} failed: {}", id, e);
                self.health.write_status(id, false);
            }
        }
        result
    }

    async fn exchange(&self, id: NodeIndex) -> Result<(), SyncError> {
        let endpoint = self.endpoints.get(id).ok_or(SyncError::UnknownNode(id))?;
        let mut conn = JsonConnection::connect(endpoint.sync_addr, self.deadline).await?;
        conn.send(self.payload.as_ref()).await?;
        let response: SyncResponse = conn.receive().await?;
        if response.status != SYNC_STATUS_OK {
            return Err(SyncError::Rejected(response.status));
        }
        Ok(())
    }

    /// Dials every inactive node concurrently and waits for all attempts.
    pub async fn synchronize_all(self: &Arc<Self>) -> SyncReport {
        let mut attempts = JoinSet::new();
        for id in self.health.active_ids(false) {
            let manager = self.clone();
            attempts.spawn(async move { (id, manager.sync_node(id).await.is_ok()) });
        }

        let mut report = SyncReport::default();
        while let Some(joined) = attempts.join_next().await {
            match joined {
                Ok((id, true)) => report.synchronized.push(id),
                Ok((id, false)) => report.failed.push(id),
                Err(e) => tracing::error!("Synchronization task panicked: {}", e),
            }
        }
        report.synchronized.sort_unstable();
        report.failed.sort_unstable();

        tracing::info!(
            "Synchronization pass finished: {} synchronized, {} failed",
            report.synchronized.len(),
            report.failed.len()
        );
        report
    }

    /// Starts one retry task per node that is currently inactive.
    pub fn spawn_resync(self: &Arc<Self>) -> Vec<JoinHandle<bool>> {
        self.health
            .active_ids(false)
            .into_iter()
            .map(|id| {
                let manager = self.clone();
                tokio::spawn(async move { manager.resync_loop(id).await })
            })
            .collect()
    }

    /// Retries `id` until it synchronizes or the policy runs out. Returns whether it succeeded.
    async fn resync_loop(self: Arc<Self>, id: NodeIndex) -> bool {
        let mut attempt = 0;
        while self.retry.allows(attempt) {
            tokio::time::sleep(self.retry.delay_for(attempt)).await;
            if self.health.is_active(id) {
                return true;
            }
            if self.sync_node(id).await.is_ok() {
                return true;
            }
            attempt += 1;
        }
        tracing::error!("Giving up on node {} after {} resync attempts", id, attempt);
        false
    }
}
