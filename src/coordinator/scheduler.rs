use super::barrier::{BarrierError, BarrierHandle};
use super::error::RecommendError;
use crate::config::file::WorkerEndpoint;
use crate::config::policy::DispatchPolicy;
use crate::health::tracker::{ClusterHealth, NodeIndex};
use crate::wire::codec::{JsonConnection, WireError};
use crate::wire::protocol::{
    BatchRequest, GlobalUserFactors, PartialRecResponse, PartialUserFactors,
};

use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// Participant side of the gradient-sharing barrier, as used by batch tasks.
pub type FactorBarrier = BarrierHandle<PartialUserFactors, GlobalUserFactors>;

/// Splits `[0, items)` into `parts` contiguous ranges of `items / parts` ids; the last
/// range absorbs the remainder.
pub fn partition_ranges(items: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let size = items / parts;
    (0..parts)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == parts { items } else { start + size };
            start..end
        })
        .collect()
}

/// Per-request fields shared by every batch.
#[derive(Debug, Clone)]
pub struct BatchTemplate {
    pub user_id: i64,
    pub quantity: usize,
    pub genre_ids: Vec<usize>,
    pub user_factors: Vec<f64>,
}

/// One batch bound to its first-choice node.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub slot: usize,
    pub node: NodeIndex,
    pub request: BatchRequest,
}

/// Cuts the catalog into one batch per active node.
///
/// Range `i` goes to the `i`-th active node, or to the least-loaded active node when the
/// active set shrank in between.
pub fn create_batches(
    health: &ClusterHealth,
    ratings: &[f64],
    template: &BatchTemplate,
) -> Result<Vec<Assignment>, RecommendError> {
    let active = health.active_ids(true);
    if active.is_empty() {
        return Err(RecommendError::NoActiveNodes);
    }

    partition_ranges(ratings.len(), active.len())
        .into_iter()
        .enumerate()
        .map(|(slot, range)| -> Result<Assignment, RecommendError> {
            let node = match active.get(slot) {
                Some(&node) => node,
                None => health
                    .min_load_id(true)
                    .ok_or(RecommendError::NoEligibleNode { batch: slot })?,
            };
            Ok(Assignment {
                slot,
                node,
                request: BatchRequest {
                    user_id: template.user_id,
                    user_ratings: ratings[range.clone()].to_vec(),
                    start_movie_id: range.start,
                    end_movie_id: range.end,
                    quantity: template.quantity,
                    genre_ids: template.genre_ids.clone(),
                    user_factors: template.user_factors.clone(),
                },
            })
        })
        .collect()
}

#[derive(Debug, Error)]
enum ExchangeError {
    #[error("node {0} has no configured endpoint")]
    UnknownNode(NodeIndex),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Barrier(#[from] BarrierError),
}

/// Runs batch exchanges against worker nodes and fails over on transport errors.
pub struct BatchDispatcher {
    endpoints: Vec<WorkerEndpoint>,
    health: Arc<ClusterHealth>,
    policy: DispatchPolicy,
}

impl BatchDispatcher {
    pub fn new(
        endpoints: Vec<WorkerEndpoint>,
        health: Arc<ClusterHealth>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            endpoints,
            health,
            policy,
        }
    }

    pub fn endpoints(&self) -> &[WorkerEndpoint] {
        &self.endpoints
    }

    /// Drives one batch through both phases, retrying on another node when the current one
    /// fails. Abandons the barrier slot on permanent failure so the leader stops waiting.
    pub async fn run_batch(
        &self,
        assignment: Assignment,
        mut barrier: FactorBarrier,
    ) -> Result<PartialRecResponse, RecommendError> {
        let Assignment {
            slot,
            mut node,
            request,
        } = assignment;
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.health.add_load(node, 1);
            let outcome = self.exchange(node, slot, &request, &mut barrier).await;
            self.health.add_load(node, -1);

            let error = match outcome {
                Ok(response) => {
                    tracing::debug!(
                        "Batch {} served by node {} ({} candidates)",
                        slot,
                        node,
                        response.count
                    );
                    return Ok(response);
                }
                Err(ExchangeError::Barrier(e)) => {
                    tracing::debug!("Batch {} stopped waiting: {}", slot, e);
                    return Err(RecommendError::Aborted(e));
                }
                Err(e) => e,
            };

            tracing::warn!(
                "Batch {} failed on node {} (attempt {}): {}",
                slot,
                node,
                attempts,
                error
            );
            self.health.write_status(node, false);

            if attempts >= self.policy.max_attempts {
                barrier.abandon(slot).await;
                return Err(RecommendError::RetriesExhausted {
                    batch: slot,
                    attempts,
                });
            }
            node = match self.health.min_load_id(true) {
                Some(next) => next,
                None => {
                    barrier.abandon(slot).await;
                    return Err(RecommendError::NoEligibleNode { batch: slot });
                }
            };
            tracing::info!("Batch {} failing over to node {}", slot, node);
        }
    }

    async fn exchange(
        &self,
        node: NodeIndex,
        slot: usize,
        request: &BatchRequest,
        barrier: &mut FactorBarrier,
    ) -> Result<PartialRecResponse, ExchangeError> {
        let endpoint = self
            .endpoints
            .get(node)
            .ok_or(ExchangeError::UnknownNode(node))?;
        let mut conn =
            JsonConnection::connect(endpoint.batch_addr, self.policy.exchange_deadline).await?;

        conn.send(request).await?;
        let partial: PartialUserFactors = conn.receive().await?;

        // Barrier wait does not count against this node's exchange budget.
        let global = barrier.arrive(slot, partial).await?;
        conn.restart_deadline(self.policy.exchange_deadline);
        conn.send(global.as_ref()).await?;

        Ok(conn.receive().await?)
    }
}
