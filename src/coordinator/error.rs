use super::barrier::BarrierError;

use thiserror::Error;

/// Why a recommendation request could not be served.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("no active worker nodes")]
    NoActiveNodes,
    #[error("no eligible worker node for batch {batch}")]
    NoEligibleNode { batch: usize },
    #[error("batch {batch} failed after {attempts} attempts")]
    RetriesExhausted { batch: usize, attempts: usize },
    #[error("request aborted: {0}")]
    Aborted(#[from] BarrierError),
}

impl RecommendError {
    /// Whether the failure comes from the cluster rather than from the client's input.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            RecommendError::NoActiveNodes | RecommendError::NoEligibleNode { .. }
        )
    }
}
