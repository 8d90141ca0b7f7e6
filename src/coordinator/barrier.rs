//! Leader-driven two-phase barrier.
//!
//! Participants push their phase-1 value and park. The leader collects one value per slot,
//! computes a result and releases every parked participant with the same `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BarrierError {
    #[error("participant for slot {0} abandoned the barrier")]
    Abandoned(usize),
    #[error("barrier leader went away before releasing")]
    LeaderGone,
    #[error("participants went away before every slot arrived")]
    Incomplete,
}

enum Arrival<A> {
    Arrived { slot: usize, value: A },
    Abandoned { slot: usize },
}

/// Leader side. Owned by the request that created the barrier.
pub struct PhaseBarrier<A, R> {
    expected: usize,
    arrivals: mpsc::Receiver<Arrival<A>>,
    release: watch::Sender<Option<Arc<R>>>,
}

/// Participant side; one clone per batch task.
pub struct BarrierHandle<A, R> {
    arrivals: mpsc::Sender<Arrival<A>>,
    release: watch::Receiver<Option<Arc<R>>>,
}

impl<A, R> Clone for BarrierHandle<A, R> {
    fn clone(&self) -> Self {
        Self {
            arrivals: self.arrivals.clone(),
            release: self.release.clone(),
        }
    }
}

impl<A, R> PhaseBarrier<A, R> {
    /// Barrier for `expected` slots, numbered `0..expected`.
    pub fn new(expected: usize) -> (Self, BarrierHandle<A, R>) {
        let (arrival_tx, arrival_rx) = mpsc::channel(expected.max(1));
        let (release_tx, release_rx) = watch::channel(None);
        (
            Self {
                expected,
                arrivals: arrival_rx,
                release: release_tx,
            },
            BarrierHandle {
                arrivals: arrival_tx,
                release: release_rx,
            },
        )
    }

    /// Waits for one value per slot, ordered by slot. Repeated arrivals for a slot keep the
    /// first value.
    pub async fn collect(&mut self) -> Result<Vec<A>, BarrierError> {
        let collected = self.collect_slots().await;
        self.arrivals.close();
        collected
    }

    async fn collect_slots(&mut self) -> Result<Vec<A>, BarrierError> {
        let mut values = BTreeMap::new();
        while values.len() < self.expected {
            match self.arrivals.recv().await {
                Some(Arrival::Arrived { slot, value }) => {
                    if slot >= self.expected {
                        tracing::warn!("Ignoring arrival for unknown slot {}", slot);
                        continue;
                    }
                    if values.contains_key(&slot) {
                        tracing::debug!("Discarding duplicate arrival for slot {}", slot);
                        continue;
                    }
                    values.insert(slot, value);
                }
                Some(Arrival::Abandoned { slot }) => return Err(BarrierError::Abandoned(slot)),
                None => return Err(BarrierError::Incomplete),
            }
        }
        Ok(values.into_values().collect())
    }

    /// Wakes every parked participant; later arrivals see the same value.
    pub fn release(&self, value: R) -> Arc<R> {
        let value = Arc::new(value);
        self.release.send_replace(Some(value.clone()));
        value
    }
}

impl<A, R> BarrierHandle<A, R> {
    /// Deposits `value` for `slot` and waits for the leader's release.
    pub async fn arrive(&mut self, slot: usize, value: A) -> Result<Arc<R>, BarrierError> {
        // The leader stops listening once it has every slot; a late duplicate is harmless.
        let _ = self.arrivals.send(Arrival::Arrived { slot, value }).await;
        let released = self
            .release
            .wait_for(Option::is_some)
            .await
            .map_err(|_| BarrierError::LeaderGone)?;
        (*released).clone().ok_or(BarrierError::LeaderGone)
    }

    /// Tells the leader that `slot` will never arrive.
    pub async fn abandon(&self, slot: usize) {
        let _ = self.arrivals.send(Arrival::Abandoned { slot }).await;
    }
}
