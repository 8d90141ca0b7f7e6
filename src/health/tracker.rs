use parking_lot::RwLock;
use std::sync::Arc;

/// Index of a worker node in the configured worker list.
pub type NodeIndex = usize;

/// Concurrency-safe liveness and load table for a fixed set of worker nodes.
///
/// All reads hand out copies, so callers never hold a lock while doing I/O.
pub struct ClusterHealth {
    status: RwLock<Vec<bool>>,
    load: RwLock<Vec<i64>>,
}

impl ClusterHealth {
    /// Creates a tracker for `node_count` nodes, all inactive with zero load.
    pub fn new(node_count: usize) -> Arc<Self> {
        Arc::new(Self {
            status: RwLock::new(vec![false; node_count]),
            load: RwLock::new(vec![0; node_count]),
        })
    }

    pub fn node_count(&self) -> usize {
        self.status.read().len()
    }

    /// Snapshot of every node's status.
    pub fn read_status(&self) -> Vec<bool> {
        self.status.read().clone()
    }

    pub fn is_active(&self, index: NodeIndex) -> bool {
        self.status.read().get(index).copied().unwrap_or(false)
    }

    pub fn write_status(&self, index: NodeIndex, active: bool) {
        let mut status = self.status.write();
        match status.get_mut(index) {
            Some(slot) => {
                if *slot != active {
                    tracing::info!(
                        "Node {} is now {}",
                        index,
                        if active { "active" } else { "inactive" }
                    );
                }
                *slot = active;
            }
            None => tracing::warn!("Ignoring status update for unknown node {}", index),
        }
    }

    pub fn read_load(&self, index: NodeIndex) -> i64 {
        self.load.read().get(index).copied().unwrap_or(0)
    }

    pub fn write_load(&self, index: NodeIndex, value: i64) {
        if let Some(slot) = self.load.write().get_mut(index) {
            *slot = value;
        }
    }

    /// Atomically adjusts a node's load by `delta` under a single write lock.
    pub fn add_load(&self, index: NodeIndex, delta: i64) {
        if let Some(slot) = self.load.write().get_mut(index) {
            *slot += delta;
        }
    }

    /// Ids of every node whose status equals `want`, in ascending order.
    pub fn active_ids(&self, want: bool) -> Vec<NodeIndex> {
        self.status
            .read()
            .iter()
            .enumerate()
            .filter(|(_, status)| **status == want)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.status.read().iter().filter(|status| **status).count()
    }

    /// Node with the smallest load among those whose status equals `want`.
    ///
    /// Returns `None` when no node matches; ties resolve to the lowest index.
    pub fn min_load_id(&self, want: bool) -> Option<NodeIndex> {
        // Lock order: load, then status.
        let load = self.load.read();
        let status = self.status.read();

        status
            .iter()
            .zip(load.iter())
            .enumerate()
            .filter(|(_, (status, _))| **status == want)
            .min_by_key(|(index, (_, load))| (**load, *index))
            .map(|(index, _)| index)
    }
}
