//! Cluster Health Module
//!
//! Tracks which worker nodes are currently eligible for work and how busy they are.
//! Every other subsystem reads or mutates node health exclusively through this module.
//!
//! ## Core Concepts
//! - **Stable Indices**: A node is identified by its position in the configured worker list.
//!   The number of tracked nodes is fixed for the lifetime of the process.
//! - **Status**: `true` once the node has accepted the current model snapshot, `false` after
//!   any transport or protocol failure.
//! - **Load**: Number of batch exchanges currently in flight on the node. Used to pick a
//!   failover target.
//! - **Independent Locks**: Status and load live behind separate read-write locks, so the
//!   synchronization pass and request dispatch never serialize each other.

pub mod tracker;

#[cfg(test)]
mod tests;
