//! Distributed Recommender Library
//!
//! This library crate defines the modules behind the `recommender` binary (`main.rs`).
//! A controller holds a trained matrix-factorization model and spreads every recommendation
//! request across a cluster of worker nodes.
//!
//! ## Architecture Modules
//! - **`health`**: Per-node liveness and in-flight load, shared by every controller task.
//! - **`wire`**: Newline-delimited JSON framing over TCP and the controller/worker messages.
//! - **`config`**: Controller config file, worker endpoints and retry/dispatch policies.
//! - **`model`**: Factorization primitives used online, plus the offline trainer.
//! - **`synchronization`**: Pushes the model snapshot to workers and retries the missing ones.
//! - **`coordinator`**: Batch scheduling with failover, the two-phase barrier, result merging.
//! - **`worker`**: The node-side listeners serving synchronization and batch exchanges.
//! - **`api`**: The client-facing HTTP routes of the controller.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod health;
pub mod model;
pub mod synchronization;
pub mod wire;
pub mod worker;
