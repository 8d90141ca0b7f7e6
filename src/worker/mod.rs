//! Worker Module
//!
//! The process running on every cluster node. It keeps a replica of the item-feature matrix
//! pushed by the controller and serves its share of each recommendation request.
//!
//! ## Exchanges
//! 1. **Synchronization**: Accepts a model snapshot, validates it, replies with a status code.
//!    A later snapshot replaces the previous one.
//! 2. **Batch**: Receives a catalog slice, returns a partial gradient, blocks until the
//!    controller broadcasts the aggregated factors, then returns its best candidates.
//!
//! ## Submodules
//! - **`service`**: Listeners, connection handling, local state.
//! - **`scoring`**: Genre filtering and the per-slice model computations.

pub mod scoring;
pub mod service;
