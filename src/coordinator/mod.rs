//! Coordinator Module
//!
//! Controller-side request pipeline: splits the catalog across active workers, runs the
//! gradient-sharing barrier and merges the ranked partial results.
//!
//! ## Request Flow
//! 1. **Scheduling**: One contiguous item range per active node (`scheduler`).
//! 2. **Phase 1**: Every batch returns a weighted gradient; the leader waits for all of them
//!    (`barrier`) and averages them (`aggregation`).
//! 3. **Release**: The global factor vector is broadcast to every waiting connection.
//! 4. **Phase 2**: Workers score their slice; results are merged into the final top-K.
//!
//! ## Failure Handling
//! A failing node is marked inactive and its batch moves to the least-loaded active node,
//! a bounded number of times. When a batch gives up, the barrier is abandoned and the whole
//! request fails.

pub mod aggregation;
pub mod barrier;
pub mod error;
pub mod scheduler;
pub mod service;
