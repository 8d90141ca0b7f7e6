//! Synchronization Module
//!
//! Pushes the controller's redacted model snapshot to every worker and keeps the health
//! table's status column in step with the outcome.
//!
//! ## Lifecycle
//! 1. **Initial pass**: `synchronize_all` dials every inactive node concurrently and waits
//!    for all of them before the controller starts serving.
//! 2. **Background resync**: `spawn_resync` gives each node that is still inactive its own
//!    retry task, driven by a [`crate::config::policy::RetryPolicy`].

pub mod manager;
