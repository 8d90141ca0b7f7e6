//! Configuration Module
//!
//! Startup inputs of the controller and the runtime policies shared by its services.
//!
//! ## Submodules
//! - **`file`**: The JSON config file (workers, catalog metadata, trained model) and
//!   worker endpoint resolution.
//! - **`policy`**: Retry schedules for background resynchronization and the failover
//!   budget for batch dispatch.

pub mod file;
pub mod policy;
