//! Matrix Factorization Module
//!
//! Holds the item-feature matrix and the two primitives shared by online inference and
//! offline training.
//!
//! ## Primitives
//! - **Per-user update**: SGD over the rated items of one catalog slice, returning a
//!   count-weighted gradient so slices can be averaged by the controller.
//! - **Prediction**: dot product of a user factor vector and an item feature row.
//!
//! ## Submodules
//! - **`factorization`**: `ModelParameters`, `FactorModel`, seed initialization.
//! - **`training`**: Parallel two-sided SGD, RMSE, and grid search for the offline trainer.
//! - **`dataset`**: CSV ratings loader.

pub mod dataset;
pub mod factorization;
pub mod training;

#[cfg(test)]
mod tests;
