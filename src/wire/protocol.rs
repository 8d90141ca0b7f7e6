//! Controller ↔ Worker Protocol
//!
//! Defines the ports, deadlines and Data Transfer Objects exchanged between the controller
//! and its workers. Every message travels as one JSON object followed by `\n`
//! (see [`super::codec`]).
//!
//! ## Exchanges
//! - **Synchronization** (port 9001): `SyncRequest` → `SyncResponse`.
//! - **Batch** (port 9002): `BatchRequest` → `PartialUserFactors` → `GlobalUserFactors`
//!   → `PartialRecResponse`, all on one connection.

use crate::model::factorization::ModelParameters;

use serde::{Deserialize, Serialize};
use std::time::Duration;

// --- Ports & Deadlines ---

/// Client-facing HTTP service.
pub const SERVICE_PORT: u16 = 9000;
/// Worker listener for model synchronization.
pub const SYNC_PORT: u16 = 9001;
/// Worker listener for recommendation batch exchanges.
pub const BATCH_PORT: u16 = 9002;
/// Round-trip deadline for one synchronization or batch connection.
pub const EXCHANGE_DEADLINE: Duration = Duration::from_secs(20);

/// How long a worker waits for the aggregated factors after sending its partial gradient.
/// Covers the controller's worst-case failover of the slowest sibling batch.
pub const BARRIER_WAIT_DEADLINE: Duration = Duration::from_secs(180);

/// `SyncResponse::status` value reporting success.
pub const SYNC_STATUS_OK: i32 = 0;
/// `SyncResponse::status` value reporting an unusable payload.
pub const SYNC_STATUS_INVALID: i32 = 1;

// --- Synchronization ---

/// Snapshot pushed by the controller to every worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Address the controller advertises to its workers.
    pub master_ip: String,
    /// Genre ids of every catalog item, indexed by item id.
    pub movie_genre_ids: Vec<Vec<usize>>,
    /// Model parameters with `R` and `P` stripped.
    pub model_config: ModelParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncResponse {
    pub status: i32,
}

// --- Batch Exchange ---

/// One catalog slice of a recommendation request, sent to a single worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub user_id: i64,
    /// Ratings of items `start_movie_id..end_movie_id`; zero means unrated.
    pub user_ratings: Vec<f64>,
    pub start_movie_id: usize,
    pub end_movie_id: usize,
    pub quantity: usize,
    pub genre_ids: Vec<usize>,
    /// Current controller estimate (the request's seed vector).
    pub user_factors: Vec<f64>,
}

/// Phase-1 reply: a worker's count-weighted gradient for its slice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialUserFactors {
    pub user_id: i64,
    pub weighted_grad: Vec<f64>,
    pub count: usize,
}

/// Barrier output broadcast to every participating worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalUserFactors {
    pub user_id: i64,
    pub user_latent_factors: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub movie_id: usize,
    pub rating: f64,
}

/// Phase-2 reply: a worker's top candidates plus statistics over every qualifying item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartialRecResponse {
    pub predictions: Vec<Prediction>,
    pub sum: f64,
    pub max: f64,
    pub min: f64,
    pub count: usize,
}

impl PartialRecResponse {
    pub fn empty() -> Self {
        Self {
            predictions: Vec::new(),
            sum: 0.0,
            max: 0.0,
            min: 0.0,
            count: 0,
        }
    }
}
