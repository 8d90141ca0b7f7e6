//! Offline Trainer
//!
//! Fits the user and item factor matrices from a full ratings matrix with two-sided SGD.
//! Users are processed in parallel inside each epoch. Item rows are shared between users,
//! so each row sits behind its own mutex; a user row is only ever touched by the task that
//! owns that user and needs no lock.

use super::factorization::{Matrix, ModelParameters, dot};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::Path;

/// A model being trained from a complete ratings matrix.
#[derive(Debug, Clone)]
pub struct Trainer {
    num_features: usize,
    epochs: usize,
    learning_rate: f64,
    regularization: f64,
    ratings: Matrix,
    user_factors: Matrix,
    item_factors: Matrix,
}

impl Trainer {
    /// Initializes both factor matrices uniformly in `[0, 1)` from `seed`.
    pub fn new(
        num_features: usize,
        epochs: usize,
        learning_rate: f64,
        regularization: f64,
        ratings: Matrix,
        seed: u64,
    ) -> Result<Self> {
        let item_count = ratings.first().map(Vec::len).unwrap_or(0);
        if ratings.is_empty() || item_count == 0 {
            anyhow::bail!("ratings matrix is empty");
        }
        if ratings.iter().any(|row| row.len() != item_count) {
            anyhow::bail!("ratings matrix rows have different lengths");
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let user_factors = random_matrix(ratings.len(), num_features, &mut rng);
        let item_factors = random_matrix(item_count, num_features, &mut rng);

        Ok(Self {
            num_features,
            epochs,
            learning_rate,
            regularization,
            ratings,
            user_factors,
            item_factors,
        })
    }

    pub fn train(&mut self) {
        let learning_rate = self.learning_rate;
        let regularization = self.regularization;

        // One lock per item row.
        let item_rows: Vec<Mutex<Vec<f64>>> = std::mem::take(&mut self.item_factors)
            .into_iter()
            .map(Mutex::new)
            .collect();

        for epoch in 0..self.epochs {
            self.user_factors
                .par_iter_mut()
                .zip(self.ratings.par_iter())
                .for_each(|(user, ratings)| {
                    for (item_id, &rating) in ratings.iter().enumerate() {
                        if rating == 0.0 {
                            continue;
                        }
                        let mut item = item_rows[item_id].lock();
                        let error = rating - dot(user, &item);
                        for (user_k, item_k) in user.iter_mut().zip(item.iter_mut()) {
                            let user_step =
                                learning_rate * (error * *item_k - regularization * *user_k);
                            let item_step =
                                learning_rate * (error * *user_k - regularization * *item_k);
                            *user_k += user_step;
                            *item_k += item_step;
                        }
                    }
                });
            tracing::debug!("Finished epoch {}/{}", epoch + 1, self.epochs);
        }

        self.item_factors = item_rows.into_iter().map(Mutex::into_inner).collect();
    }

    pub fn predict(&self, user_id: usize, item_id: usize) -> f64 {
        dot(&self.user_factors[user_id], &self.item_factors[item_id])
    }

    /// Root mean squared error over the observed ratings, including the L2 penalty term.
    pub fn rmse(&self) -> f64 {
        let mut squared_error = 0.0;
        let mut penalty = 0.0;
        let mut count = 0usize;

        for (user_id, ratings) in self.ratings.iter().enumerate() {
            for (item_id, &rating) in ratings.iter().enumerate() {
                if rating <= 0.0 {
                    continue;
                }
                let error = rating - self.predict(user_id, item_id);
                squared_error += error * error;
                penalty += squared_norm(&self.user_factors[user_id])
                    + squared_norm(&self.item_factors[item_id]);
                count += 1;
            }
        }

        if count == 0 {
            return 0.0;
        }
        ((squared_error + self.regularization / 2.0 * penalty) / count as f64).sqrt()
    }

    pub fn parameters(&self) -> ModelParameters {
        ModelParameters {
            num_features: self.num_features,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            regularization: self.regularization,
            r: Some(self.ratings.clone()),
            p: Some(self.user_factors.clone()),
            q: self.item_factors.clone(),
        }
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating model file {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &self.parameters())
            .with_context(|| format!("writing model file {}", path.display()))?;
        Ok(())
    }
}

/// Hyperparameter candidates for [`grid_search`].
#[derive(Debug, Clone)]
pub struct ModelGrid {
    pub num_features: Vec<usize>,
    pub epochs: Vec<usize>,
    pub learning_rates: Vec<f64>,
    pub regularizations: Vec<f64>,
}

/// Trains one model per grid point and keeps the one with the lowest RMSE.
pub fn grid_search(grid: &ModelGrid, ratings: &Matrix, seed: u64) -> Result<(Trainer, f64)> {
    let mut best: Option<(Trainer, f64)> = None;

    for &num_features in &grid.num_features {
        for &epochs in &grid.epochs {
            for &learning_rate in &grid.learning_rates {
                for &regularization in &grid.regularizations {
                    let mut trainer = Trainer::new(
                        num_features,
                        epochs,
                        learning_rate,
                        regularization,
                        ratings.clone(),
                        seed,
                    )?;
                    trainer.train();
                    let rmse = trainer.rmse();
                    tracing::info!(
                        "features={} epochs={} lr={} reg={} -> RMSE {:.6}",
                        num_features,
                        epochs,
                        learning_rate,
                        regularization,
                        rmse
                    );
                    if best.as_ref().is_none_or(|(_, best_rmse)| rmse < *best_rmse) {
                        best = Some((trainer, rmse));
                    }
                }
            }
        }
    }

    best.ok_or_else(|| anyhow::anyhow!("model grid is empty"))
}

fn random_matrix<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
    (0..rows)
        .map(|_| (0..cols).map(|_| rng.gen_range(0.0..1.0)).collect())
        .collect()
}

fn squared_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}
