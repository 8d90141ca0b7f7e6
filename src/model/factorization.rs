use rand::Rng;
use serde::{Deserialize, Serialize};

/// Dense row-major matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Hyperparameters and learned matrices of a matrix-factorization model.
///
/// `r` and `p` are only present on the controller (and in trainer output). The copy sent to
/// workers is produced by [`ModelParameters::redacted`] and carries them as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    pub num_features: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    /// User × item ratings. Zero means "not rated".
    #[serde(rename = "R", default)]
    pub r: Option<Matrix>,
    /// User × feature factors.
    #[serde(rename = "P", default)]
    pub p: Option<Matrix>,
    /// Item × feature factors.
    #[serde(rename = "Q")]
    pub q: Matrix,
}

impl ModelParameters {
    /// Copy without ratings or user factors; the synchronization payload.
    pub fn redacted(&self) -> Self {
        Self {
            num_features: self.num_features,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            regularization: self.regularization,
            r: None,
            p: None,
            q: self.q.clone(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.q.len()
    }

    /// Checks that every item row has exactly `num_features` entries.
    pub fn validate(&self) -> Result<(), String> {
        if self.num_features == 0 {
            return Err("numFeatures must be positive".to_string());
        }
        if self.q.is_empty() {
            return Err("item-feature matrix is empty".to_string());
        }
        if let Some((item, row)) = self
            .q
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.num_features)
        {
            return Err(format!(
                "item {} has {} features, expected {}",
                item,
                row.len(),
                self.num_features
            ));
        }
        Ok(())
    }
}

/// Read-only view over the item-feature matrix exposing the online primitives.
///
/// The same update and prediction equations are used by the offline trainer.
#[derive(Debug, Clone)]
pub struct FactorModel {
    params: ModelParameters,
}

impl FactorModel {
    pub fn new(params: ModelParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    pub fn num_features(&self) -> usize {
        self.params.num_features
    }

    pub fn item_count(&self) -> usize {
        self.params.q.len()
    }

    /// Refines `user_factors` against the rated items of `[start_item, end_item)`.
    ///
    /// `ratings[i]` is the rating of item `start_item + i`; zero entries are skipped.
    /// Returns the accumulated per-component update scaled by the number of processed
    /// observations, together with that count (observations are counted once per epoch).
    pub fn update_user_factors(
        &self,
        ratings: &[f64],
        user_factors: &mut [f64],
        start_item: usize,
        end_item: usize,
    ) -> (Vec<f64>, usize) {
        let num_features = self.params.num_features;
        let mut weighted_grad = vec![0.0; num_features];
        let end_item = end_item.min(self.params.q.len());
        let span = end_item.saturating_sub(start_item).min(ratings.len());
        let mut count = 0usize;

        for _ in 0..self.params.epochs {
            for (offset, &rating) in ratings.iter().take(span).enumerate() {
                if rating == 0.0 {
                    continue;
                }
                let item = &self.params.q[start_item + offset];
                let error = rating - dot(user_factors, item);

                for ((factor, feature), grad) in user_factors
                    .iter_mut()
                    .zip(item.iter())
                    .zip(weighted_grad.iter_mut())
                {
                    let step = self.params.learning_rate
                        * (error * feature - self.params.regularization * *factor);
                    *factor += step;
                    *grad += step;
                }
                count += 1;
            }
        }

        for grad in weighted_grad.iter_mut() {
            *grad *= count as f64;
        }

        (weighted_grad, count)
    }

    /// Predicted rating of `item_id` for a user with the given latent factors.
    pub fn predict_user(&self, user_factors: &[f64], item_id: usize) -> f64 {
        self.params
            .q
            .get(item_id)
            .map(|item| dot(user_factors, item))
            .unwrap_or(0.0)
    }
}

/// Plain dot product, no bias terms.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Seed vector for a request's user factors, uniform in `[-0.01, 0.01)`.
pub fn initialize_user_factors<R: Rng + ?Sized>(num_features: usize, rng: &mut R) -> Vec<f64> {
    (0..num_features)
        .map(|_| rng.gen_range(-0.01..0.01))
        .collect()
}
