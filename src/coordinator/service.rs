use super::aggregation::{Comment, ResultMerger, aggregate_user_factors};
use super::barrier::{BarrierError, PhaseBarrier};
use super::error::RecommendError;
use super::scheduler::{BatchDispatcher, BatchTemplate, create_batches};
use crate::config::file::{ClusterConfig, WorkerEndpoint};
use crate::config::policy::DispatchPolicy;
use crate::health::tracker::ClusterHealth;
use crate::model::factorization::initialize_user_factors;
use crate::wire::protocol::{GlobalUserFactors, PartialRecResponse};

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// A recommendation request with the user's ratings already laid out per catalog item.
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub user_id: i64,
    pub quantity: usize,
    pub genre_ids: Vec<usize>,
    /// One entry per catalog item; zero means unrated.
    pub ratings: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalRecommendation {
    pub id: usize,
    pub title: String,
    pub genres: Vec<String>,
    pub rating: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub user_id: i64,
    pub recommendations: Vec<FinalRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieRef {
    pub title: String,
    pub id: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieGenres {
    pub name: String,
    pub genres: Vec<String>,
}

/// Catalog metadata held by the controller.
#[derive(Debug, Clone)]
struct Catalog {
    titles: Vec<String>,
    genre_names: Vec<String>,
    genre_ids: Vec<Vec<usize>>,
}

impl Catalog {
    fn genre_names_of(&self, item: usize) -> Vec<String> {
        self.genre_ids
            .get(item)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.genre_names.get(*id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Controller: owns the catalog, the health table and the batch dispatcher.
pub struct Controller {
    catalog: Catalog,
    num_features: usize,
    health: Arc<ClusterHealth>,
    dispatcher: Arc<BatchDispatcher>,
    rng: Mutex<StdRng>,
}

impl Controller {
    pub fn new(
        config: &ClusterConfig,
        endpoints: Vec<WorkerEndpoint>,
        health: Arc<ClusterHealth>,
    ) -> Self {
        Self {
            catalog: Catalog {
                titles: config.movie_titles.clone(),
                genre_names: config.movie_genre_names.clone(),
                genre_ids: config.movie_genre_ids.clone(),
            },
            num_features: config.model_config.num_features,
            dispatcher: Arc::new(BatchDispatcher::new(
                endpoints,
                health.clone(),
                DispatchPolicy::default(),
            )),
            health,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Makes user-factor seeding deterministic.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        let endpoints = self.dispatcher.endpoints().to_vec();
        self.dispatcher = Arc::new(BatchDispatcher::new(endpoints, self.health.clone(), policy));
        self
    }

    pub fn health(&self) -> &Arc<ClusterHealth> {
        &self.health
    }

    pub fn item_count(&self) -> usize {
        self.catalog.titles.len()
    }

    // ============================================================
    // RECOMMENDATIONS
    // ============================================================

    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationResponse, RecommendError> {
        self.validate(&request)?;
        if self.health.active_count() == 0 {
            return Err(RecommendError::NoActiveNodes);
        }

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("recommend", %request_id, user_id = request.user_id);
        self.run_request(request).instrument(span).await
    }

    fn validate(&self, request: &RecommendationRequest) -> Result<(), RecommendError> {
        if request.ratings.len() != self.item_count() {
            return Err(RecommendError::BadRequest(format!(
                "expected {} ratings, got {}",
                self.item_count(),
                request.ratings.len()
            )));
        }
        if request.quantity == 0 {
            return Err(RecommendError::BadRequest(
                "quantity must be positive".to_string(),
            ));
        }
        if let Some(genre) = request
            .genre_ids
            .iter()
            .find(|genre| **genre >= self.catalog.genre_names.len())
        {
            return Err(RecommendError::BadRequest(format!(
                "unknown genre id {}",
                genre
            )));
        }
        Ok(())
    }

    async fn run_request(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationResponse, RecommendError> {
        let seed = {
            let mut rng = self.rng.lock();
            initialize_user_factors(self.num_features, &mut *rng)
        };
        let template = BatchTemplate {
            user_id: request.user_id,
            quantity: request.quantity,
            genre_ids: request.genre_ids.clone(),
            user_factors: seed.clone(),
        };
        let assignments = create_batches(&self.health, &request.ratings, &template)?;
        let batches = assignments.len();
        tracing::info!("Dispatching {} batches", batches);

        let (mut barrier, handle) = PhaseBarrier::new(batches);
        let (result_tx, mut result_rx) = mpsc::channel(batches);
        for assignment in assignments {
            let dispatcher = self.dispatcher.clone();
            let handle = handle.clone();
            let result_tx = result_tx.clone();
            tokio::spawn(
                async move {
                    let slot = assignment.slot;
                    let result = dispatcher.run_batch(assignment, handle).await;
                    let _ = result_tx.send((slot, result)).await;
                }
                .in_current_span(),
            );
        }
        drop(handle);
        drop(result_tx);

        let partials = match barrier.collect().await {
            Ok(partials) => partials,
            Err(e) => {
                tracing::warn!("Barrier aborted: {}", e);
                drop(barrier);
                return Err(first_failure(&mut result_rx, RecommendError::Aborted(e)).await);
            }
        };
        let global = aggregate_user_factors(&seed, &partials);
        barrier.release(GlobalUserFactors {
            user_id: request.user_id,
            user_latent_factors: global,
        });

        let mut results: Vec<PartialRecResponse> = Vec::with_capacity(batches);
        while let Some((slot, result)) = result_rx.recv().await {
            match result {
                Ok(response) => results.push(response),
                Err(e) => {
                    tracing::warn!("Batch {} failed after release: {}", slot, e);
                    return Err(e);
                }
            }
        }
        if results.len() != batches {
            return Err(RecommendError::Aborted(BarrierError::Incomplete));
        }

        let mut merger = ResultMerger::new(request.quantity);
        for result in results {
            merger.merge(result);
        }
        let (predictions, stats) = merger.finish();

        let recommendations = predictions
            .into_iter()
            .map(|prediction| FinalRecommendation {
                id: prediction.movie_id,
                title: self
                    .catalog
                    .titles
                    .get(prediction.movie_id)
                    .cloned()
                    .unwrap_or_default(),
                genres: self.catalog.genre_names_of(prediction.movie_id),
                rating: prediction.rating,
                comment: Comment::for_rating(prediction.rating, &stats).to_string(),
            })
            .collect::<Vec<_>>();

        tracing::info!(
            "Recommendation ready: {} items from {} candidates",
            recommendations.len(),
            stats.count
        );
        Ok(RecommendationResponse {
            user_id: request.user_id,
            recommendations,
        })
    }

    // ============================================================
    // CATALOG QUERIES
    // ============================================================

    pub fn titles(&self) -> &[String] {
        &self.catalog.titles
    }

    pub fn genre_names(&self) -> &[String] {
        &self.catalog.genre_names
    }

    /// Every movie tagged with `genre`, in catalog order.
    pub fn movies_by_genre(&self, genre: usize) -> Vec<MovieRef> {
        self.catalog
            .genre_ids
            .iter()
            .enumerate()
            .filter(|(_, genres)| genres.contains(&genre))
            .filter_map(|(id, _)| {
                self.catalog.titles.get(id).map(|title| MovieRef {
                    title: title.clone(),
                    id,
                })
            })
            .collect()
    }

    pub fn movie_genres(&self) -> Vec<MovieGenres> {
        self.catalog
            .titles
            .iter()
            .enumerate()
            .map(|(id, title)| MovieGenres {
                name: title.clone(),
                genres: self.catalog.genre_names_of(id),
            })
            .collect()
    }
}

/// Drains every batch result and reports the root cause, preferring real failures over the
/// aborts they triggered in sibling batches.
async fn first_failure(
    results: &mut mpsc::Receiver<(usize, Result<PartialRecResponse, RecommendError>)>,
    fallback: RecommendError,
) -> RecommendError {
    let mut cause = None;
    while let Some((slot, result)) = results.recv().await {
        match result {
            Err(RecommendError::Aborted(_)) | Ok(_) => {}
            Err(e) => {
                tracing::debug!("Batch {} was the failing batch", slot);
                if cause.is_none() {
                    cause = Some(e);
                }
            }
        }
    }
    cause.unwrap_or(fallback)
}
