use crate::coordinator::error::RecommendError;
use crate::coordinator::service::RecommendationRequest;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRatingInput {
    pub movie_id: usize,
    pub rating: f64,
}

/// Body of `POST /recommendations`: sparse ratings keyed by movie id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecRequest {
    pub user_id: i64,
    pub quantity: usize,
    #[serde(default)]
    pub genre_ids: Vec<usize>,
    #[serde(default)]
    pub movies_ratings: Vec<MovieRatingInput>,
}

impl ClientRecRequest {
    /// Expands the sparse ratings into one slot per catalog item.
    pub fn into_request(self, item_count: usize) -> Result<RecommendationRequest, RecommendError> {
        let mut ratings = vec![0.0; item_count];
        for entry in &self.movies_ratings {
            let slot = ratings.get_mut(entry.movie_id).ok_or_else(|| {
                RecommendError::BadRequest(format!("unknown movie id {}", entry.movie_id))
            })?;
            if !entry.rating.is_finite() {
                return Err(RecommendError::BadRequest(format!(
                    "rating for movie {} is not a number",
                    entry.movie_id
                )));
            }
            *slot = entry.rating;
        }
        Ok(RecommendationRequest {
            user_id: self.user_id,
            quantity: self.quantity,
            genre_ids: self.genre_ids,
            ratings,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct GenreQuery {
    pub id: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitlesResponse {
    pub movie_titles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenresResponse {
    pub movie_genre_names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
