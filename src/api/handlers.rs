use super::types::{ClientRecRequest, ErrorResponse, GenreQuery, GenresResponse, TitlesResponse};
use crate::coordinator::error::RecommendError;
use crate::coordinator::service::{Controller, MovieGenres, MovieRef, RecommendationResponse};

use axum::extract::Query;
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(error: &RecommendError) -> ApiError {
    let (status, message) = match error {
        RecommendError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid request"),
        e if e.is_unavailable() => (StatusCode::SERVICE_UNAVAILABLE, "no worker nodes available"),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to compute recommendations",
        ),
    };
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

pub async fn handle_recommendations(
    Extension(controller): Extension<Arc<Controller>>,
    Json(req): Json<ClientRecRequest>,
) -> Result<(StatusCode, Json<RecommendationResponse>), ApiError> {
    let user_id = req.user_id;
    let outcome = match req.into_request(controller.item_count()) {
        Ok(request) => controller.recommend(request).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(response) => Ok((StatusCode::OK, Json(response))),
        Err(e) => {
            match &e {
                RecommendError::BadRequest(reason) => {
                    tracing::debug!("Rejected request for user {}: {}", user_id, reason)
                }
                _ => tracing::error!("Recommendation for user {} failed: {}", user_id, e),
            }
            Err(error_response(&e))
        }
    }
}

pub async fn handle_titles(
    Extension(controller): Extension<Arc<Controller>>,
) -> (StatusCode, Json<TitlesResponse>) {
    (
        StatusCode::OK,
        Json(TitlesResponse {
            movie_titles: controller.titles().to_vec(),
        }),
    )
}

pub async fn handle_genres(
    Extension(controller): Extension<Arc<Controller>>,
) -> (StatusCode, Json<GenresResponse>) {
    (
        StatusCode::OK,
        Json(GenresResponse {
            movie_genre_names: controller.genre_names().to_vec(),
        }),
    )
}

pub async fn handle_movies_by_genre(
    Extension(controller): Extension<Arc<Controller>>,
    Query(query): Query<GenreQuery>,
) -> (StatusCode, Json<Vec<MovieRef>>) {
    (StatusCode::OK, Json(controller.movies_by_genre(query.id)))
}

pub async fn handle_movie_genres(
    Extension(controller): Extension<Arc<Controller>>,
) -> (StatusCode, Json<Vec<MovieGenres>>) {
    (StatusCode::OK, Json(controller.movie_genres()))
}
