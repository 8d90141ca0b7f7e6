use crate::model::factorization::FactorModel;
use crate::wire::protocol::{BatchRequest, PartialRecResponse, PartialUserFactors, Prediction};

use std::collections::HashSet;

/// True when `item_genres` contains every id in `required`. An empty filter always matches.
pub fn contains_all(item_genres: &[usize], required: &[usize]) -> bool {
    if required.is_empty() {
        return true;
    }
    let genres: HashSet<usize> = item_genres.iter().copied().collect();
    required.iter().all(|genre| genres.contains(genre))
}

/// Phase 1: refines a private copy of the request's seed factors against the slice.
pub fn partial_user_factors(model: &FactorModel, request: &BatchRequest) -> PartialUserFactors {
    let mut user_factors = request.user_factors.clone();
    let (weighted_grad, count) = model.update_user_factors(
        &request.user_ratings,
        &mut user_factors,
        request.start_movie_id,
        request.end_movie_id,
    );
    PartialUserFactors {
        user_id: request.user_id,
        weighted_grad,
        count,
    }
}

/// Phase 2: predicts every unrated, genre-matching item of the slice with `user_factors`.
///
/// The returned list holds at most `quantity` predictions, best first; the statistics cover
/// every qualifying item.
pub fn score_candidates(
    model: &FactorModel,
    genre_ids: &[Vec<usize>],
    request: &BatchRequest,
    user_factors: &[f64],
) -> PartialRecResponse {
    let mut predictions = Vec::new();
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;

    for (offset, &rating) in request.user_ratings.iter().enumerate() {
        let movie_id = request.start_movie_id + offset;
        if movie_id >= request.end_movie_id || rating != 0.0 {
            continue;
        }
        let item_genres = genre_ids.get(movie_id).map(Vec::as_slice).unwrap_or(&[]);
        if !contains_all(item_genres, &request.genre_ids) {
            continue;
        }

        let predicted = model.predict_user(user_factors, movie_id);
        sum += predicted;
        max = max.max(predicted);
        min = min.min(predicted);
        predictions.push(Prediction {
            movie_id,
            rating: predicted,
        });
    }

    if predictions.is_empty() {
        return PartialRecResponse::empty();
    }

    let count = predictions.len();
    predictions.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    predictions.truncate(request.quantity);

    PartialRecResponse {
        predictions,
        sum,
        max,
        min,
        count,
    }
}
