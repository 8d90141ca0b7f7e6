//! Client API Module
//!
//! HTTP surface of the controller (port 9000 by default).
//!
//! ## Routes
//! - `POST /recommendations`: top-K recommendations for a user's ratings.
//! - `GET /movies/titles`: every title, indexed by movie id.
//! - `GET /genres`: every genre name, indexed by genre id.
//! - `GET /genres/movies?id=<genre>`: movies tagged with a genre.
//! - `GET /movies/genres`: genre names of every movie.

pub mod handlers;
pub mod types;


use crate::coordinator::service::Controller;

use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;

pub fn router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/recommendations", post(handlers::handle_recommendations))
        .route("/movies/titles", get(handlers::handle_titles))
        .route("/genres", get(handlers::handle_genres))
        .route("/genres/movies", get(handlers::handle_movies_by_genre))
        .route("/movies/genres", get(handlers::handle_movie_genres))
        .layer(Extension(controller))
}
