use crate::api::models::AppState;
use crate::api::review::handlers::*;
use axum::{routing::{get, put}, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/movies/{movie_id}/reviews",
            get(list_reviews_handler).post(add_review_handler),
        )
        .route(
            "/reviews/{review_id}",
            put(update_review_handler).delete(delete_review_handler),
        )
}
