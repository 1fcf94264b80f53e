pub mod auth;
pub mod models;
pub mod movie;
pub mod review;

// Re-exports
pub use models::*;

use axum::{extract::State, routing::get, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (total_movies, total_reviews) = state.db.counts().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        total_movies,
        total_reviews,
    })
}

/// Full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(movie::routes())
        .merge(review::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
