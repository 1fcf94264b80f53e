use crate::api::models::AppState;
use crate::api::movie::handlers::*;
use axum::{routing::get, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies_handler).post(create_movie_handler))
        .route(
            "/movies/{movie_id}",
            get(get_movie_handler)
                .put(update_movie_handler)
                .delete(delete_movie_handler),
        )
}
