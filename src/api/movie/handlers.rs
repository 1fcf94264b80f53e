use crate::api::models::*;
use crate::storage::{Movie, MovieWithStats, ObjectId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

pub(crate) fn parse_movie_id(raw: &str) -> Result<ObjectId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid movie ID".to_string()))
}

fn movie_not_found() -> AppError {
    AppError::NotFound("Movie not found".to_string())
}

pub async fn create_movie_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateMovieRequest>,
) -> Result<(StatusCode, Json<Movie>), AppError> {
    // Validate
    let new_movie = request.validate().map_err(AppError::BadRequest)?;

    let movie = state.db.insert_movie(new_movie).await?;

    info!(id = %movie.id, title = %movie.title, "Movie created");

    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn list_movies_handler(State(state): State<AppState>) -> Json<Vec<MovieWithStats>> {
    let movies = state.db.movies_with_stats().await;
    info!(count = movies.len(), "Listed movies");
    Json(movies)
}

pub async fn get_movie_handler(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<Movie>, AppError> {
    let id = parse_movie_id(&movie_id)?;

    let movie = state.db.find_movie(id).await.ok_or_else(movie_not_found)?;

    Ok(Json(movie))
}

pub async fn update_movie_handler(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
    ApiJson(request): ApiJson<UpdateMovieRequest>,
) -> Result<Json<Movie>, AppError> {
    let id = parse_movie_id(&movie_id)?;
    let patch = request.validate().map_err(AppError::BadRequest)?;

    let movie = state
        .db
        .update_movie(id, patch)
        .await?
        .ok_or_else(movie_not_found)?;

    info!(%id, "Movie updated");

    Ok(Json(movie))
}

pub async fn delete_movie_handler(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_movie_id(&movie_id)?;

    state.db.delete_movie(id).await?.ok_or_else(movie_not_found)?;

    info!(%id, "Movie deleted");

    Ok(Json(MessageResponse::new("Movie deleted successfully")))
}
