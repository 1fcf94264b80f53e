use crate::api::auth::CurrentUser;
use crate::api::models::*;
use crate::api::movie::handlers::parse_movie_id;
use crate::storage::{NewReview, ObjectId, Review, StorageError};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

fn parse_review_id(raw: &str) -> Result<ObjectId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid review ID".to_string()))
}

fn review_not_found() -> AppError {
    AppError::NotFound("Review not found".to_string())
}

pub async fn add_review_handler(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
    user: Option<CurrentUser>,
    body: Bytes,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let movie = parse_movie_id(&movie_id)?;

    if state.db.find_movie(movie).await.is_none() {
        return Err(AppError::NotFound("Movie not found".to_string()));
    }

    let user = user.ok_or_else(|| AppError::Unauthorized("Not authorized".to_string()))?;

    // Body is read only after the movie and caller checks
    let request: CreateReviewRequest = parse_json_body(&body)?;
    let (rating, comment) = request.validate().map_err(AppError::BadRequest)?;

    let review = state
        .db
        .insert_review(NewReview {
            movie,
            user: user.id,
            rating,
            comment,
        })
        .await
        .map_err(|e| match e {
            StorageError::DuplicateKey { .. } => {
                warn!(%movie, user = %user.id, "Duplicate review rejected");
                AppError::BadRequest("You already reviewed this movie".to_string())
            }
            other => AppError::from(other),
        })?;

    info!(id = %review.id, %movie, rating, "Review added");

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_reviews_handler(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<Vec<Review>>, AppError> {
    let movie = parse_movie_id(&movie_id)?;

    let reviews = state.db.reviews_for_movie(movie).await;

    info!(%movie, found = reviews.len(), "Listed reviews");

    Ok(Json(reviews))
}

pub async fn update_review_handler(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
    ApiJson(request): ApiJson<UpdateReviewRequest>,
) -> Result<Json<Review>, AppError> {
    let id = parse_review_id(&review_id)?;
    let patch = request.validate().map_err(AppError::BadRequest)?;

    let review = state
        .db
        .update_review(id, patch)
        .await?
        .ok_or_else(review_not_found)?;

    info!(%id, "Review updated");

    Ok(Json(review))
}

pub async fn delete_review_handler(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_review_id(&review_id)?;

    state.db.delete_review(id).await?.ok_or_else(review_not_found)?;

    info!(%id, "Review deleted");

    Ok(Json(MessageResponse::new("Review deleted successfully")))
}
