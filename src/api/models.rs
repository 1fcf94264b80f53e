use crate::api::auth::JwtKeys;
use crate::storage::{Database, MoviePatch, NewMovie, ReviewPatch, StorageError};
use axum::{
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::error;

pub const RATING_RANGE_MESSAGE: &str = "Rating must be a number between 1 and 5";

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub jwt: Arc<JwtKeys>,
}

/// JSON body extractor whose rejections render as [`AppError::BadRequest`]
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Request to create a movie
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovieRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub release_year: Option<i32>,
}

/// Request to update a movie.
///
/// The outer `Option` is field presence, so an explicit `null` stays distinguishable
/// from an absent field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMovieRequest {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub genre: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub release_year: Option<Option<i32>>,
}

/// Request to add a review. `rating` stays loosely typed so numeric strings are accepted.
#[derive(Debug, Default, Deserialize)]
pub struct CreateReviewRequest {
    #[serde(default)]
    pub rating: serde_json::Value,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    #[serde(default, deserialize_with = "present")]
    pub rating: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    pub comment: Option<Option<String>>,
}

/// Marks a field as present even when its value is `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub total_movies: usize,
    pub total_reviews: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl CreateMovieRequest {
    /// Validate the request
    pub fn validate(self) -> Result<NewMovie, String> {
        let title = match self.title {
            Some(title) if !title.trim().is_empty() => title,
            _ => return Err("Title is required".to_string()),
        };
        Ok(NewMovie {
            title,
            description: self.description,
            genre: self.genre,
            release_year: self.release_year,
        })
    }
}

impl UpdateMovieRequest {
    /// Validate the request
    pub fn validate(self) -> Result<MoviePatch, String> {
        let title = match self.title {
            None => None,
            Some(Some(title)) if !title.trim().is_empty() => Some(title),
            Some(_) => return Err("Title cannot be empty".to_string()),
        };
        let patch = MoviePatch {
            title,
            description: self.description,
            genre: self.genre,
            release_year: self.release_year,
        };
        if patch.is_empty() {
            return Err("Nothing to update".to_string());
        }
        Ok(patch)
    }
}

impl CreateReviewRequest {
    /// Validated rating and the raw comment
    pub fn validate(self) -> Result<(f64, Option<String>), String> {
        let rating = parse_rating(&self.rating).ok_or_else(|| RATING_RANGE_MESSAGE.to_string())?;
        Ok((rating, self.comment))
    }
}

impl UpdateReviewRequest {
    /// Validate the request
    pub fn validate(self) -> Result<ReviewPatch, String> {
        let rating = match self.rating {
            None => None,
            Some(value) => {
                Some(parse_rating(&value).ok_or_else(|| RATING_RANGE_MESSAGE.to_string())?)
            }
        };
        let patch = ReviewPatch {
            rating,
            comment: self.comment,
        };
        if patch.is_empty() {
            return Err("Nothing to update".to_string());
        }
        Ok(patch)
    }
}

/// Deserialize a JSON body read as raw bytes; an empty body counts as `{}`
pub fn parse_json_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// A finite rating in [1, 5], given as a JSON number or a numeric string
pub fn parse_rating(value: &serde_json::Value) -> Option<f64> {
    let rating = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (rating.is_finite() && (1.0..=5.0).contains(&rating)).then_some(rating)
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorResponse {
            error: status.to_string(),
            message,
        }))
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rating_accepts_numbers_and_numeric_strings_in_range() {
        assert_eq!(parse_rating(&json!(1)), Some(1.0));
        assert_eq!(parse_rating(&json!(5)), Some(5.0));
        assert_eq!(parse_rating(&json!(4.5)), Some(4.5));
        assert_eq!(parse_rating(&json!("3")), Some(3.0));
        assert_eq!(parse_rating(&json!(" 2 ")), Some(2.0));
    }

    #[test]
    fn rating_rejects_everything_else() {
        for bad in [
            json!(0),
            json!(6),
            json!(-1),
            json!(5.01),
            json!("six"),
            json!(""),
            json!("NaN"),
            json!("inf"),
            json!(null),
            json!(true),
            json!([4]),
        ] {
            assert_eq!(parse_rating(&bad), None, "{bad} should be rejected");
        }
    }

    #[test]
    fn create_movie_requires_a_title() {
        let blank = CreateMovieRequest {
            title: Some("   ".to_string()),
            description: None,
            genre: None,
            release_year: None,
        };
        assert_eq!(blank.validate().unwrap_err(), "Title is required");

        let ok = CreateMovieRequest {
            title: Some("Heat".to_string()),
            description: None,
            genre: Some("Crime".to_string()),
            release_year: Some(1995),
        };
        let movie = ok.validate().unwrap();
        assert_eq!(movie.title, "Heat");
        assert_eq!(movie.release_year, Some(1995));
    }

    #[test]
    fn empty_updates_are_rejected() {
        let movie: UpdateMovieRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(movie.validate().unwrap_err(), "Nothing to update");

        let review: UpdateReviewRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(review.validate().unwrap_err(), "Nothing to update");

        let review: UpdateReviewRequest = serde_json::from_value(json!({"rating": 9})).unwrap();
        assert_eq!(review.validate().unwrap_err(), RATING_RANGE_MESSAGE);
    }

    #[test]
    fn explicit_null_is_not_an_absent_field() {
        let review: UpdateReviewRequest =
            serde_json::from_value(json!({"rating": null, "comment": "x"})).unwrap();
        assert_eq!(review.validate().unwrap_err(), RATING_RANGE_MESSAGE);

        let review: UpdateReviewRequest = serde_json::from_value(json!({"comment": null})).unwrap();
        assert_eq!(review.validate().unwrap().comment, Some(None));

        let movie: UpdateMovieRequest =
            serde_json::from_value(json!({"title": null, "genre": "x"})).unwrap();
        assert_eq!(movie.validate().unwrap_err(), "Title cannot be empty");

        let movie: UpdateMovieRequest =
            serde_json::from_value(json!({"genre": null, "releaseYear": 1995})).unwrap();
        let patch = movie.validate().unwrap();
        assert_eq!(patch.title, None);
        assert_eq!(patch.genre, Some(None));
        assert_eq!(patch.release_year, Some(Some(1995)));
    }

    #[test]
    fn empty_body_reads_as_empty_object() {
        let request: CreateReviewRequest = parse_json_body(b"").unwrap();
        assert!(request.rating.is_null());
        assert!(matches!(
            parse_json_body::<CreateReviewRequest>(b"{ nope"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn error_status_codes() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
