use super::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored movie document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
}

/// Fields for a movie that has not been stored yet
#[derive(Debug, Clone, Default)]
pub struct NewMovie {
    pub title: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub release_year: Option<i32>,
}

/// Partial movie update. `None` leaves a field untouched, `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct MoviePatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub genre: Option<Option<String>>,
    pub release_year: Option<Option<i32>>,
}

impl MoviePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.genre.is_none()
            && self.release_year.is_none()
    }

    pub(crate) fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(description) = self.description {
            movie.description = description;
        }
        if let Some(genre) = self.genre {
            movie.genre = genre;
        }
        if let Some(release_year) = self.release_year {
            movie.release_year = release_year;
        }
    }
}

/// Movie annotated with rating statistics computed at read time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieWithStats {
    #[serde(flatten)]
    pub movie: Movie,
    pub average_rating: f64,
    pub total_reviews: usize,
}

/// Stored review document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub movie: ObjectId,
    pub user: ObjectId,
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub movie: ObjectId,
    pub user: ObjectId,
    pub rating: f64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewPatch {
    pub rating: Option<f64>,
    /// `Some(None)` clears the comment
    pub comment: Option<Option<String>>,
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.comment.is_none()
    }

    pub(crate) fn apply(self, review: &mut Review, now: DateTime<Utc>) {
        if let Some(rating) = self.rating {
            review.rating = rating;
        }
        if let Some(comment) = self.comment {
            review.comment = comment.map(|c| c.trim().to_string());
        }
        review.updated_at = now;
    }
}
