use super::{Movie, MovieWithStats, ObjectId, Review};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Copy)]
struct RatingTotals {
    sum: f64,
    count: usize,
}

impl RatingTotals {
    fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }
}

/// Join reviews onto movies and attach `averageRating` and `totalReviews`.
///
/// Movies keep the order they are given in. A movie with no reviews gets 0 for both.
pub fn movies_with_stats<'a, M, R>(movies: M, reviews: R) -> Vec<MovieWithStats>
where
    M: IntoIterator<Item = &'a Movie>,
    R: IntoIterator<Item = &'a Review>,
{
    // lookup: reviews.movie -> movies._id
    let mut totals: HashMap<ObjectId, RatingTotals> = HashMap::new();
    for review in reviews {
        let entry = totals.entry(review.movie).or_default();
        entry.sum += review.rating;
        entry.count += 1;
    }

    movies
        .into_iter()
        .map(|movie| {
            let stats = totals.get(&movie.id).copied().unwrap_or_default();
            MovieWithStats {
                movie: movie.clone(),
                average_rating: stats.average(),
                total_reviews: stats.count,
            }
        })
        .collect()
}
