use super::aggregate;
use super::{
    Movie, MoviePatch, MovieWithStats, NewMovie, NewReview, ObjectId, Review, ReviewPatch,
};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

const MOVIES_FILE: &str = "movies.jsonl";
const REVIEWS_FILE: &str = "reviews.jsonl";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("duplicate key in {collection}: {key}")]
    DuplicateKey {
        collection: &'static str,
        key: String,
    },
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("document encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt collection file {path:?} at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Documents keyed by id, iterated in insertion order
#[derive(Debug)]
struct Collection<T> {
    docs: HashMap<ObjectId, T>,
    order: Vec<ObjectId>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            docs: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T> Collection<T> {
    fn len(&self) -> usize {
        self.order.len()
    }

    fn get(&self, id: &ObjectId) -> Option<&T> {
        self.docs.get(id)
    }

    fn push(&mut self, id: ObjectId, doc: T) {
        if self.docs.insert(id, doc).is_none() {
            self.order.push(id);
        }
    }

    /// Swap the stored document, returning the old one
    fn replace(&mut self, id: ObjectId, doc: T) -> Option<T> {
        self.docs.get_mut(&id).map(|slot| std::mem::replace(slot, doc))
    }

    /// Remove a document, returning its position so it can be restored
    fn remove(&mut self, id: &ObjectId) -> Option<(usize, T)> {
        let doc = self.docs.remove(id)?;
        let pos = self.order.iter().position(|o| o == id).unwrap_or(self.order.len());
        if pos < self.order.len() {
            self.order.remove(pos);
        }
        Some((pos, doc))
    }

    fn restore(&mut self, pos: usize, id: ObjectId, doc: T) {
        self.docs.insert(id, doc);
        self.order.insert(pos.min(self.order.len()), id);
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.docs.get(id))
    }
}

#[derive(Debug, Default)]
struct Collections {
    movies: Collection<Movie>,
    reviews: Collection<Review>,
    /// Unique index on (movie, user)
    review_owners: HashMap<(ObjectId, ObjectId), ObjectId>,
}

/// Embedded document store holding the `movies` and `reviews` collections.
///
/// With a data directory every mutation rewrites the touched collection as JSON Lines;
/// without one the store lives in memory only.
#[derive(Debug)]
pub struct Database {
    collections: RwLock<Collections>,
    data_dir: Option<PathBuf>,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(Collections::default()),
            data_dir: None,
        }
    }

    /// Open (or create) a store backed by `data_dir`
    pub fn open(data_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let mut collections = Collections::default();
        for movie in load_collection::<Movie>(&data_dir.join(MOVIES_FILE))? {
            collections.movies.push(movie.id, movie);
        }
        for review in load_collection::<Review>(&data_dir.join(REVIEWS_FILE))? {
            let key = (review.movie, review.user);
            if collections.review_owners.insert(key, review.id).is_some() {
                return Err(duplicate_review(key));
            }
            collections.reviews.push(review.id, review);
        }

        info!(
            path = ?data_dir,
            movies = collections.movies.len(),
            reviews = collections.reviews.len(),
            "Document store opened"
        );

        Ok(Self {
            collections: RwLock::new(collections),
            data_dir: Some(data_dir),
        })
    }

    /// Number of stored (movies, reviews)
    pub async fn counts(&self) -> (usize, usize) {
        let c = self.collections.read().await;
        (c.movies.len(), c.reviews.len())
    }

    pub async fn insert_movie(&self, new: NewMovie) -> StorageResult<Movie> {
        let movie = Movie {
            id: ObjectId::generate(),
            title: new.title,
            description: new.description,
            genre: new.genre,
            release_year: new.release_year,
        };

        let mut c = self.collections.write().await;
        c.movies.push(movie.id, movie.clone());
        if let Err(e) = self.save_movies(&c) {
            c.movies.remove(&movie.id);
            return Err(e);
        }

        debug!(id = %movie.id, "Inserted movie");
        Ok(movie)
    }

    pub async fn find_movie(&self, id: ObjectId) -> Option<Movie> {
        self.collections.read().await.movies.get(&id).cloned()
    }

    pub async fn update_movie(&self, id: ObjectId, patch: MoviePatch) -> StorageResult<Option<Movie>> {
        let mut c = self.collections.write().await;
        let Some(mut updated) = c.movies.get(&id).cloned() else {
            return Ok(None);
        };

        patch.apply(&mut updated);
        let previous = c.movies.replace(id, updated.clone());
        if let Err(e) = self.save_movies(&c) {
            if let Some(previous) = previous {
                c.movies.replace(id, previous);
            }
            return Err(e);
        }

        Ok(Some(updated))
    }

    pub async fn delete_movie(&self, id: ObjectId) -> StorageResult<Option<Movie>> {
        let mut c = self.collections.write().await;
        let Some((pos, removed)) = c.movies.remove(&id) else {
            return Ok(None);
        };
        if let Err(e) = self.save_movies(&c) {
            c.movies.restore(pos, id, removed);
            return Err(e);
        }

        Ok(Some(removed))
    }

    /// Every movie with its average rating and review count, in insertion order
    pub async fn movies_with_stats(&self) -> Vec<MovieWithStats> {
        let c = self.collections.read().await;
        aggregate::movies_with_stats(c.movies.values(), c.reviews.values())
    }

    /// Insert a review, enforcing one review per (movie, user)
    pub async fn insert_review(&self, new: NewReview) -> StorageResult<Review> {
        let now = Utc::now();
        let review = Review {
            id: ObjectId::generate(),
            movie: new.movie,
            user: new.user,
            rating: new.rating,
            comment: new.comment.map(|c| c.trim().to_string()),
            created_at: now,
            updated_at: now,
        };

        let key = (review.movie, review.user);
        let mut c = self.collections.write().await;
        if c.review_owners.contains_key(&key) {
            return Err(duplicate_review(key));
        }

        c.review_owners.insert(key, review.id);
        c.reviews.push(review.id, review.clone());
        if let Err(e) = self.save_reviews(&c) {
            c.review_owners.remove(&key);
            c.reviews.remove(&review.id);
            return Err(e);
        }

        debug!(id = %review.id, movie = %review.movie, "Inserted review");
        Ok(review)
    }

    pub async fn reviews_for_movie(&self, movie: ObjectId) -> Vec<Review> {
        self.collections
            .read()
            .await
            .reviews
            .values()
            .filter(|r| r.movie == movie)
            .cloned()
            .collect()
    }

    pub async fn update_review(&self, id: ObjectId, patch: ReviewPatch) -> StorageResult<Option<Review>> {
        let mut c = self.collections.write().await;
        let Some(mut updated) = c.reviews.get(&id).cloned() else {
            return Ok(None);
        };

        patch.apply(&mut updated, Utc::now());
        let previous = c.reviews.replace(id, updated.clone());
        if let Err(e) = self.save_reviews(&c) {
            if let Some(previous) = previous {
                c.reviews.replace(id, previous);
            }
            return Err(e);
        }

        Ok(Some(updated))
    }

    pub async fn delete_review(&self, id: ObjectId) -> StorageResult<Option<Review>> {
        let mut c = self.collections.write().await;
        let Some((pos, removed)) = c.reviews.remove(&id) else {
            return Ok(None);
        };
        let key = (removed.movie, removed.user);
        c.review_owners.remove(&key);

        if let Err(e) = self.save_reviews(&c) {
            c.review_owners.insert(key, id);
            c.reviews.restore(pos, id, removed);
            return Err(e);
        }

        Ok(Some(removed))
    }

    fn save_movies(&self, c: &Collections) -> StorageResult<()> {
        match &self.data_dir {
            Some(dir) => write_collection(&dir.join(MOVIES_FILE), c.movies.values()),
            None => Ok(()),
        }
    }

    fn save_reviews(&self, c: &Collections) -> StorageResult<()> {
        match &self.data_dir {
            Some(dir) => write_collection(&dir.join(REVIEWS_FILE), c.reviews.values()),
            None => Ok(()),
        }
    }
}

fn duplicate_review((movie, user): (ObjectId, ObjectId)) -> StorageError {
    StorageError::DuplicateKey {
        collection: "reviews",
        key: format!("{{ movie: {movie}, user: {user} }}"),
    }
}

fn load_collection<T: DeserializeOwned>(path: &Path) -> StorageResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut docs = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc = serde_json::from_str(&line).map_err(|e| StorageError::Corrupt {
            path: path.to_path_buf(),
            line: i + 1,
            reason: e.to_string(),
        })?;
        docs.push(doc);
    }
    Ok(docs)
}

/// Rewrite a collection file through a temp file and rename
fn write_collection<'a, T, I>(path: &Path, docs: I) -> StorageResult<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for doc in docs {
            serde_json::to_writer(&mut writer, doc)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
