pub mod aggregate;
pub mod database;
pub mod documents;
pub mod object_id;

pub use database::{Database, StorageError};
pub use documents::{Movie, MoviePatch, MovieWithStats, NewMovie, NewReview, Review, ReviewPatch};
pub use object_id::ObjectId;
