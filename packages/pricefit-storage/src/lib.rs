pub mod models;
pub mod qdrant;

mod error;

pub use error::Error;

use std::{future::Future, pin::Pin};

use models::{CatalogPoint, ScoredItem, ScrollPage, ScrollRequest, SearchQuery};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Nearest-neighbor catalog index with structured filters.
///
/// Scores are higher-is-better cosine similarities. An empty answer is a normal outcome.
pub trait CatalogIndex
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<Vec<ScoredItem>>>;

	/// Idempotent by point id.
	fn upsert<'a>(&'a self, points: Vec<CatalogPoint>) -> BoxFuture<'a, Result<()>>;

	fn scroll<'a>(&'a self, request: &'a ScrollRequest) -> BoxFuture<'a, Result<ScrollPage>>;
}
