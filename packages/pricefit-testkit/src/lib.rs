mod error;

pub use error::{Error, Result};

use std::{
	collections::hash_map::DefaultHasher,
	env,
	hash::{Hash, Hasher},
	sync::{
		Mutex,
		atomic::{AtomicBool, Ordering},
	},
	thread,
	time::Duration,
};

use qdrant_client::Qdrant;
use tokio::{runtime::Builder, time};
use uuid::Uuid;

use pricefit_domain::{ranking::cmp_f64_desc, vector};
use pricefit_storage::{
	BoxFuture, CatalogIndex, Error as StoreError, Result as StoreResult,
	models::{CatalogPoint, ScoredItem, ScrollPage, ScrollRequest, SearchQuery, StoredItem},
};

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Brute-force cosine index with the same filter semantics as the Qdrant store.
#[derive(Default)]
pub struct MemoryIndex {
	points: Mutex<Vec<CatalogPoint>>,
	searches: Mutex<Vec<SearchQuery>>,
	failing: AtomicBool,
	ignore_price_filter: AtomicBool,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every later call fails with `Unavailable` until reset.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	/// Simulates a store that returns points outside the requested price range.
	pub fn set_ignore_price_filter(&self, ignore: bool) {
		self.ignore_price_filter.store(ignore, Ordering::SeqCst);
	}

	pub fn len(&self) -> usize {
		self.points.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Queries received so far, oldest first.
	pub fn searches(&self) -> Vec<SearchQuery> {
		self.searches.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn check_available(&self) -> StoreResult<()> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(StoreError::Unavailable("Memory index is set to fail.".to_string()));
		}

		Ok(())
	}

	fn search_now(&self, query: &SearchQuery) -> StoreResult<Vec<ScoredItem>> {
		self.check_available()?;
		self.searches.lock().unwrap_or_else(|err| err.into_inner()).push(query.clone());

		let mut filter = query.filter.clone();

		if self.ignore_price_filter.load(Ordering::SeqCst) {
			filter.price = None;
		}

		let points = self.points.lock().unwrap_or_else(|err| err.into_inner());
		let mut scored = points
			.iter()
			.filter(|point| filter.matches(&point.item))
			.map(|point| ScoredItem {
				id: point.id.to_string(),
				score: vector::cosine_similarity(&query.vector, &point.vector),
				item: point.item.clone(),
			})
			.collect::<Vec<_>>();

		scored.sort_by(|a, b| cmp_f64_desc(f64::from(a.score), f64::from(b.score)));
		scored.truncate(query.limit as usize);

		Ok(scored)
	}

	fn upsert_now(&self, batch: Vec<CatalogPoint>) -> StoreResult<()> {
		self.check_available()?;

		let mut points = self.points.lock().unwrap_or_else(|err| err.into_inner());

		for point in batch {
			match points.iter_mut().find(|existing| existing.id == point.id) {
				Some(existing) => *existing = point,
				None => points.push(point),
			}
		}

		Ok(())
	}

	fn scroll_now(&self, request: &ScrollRequest) -> StoreResult<ScrollPage> {
		self.check_available()?;

		let start = match request.offset.as_deref() {
			Some(raw) => raw.parse::<usize>().map_err(|_| {
				StoreError::InvalidArgument(format!("Unknown scroll offset {raw:?}."))
			})?,
			None => 0,
		};
		let points = self.points.lock().unwrap_or_else(|err| err.into_inner());
		let mut items = points
			.iter()
			.filter(|point| request.filter.matches(&point.item))
			.skip(start)
			.take(request.limit as usize + 1)
			.map(|point| StoredItem { id: point.id.to_string(), item: point.item.clone() })
			.collect::<Vec<_>>();
		let next_offset = if items.len() > request.limit as usize {
			items.truncate(request.limit as usize);

			Some((start + request.limit as usize).to_string())
		} else {
			None
		};

		Ok(ScrollPage { items, next_offset })
	}
}
impl CatalogIndex for MemoryIndex {
	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, StoreResult<Vec<ScoredItem>>> {
		Box::pin(async move { self.search_now(query) })
	}

	fn upsert<'a>(&'a self, points: Vec<CatalogPoint>) -> BoxFuture<'a, StoreResult<()>> {
		Box::pin(async move { self.upsert_now(points) })
	}

	fn scroll<'a>(&'a self, request: &'a ScrollRequest) -> BoxFuture<'a, StoreResult<ScrollPage>> {
		Box::pin(async move { self.scroll_now(request) })
	}
}

/// Deterministic bag-of-words embedder. Texts sharing words get similar vectors.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
	pub dim: usize,
}
impl HashEmbedder {
	pub fn new(dim: usize) -> Self {
		Self { dim }
	}

	pub fn embed_one(&self, text: &str) -> Vec<f32> {
		let mut vec = vec![0.0_f32; self.dim];

		if self.dim == 0 {
			return vec;
		}

		for word in text.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty()) {
			let mut hasher = DefaultHasher::new();

			word.to_lowercase().hash(&mut hasher);

			let bucket = (hasher.finish() % self.dim as u64) as usize;

			vec[bucket] += 1.0;
		}

		vector::l2_normalize(&mut vec);

		vec
	}

	pub fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
		texts.iter().map(|text| self.embed_one(text)).collect()
	}
}

/// A uniquely named Qdrant collection that is deleted on cleanup or drop.
pub struct TestCollection {
	name: String,
	url: String,
	cleaned: bool,
}
impl TestCollection {
	pub fn new(url: &str, prefix: &str) -> Self {
		Self {
			name: format!("{prefix}_{}", Uuid::new_v4().simple()),
			url: url.to_string(),
			cleaned: false,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub async fn cleanup(mut self) -> Result<()> {
		let result = delete_collection(&self.url, &self.name).await;

		self.cleaned = true;

		result
	}
}
impl Drop for TestCollection {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let url = self.url.clone();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test collection cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(delete_collection(&url, &name)) {
				eprintln!("Test collection cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("PRICEFIT_QDRANT_URL").ok()
}

async fn delete_collection(url: &str, name: &str) -> Result<()> {
	let client = Qdrant::from_url(url).build()?;
	let timed_out = |operation| Error::Timeout { operation, collection: name.to_string() };
	let exists = time::timeout(CLEANUP_TIMEOUT, client.collection_exists(name.to_string()))
		.await
		.map_err(|_| timed_out("collection_exists"))??;

	if !exists {
		return Ok(());
	}

	time::timeout(CLEANUP_TIMEOUT, client.delete_collection(name.to_string()))
		.await
		.map_err(|_| timed_out("delete_collection"))??;

	Ok(())
}
