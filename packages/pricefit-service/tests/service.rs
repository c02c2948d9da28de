use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread,
	time::{Duration, Instant},
};

use pricefit_config::{Config, EmbeddingProviderConfig};
use pricefit_domain::price::{LabeledToken, PriceSource};
use pricefit_service::{
	AddProductRequest, BoxFuture, EmbeddingProvider, Error, PriceTagger, Providers,
	RecommendRequest, RecommendService, Result, Weights, catalog::CategoryPriceRange,
};
use pricefit_testkit::{HashEmbedder, MemoryIndex};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str =
	include_str!("../../pricefit-config/tests/fixtures/sample_config.template.toml");

struct HashEmbedding {
	embedder: HashEmbedder,
	calls: Arc<AtomicUsize>,
}
impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let vectors = self.embedder.embed(texts);

		Box::pin(async move { Ok(vectors) })
	}
}

/// Returns hash vectors stretched away from unit length.
struct ScaledEmbedding(HashEmbedder, f32);
impl EmbeddingProvider for ScaledEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let scale = self.1;
		let vectors = self
			.0
			.embed(texts)
			.into_iter()
			.map(|vec| vec.into_iter().map(|value| value * scale).collect())
			.collect();

		Box::pin(async move { Ok(vectors) })
	}
}

fn norm(vec: &[f32]) -> f32 {
	vec.iter().map(|value| value * value).sum::<f32>().sqrt()
}

struct FixedTagger(Vec<LabeledToken>);
impl PriceTagger for FixedTagger {
	fn tag(&self, _text: &str) -> Result<Vec<LabeledToken>> {
		Ok(self.0.clone())
	}
}

/// Blocks the calling thread when the text mentions "slow".
struct SlowTagger(Duration);
impl PriceTagger for SlowTagger {
	fn tag(&self, text: &str) -> Result<Vec<LabeledToken>> {
		if text.contains("slow") {
			thread::sleep(self.0);
		}

		Ok(Vec::new())
	}
}

struct Harness {
	service: RecommendService,
	index: Arc<MemoryIndex>,
	embed_calls: Arc<AtomicUsize>,
}

fn test_config() -> Config {
	pricefit_config::parse(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Sample config must load.")
}

fn harness_with(cfg: Config, embed_dim: usize, tagger: Option<Arc<dyn PriceTagger>>) -> Harness {
	let index = Arc::new(MemoryIndex::new());
	let embed_calls = Arc::new(AtomicUsize::new(0));
	let embedding =
		HashEmbedding { embedder: HashEmbedder::new(embed_dim), calls: embed_calls.clone() };
	let providers = Providers::new(Arc::new(embedding), tagger);
	let service = RecommendService::new(cfg, index.clone(), providers);

	Harness { service, index, embed_calls }
}

fn harness() -> Harness {
	let cfg = test_config();
	let dim = cfg.storage.qdrant.vector_dim as usize;

	harness_with(cfg, dim, None)
}

fn product(name: &str, description: &str, price: f64, category: &str) -> AddProductRequest {
	AddProductRequest {
		name: name.to_string(),
		description: description.to_string(),
		price,
		category: Some(category.to_string()),
	}
}

async fn seed_catalog(service: &RecommendService) {
	service
		.add_products(vec![
			product("Speaker", "Waterproof bluetooth speaker", 59.0, "Electronics"),
			product("Keyboard", "Mechanical keyboard with backlight", 99.0, "Electronics"),
			product("Studio speaker", "Large studio monitor speaker", 900.0, "Electronics"),
			product("Garden hose", "Flexible garden hose", 35.0, "Garden"),
		])
		.await
		.expect("Seeding failed.");
}

#[tokio::test]
async fn speaker_outranks_keyboard_for_explicit_target_price() {
	let h = harness();

	h.service
		.add_products(vec![
			product("Speaker", "Waterproof bluetooth speaker", 59.0, "Electronics"),
			product("Keyboard", "Mechanical keyboard with backlight", 99.0, "Electronics"),
		])
		.await
		.expect("Seeding failed.");

	let response = h
		.service
		.recommend(RecommendRequest {
			query: "waterproof speaker".to_string(),
			target_price: Some(70.0),
			weights: Some(Weights { price: 0.3, text: 0.7 }),
			limit: Some(3),
			..Default::default()
		})
		.await
		.expect("Recommend failed.");

	assert_eq!(response.price_source, Some(PriceSource::Explicit));
	assert_eq!(response.recommendations.len(), 2);
	assert_eq!(response.recommendations[0].name, "Speaker");
	assert_eq!(response.recommendations[1].name, "Keyboard");
	assert!(response.recommendations[0].score >= response.recommendations[1].score);

	let searches = h.index.searches();

	assert_eq!(searches.len(), 1);
	assert_eq!(searches[0].limit, 100);
	assert!(searches[0].filter.price.is_none());
}

#[tokio::test]
async fn extracted_price_filters_and_over_fetches() {
	let h = harness();

	seed_catalog(&h.service).await;

	let response = h
		.service
		.recommend(RecommendRequest {
			query: "speaker around 60 dollars".to_string(),
			category: Some("Electronics".to_string()),
			tolerance: Some(20.0),
			limit: Some(2),
			..Default::default()
		})
		.await
		.expect("Recommend failed.");

	assert_eq!(response.target_price, Some(60.0));
	assert_eq!(response.price_source, Some(PriceSource::Pattern));
	assert_eq!(response.tolerance, Some(20.0));
	assert_eq!(response.recommendations.len(), 1);
	assert_eq!(response.recommendations[0].name, "Speaker");
	assert!(response.message.is_none());

	let search = h.index.searches().pop().expect("search expected");

	assert_eq!(search.limit, 10);
	assert_eq!(search.filter.category.as_deref(), Some("Electronics"));
	assert!(search.filter.price.is_some());
}

#[tokio::test]
async fn model_price_is_preferred_when_tagger_labels_tokens() {
	let cfg = test_config();
	let dim = cfg.storage.qdrant.vector_dim as usize;
	let tagger = FixedTagger(vec![
		LabeledToken { token: "speaker".to_string(), label: 0 },
		LabeledToken { token: "9".to_string(), label: 1 },
		LabeledToken { token: "##0".to_string(), label: 2 },
	]);
	let h = harness_with(cfg, dim, Some(Arc::new(tagger)));

	seed_catalog(&h.service).await;

	let response = h
		.service
		.recommend(RecommendRequest {
			query: "speaker for 90 bucks".to_string(),
			..Default::default()
		})
		.await
		.expect("Recommend failed.");

	assert_eq!(response.target_price, Some(90.0));
	assert_eq!(response.price_source, Some(PriceSource::Model));
	assert!(!response.recommendations.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn slow_price_model_does_not_stall_concurrent_requests() {
	let cfg = test_config();
	let dim = cfg.storage.qdrant.vector_dim as usize;
	let delay = Duration::from_millis(800);
	let h = harness_with(cfg, dim, Some(Arc::new(SlowTagger(delay))));

	seed_catalog(&h.service).await;

	let request = |query: &str| RecommendRequest { query: query.to_string(), ..Default::default() };
	let started = Instant::now();
	let slow = async {
		let response = h.service.recommend(request("slow speaker $60")).await;

		(response, started.elapsed())
	};
	let fast = async {
		let response = h.service.recommend(request("speaker $60")).await;

		(response, started.elapsed())
	};
	let ((slow_response, slow_elapsed), (fast_response, fast_elapsed)) = tokio::join!(slow, fast);

	assert!(slow_response.is_ok());
	assert!(fast_response.is_ok());
	assert!(slow_elapsed >= delay);
	assert!(fast_elapsed < delay / 2, "Fast request waited {fast_elapsed:?}.");
}

#[tokio::test]
async fn missing_price_returns_empty_list_with_suggestion() {
	let h = harness();

	seed_catalog(&h.service).await;

	let response = h
		.service
		.recommend(RecommendRequest {
			query: "waterproof speaker".to_string(),
			..Default::default()
		})
		.await
		.expect("Missing price must not be an error.");

	assert!(response.recommendations.is_empty());
	assert!(response.target_price.is_none());
	assert!(response.message.is_some());
	assert!(response.suggestion.is_some());
	assert!(h.index.searches().is_empty());
}

#[tokio::test]
async fn out_of_range_points_are_dropped_before_combining() {
	let h = harness();

	seed_catalog(&h.service).await;
	h.index.set_ignore_price_filter(true);

	let response = h
		.service
		.recommend(RecommendRequest {
			query: "speaker 60 dollars".to_string(),
			tolerance: Some(5.0),
			..Default::default()
		})
		.await
		.expect("Recommend failed.");

	assert!(!response.recommendations.is_empty());
	assert!(response.recommendations.iter().all(|item| (55.0..=65.0).contains(&item.price)));
}

#[tokio::test]
async fn empty_candidate_set_is_a_valid_answer() {
	let h = harness();

	seed_catalog(&h.service).await;

	let response = h
		.service
		.recommend(RecommendRequest {
			query: "hose 500 dollars".to_string(),
			category: Some("Garden".to_string()),
			tolerance: Some(10.0),
			..Default::default()
		})
		.await
		.expect("Recommend failed.");

	assert!(response.recommendations.is_empty());
	assert!(response.message.as_deref().is_some_and(|message| message.contains("Garden")));
}

#[tokio::test]
async fn store_failures_are_not_swallowed() {
	let h = harness();

	seed_catalog(&h.service).await;
	h.index.set_failing(true);

	let err = h
		.service
		.recommend(RecommendRequest {
			query: "speaker $60".to_string(),
			..Default::default()
		})
		.await
		.expect_err("Store failure must surface.");

	assert!(matches!(err, Error::Store { .. }), "Unexpected error: {err:?}");
}

#[tokio::test]
async fn invalid_limits_are_rejected() {
	let h = harness();

	for limit in [0, 101] {
		let err = h
			.service
			.recommend(RecommendRequest {
				query: "speaker $60".to_string(),
				limit: Some(limit),
				..Default::default()
			})
			.await
			.expect_err("Invalid limit must be rejected.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}
}

#[tokio::test]
async fn embedding_dimension_mismatch_is_detected() {
	let h = harness_with(test_config(), 16, None);
	let err = h.service.verify_embedding_dimension().await.expect_err("Expected mismatch.");

	assert!(matches!(err, Error::DimensionMismatch { expected: 384, actual: 16 }));

	let err = h
		.service
		.recommend(RecommendRequest {
			query: "speaker $60".to_string(),
			..Default::default()
		})
		.await
		.expect_err("Wrong-sized query vectors must fail.");

	assert!(matches!(err, Error::Provider { .. }));
}

#[tokio::test]
async fn bulk_ingestion_embeds_once_per_batch() {
	let mut cfg = test_config();

	cfg.ingest.batch_size = 2;

	let dim = cfg.storage.qdrant.vector_dim as usize;
	let h = harness_with(cfg, dim, None);
	let report = h
		.service
		.add_products(
			(0..5)
				.map(|idx| {
					product(&format!("Mug {idx}"), "Stoneware mug", 10.0 + idx as f64, "Home")
				})
				.collect(),
		)
		.await
		.expect("Import failed.");

	assert_eq!(report.imported, 5);
	assert_eq!(report.batches, 3);
	assert_eq!(h.embed_calls.load(Ordering::SeqCst), 3);
	assert_eq!(h.index.len(), 5);
}

#[tokio::test]
async fn invalid_products_are_rejected_before_any_write() {
	let h = harness();
	let err = h
		.service
		.add_products(vec![
			product("Mug", "Stoneware mug", 12.0, "Home"),
			product("Plate", "Broken plate", f64::NAN, "Home"),
		])
		.await
		.expect_err("NaN price must be rejected.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(h.index.is_empty());
	assert_eq!(h.embed_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn catalog_inspection_reports_categories_and_price_ranges() {
	let mut cfg = test_config();

	cfg.ingest.scan_page_size = 3;

	let dim = cfg.storage.qdrant.vector_dim as usize;
	let h = harness_with(cfg, dim, None);

	seed_catalog(&h.service).await;

	let added = h
		.service
		.add_product(AddProductRequest {
			name: "Notebook".to_string(),
			description: "Dotted paper notebook".to_string(),
			price: 8.0,
			category: None,
		})
		.await
		.expect("Add failed.");

	assert!(!added.id.is_empty());

	let summary = h.service.categories().await.expect("Categories failed.");

	assert_eq!(summary.total_items, 5);
	assert_eq!(summary.available_categories.get("Electronics"), Some(&3));
	assert_eq!(summary.available_categories.get("Garden"), Some(&1));

	match h.service.category_price_range("electro").await.expect("Price range failed.") {
		CategoryPriceRange::Found { item_count, price_range, sample_items, .. } => {
			assert_eq!(item_count, 3);
			assert_eq!(price_range.min, 59.0);
			assert_eq!(price_range.max, 900.0);
			assert!((price_range.average - 1058.0 / 3.0).abs() < 1e-9);
			assert_eq!(sample_items.len(), 3);
		},
		other => panic!("Unexpected answer: {other:?}"),
	}

	assert!(matches!(
		h.service.category_price_range("Toys").await.expect("Price range failed."),
		CategoryPriceRange::Empty { .. }
	));

	let listed = h.service.list_products(2).await.expect("List failed.");

	assert_eq!(listed.products.len(), 2);
}

#[tokio::test]
async fn extracted_profile_sends_unit_length_query_vectors() {
	let cfg = test_config();
	let dim = cfg.storage.qdrant.vector_dim as usize;
	let index = Arc::new(MemoryIndex::new());
	let providers = Providers::new(Arc::new(ScaledEmbedding(HashEmbedder::new(dim), 3.0)), None);
	let service = RecommendService::new(cfg, index.clone(), providers);

	seed_catalog(&service).await;

	service
		.recommend(RecommendRequest {
			query: "speaker $60".to_string(),
			..Default::default()
		})
		.await
		.expect("Recommend failed.");
	service
		.recommend(RecommendRequest {
			query: "speaker".to_string(),
			target_price: Some(60.0),
			..Default::default()
		})
		.await
		.expect("Recommend failed.");

	let searches = index.searches();

	assert_eq!(searches.len(), 2);
	assert!((norm(&searches[0].vector) - 1.0).abs() < 1e-5);
	assert!((norm(&searches[1].vector) - 3.0).abs() < 1e-4);
}

#[tokio::test]
async fn connect_surfaces_an_unreachable_store() {
	let mut cfg = test_config();

	cfg.storage.qdrant.url = "http://127.0.0.1:9".to_string();
	cfg.storage.qdrant.timeout_ms = 1_000;

	let err = match RecommendService::connect(cfg).await {
		Ok(_) => panic!("Connecting to a closed port must fail."),
		Err(err) => err,
	};

	assert!(matches!(err, Error::Store { .. }), "Unexpected error: {err:?}");
}
