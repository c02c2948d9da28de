use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub ingest: Ingest,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub api_key: Option<String>,
	pub collection: String,
	pub vector_dim: u32,
	/// Applies to every request the store client issues, searches included.
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub price_model: PriceModelConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: Option<String>,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Token-classification checkpoint used to read prices out of query text.
///
/// `path` is a directory holding `tokenizer.json`, `config.json` and `model.safetensors`.
#[derive(Debug, Deserialize)]
pub struct PriceModelConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	pub path: String,
	#[serde(default = "default_price_label_ids")]
	pub price_label_ids: Vec<u32>,
	#[serde(default = "default_subword_prefix")]
	pub subword_prefix: String,
	#[serde(default = "default_price_model_max_tokens")]
	pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	/// Used when the caller leaves the target price to the extractor.
	pub extracted: RankingProfile,
	/// Used when the caller states the target price.
	pub explicit: RankingProfile,
}
impl Default for Ranking {
	fn default() -> Self {
		Self { extracted: RankingProfile::default(), explicit: RankingProfile::explicit() }
	}
}

/// A profile table, when present, must spell out every field except `tolerance`.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingProfile {
	pub price_weight: f64,
	pub text_weight: f64,
	/// One of `normalized_distance` or `exponential_decay`.
	pub price_similarity: String,
	pub decay_constant: f64,
	/// One of `raw` or `min_max`.
	pub text_score: String,
	pub default_limit: u32,
	pub max_limit: u32,
	/// Half-width of the price filter. `None` disables price filtering.
	pub tolerance: Option<f64>,
	pub over_fetch_factor: u32,
	pub unfiltered_candidate_k: u32,
	pub normalize_query: bool,
}
impl RankingProfile {
	pub fn explicit() -> Self {
		Self {
			price_weight: 0.3,
			text_weight: 0.7,
			price_similarity: "normalized_distance".to_string(),
			decay_constant: 200.0,
			text_score: "raw".to_string(),
			default_limit: 3,
			max_limit: 100,
			tolerance: None,
			over_fetch_factor: 5,
			unfiltered_candidate_k: 100,
			normalize_query: false,
		}
	}
}
impl Default for RankingProfile {
	fn default() -> Self {
		Self {
			price_weight: 0.7,
			text_weight: 0.3,
			price_similarity: "exponential_decay".to_string(),
			decay_constant: 200.0,
			text_score: "min_max".to_string(),
			default_limit: 10,
			max_limit: 100,
			tolerance: Some(500.0),
			over_fetch_factor: 5,
			unfiltered_candidate_k: 100,
			normalize_query: true,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ingest {
	pub batch_size: u32,
	pub scan_page_size: u32,
}
impl Default for Ingest {
	fn default() -> Self {
		Self { batch_size: 100, scan_page_size: 100 }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_true() -> bool {
	true
}

fn default_price_label_ids() -> Vec<u32> {
	vec![1, 2]
}

fn default_subword_prefix() -> String {
	"##".to_string()
}

fn default_price_model_max_tokens() -> u32 {
	128
}
