pub mod catalog;
pub mod price;
pub mod recommend;

mod error;

pub use catalog::{
	AddProductRequest, AddProductResponse, CategoryPriceRange, CategorySummary, ImportReport,
	PriceStats, ProductList, SampleItem,
};
pub use error::{Error, Result};
pub use recommend::{RecommendRequest, RecommendResponse, Recommendation, Weights};

use std::{future::Future, pin::Pin, sync::Arc};

use pricefit_config::{Config, EmbeddingProviderConfig};
use pricefit_domain::price::LabeledToken;
use pricefit_providers::{embedding::EmbeddingClient, price_tagger::BertPriceTagger};
use pricefit_storage::{CatalogIndex, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DIMENSION_PROBE_TEXT: &str = "dimension probe";

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

/// Sequence labeling over the tokenized text. Special tokens are already removed.
pub trait PriceTagger
where
	Self: Send + Sync,
{
	fn tag(&self, text: &str) -> Result<Vec<LabeledToken>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	/// `None` runs the pattern fallback alone.
	pub price_tagger: Option<Arc<dyn PriceTagger>>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		price_tagger: Option<Arc<dyn PriceTagger>>,
	) -> Self {
		Self { embedding, price_tagger }
	}

	/// HTTP embedding client plus the local price model when it is enabled.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let embedding = HttpEmbedding { client: EmbeddingClient::new(&cfg.providers.embedding)? };
		let price_tagger: Option<Arc<dyn PriceTagger>> = if cfg.providers.price_model.enabled {
			Some(Arc::new(BertPriceTagger::load(&cfg.providers.price_model)?))
		} else {
			tracing::info!("Price model disabled; using pattern extraction only.");

			None
		};

		Ok(Self { embedding: Arc::new(embedding), price_tagger })
	}
}

pub struct RecommendService {
	pub cfg: Config,
	pub index: Arc<dyn CatalogIndex>,
	pub providers: Providers,
}
impl RecommendService {
	pub fn new(cfg: Config, index: Arc<dyn CatalogIndex>, providers: Providers) -> Self {
		Self { cfg, index, providers }
	}

	/// Startup wiring shared by the binaries: connects Qdrant, ensures the collection, loads the
	/// providers and checks the embedding dimension. Any failure aborts startup.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let qdrant = QdrantStore::new(&cfg.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		let providers = Providers::from_config(&cfg)?;
		let service = Self::new(cfg, Arc::new(qdrant), providers);

		service.verify_embedding_dimension().await?;

		Ok(service)
	}

	/// Embeds a probe text once and fails when the vector size differs from the store's.
	pub async fn verify_embedding_dimension(&self) -> Result<()> {
		let texts = vec![DIMENSION_PROBE_TEXT.to_string()];
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let expected = u64::from(self.cfg.storage.qdrant.vector_dim);
		let actual = vectors.first().map(|vec| vec.len() as u64).unwrap_or(0);

		if actual != expected {
			return Err(Error::DimensionMismatch { expected, actual });
		}

		tracing::info!(vector_dim = expected, "Embedding dimension verified.");

		Ok(())
	}

	/// One vector of the configured size per input text, or a provider error.
	pub(crate) async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, texts).await?;

		if vectors.len() != texts.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} texts.",
					vectors.len(),
					texts.len()
				),
			});
		}

		let dim = self.cfg.storage.qdrant.vector_dim as usize;

		if let Some(vec) = vectors.iter().find(|vec| vec.len() != dim) {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned a vector of length {}; expected {dim}.",
					vec.len()
				),
			});
		}

		Ok(vectors)
	}
}

struct HttpEmbedding {
	client: EmbeddingClient,
}
impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(self.client.embed(cfg, texts).await?) })
	}
}

impl PriceTagger for BertPriceTagger {
	fn tag(&self, text: &str) -> Result<Vec<LabeledToken>> {
		Ok(BertPriceTagger::tag(self, text)?)
	}
}
