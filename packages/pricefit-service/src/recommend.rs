use serde::{Deserialize, Serialize};

use pricefit_config::RankingProfile;
use pricefit_domain::{
	price::{ExtractedPrice, PriceSource},
	ranking::{self, Candidate, CombineParams, PriceSimilarity, TextScore},
	vector,
};
use pricefit_storage::models::{CatalogFilter, PriceRange, SearchQuery};

use crate::{Error, RecommendService, Result, price};

const NO_PRICE_MESSAGE: &str = "No price found in the query.";
const NO_PRICE_SUGGESTION: &str =
	"Mention a price such as '$50' or '50 dollars', or pass target_price explicitly.";
const NO_MATCH_SUGGESTION: &str = "Try a different category or increase the price tolerance.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendRequest {
	pub query: String,
	#[serde(default)]
	pub target_price: Option<f64>,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub weights: Option<Weights>,
	#[serde(default)]
	pub tolerance: Option<f64>,
}

/// Multipliers for the two signals. They are used as given, without normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
	pub price: f64,
	pub text: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
	pub query: String,
	pub category: Option<String>,
	pub target_price: Option<f64>,
	pub price_source: Option<PriceSource>,
	pub tolerance: Option<f64>,
	pub recommendations: Vec<Recommendation>,
	pub message: Option<String>,
	pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
	pub id: String,
	pub name: String,
	pub price: f64,
	pub description: String,
	pub category: Option<String>,
	pub price_similarity: f64,
	pub score: f64,
}
impl From<Candidate> for Recommendation {
	fn from(candidate: Candidate) -> Self {
		Self {
			id: candidate.id,
			name: candidate.name,
			price: candidate.price,
			description: candidate.description,
			category: candidate.category,
			price_similarity: candidate.price_similarity,
			score: candidate.combined_score,
		}
	}
}

struct RankingPlan {
	params: CombineParams,
	filter: CatalogFilter,
	fetch_limit: u32,
	normalize_query: bool,
}

impl RecommendService {
	/// Extracts or takes the target price, retrieves filtered candidates and ranks them.
	///
	/// A missing price or an empty candidate set yields an empty list with a message. Store and
	/// provider failures are returned as errors.
	pub async fn recommend(&self, req: RecommendRequest) -> Result<RecommendResponse> {
		validate_request(&req)?;

		let profile = match req.target_price {
			Some(_) => &self.cfg.ranking.explicit,
			None => &self.cfg.ranking.extracted,
		};
		let limit = req.limit.unwrap_or(profile.default_limit);

		if limit == 0 || limit > profile.max_limit {
			return Err(Error::InvalidRequest {
				message: format!("limit must be in the range 1-{}.", profile.max_limit),
			});
		}

		let target = match req.target_price {
			Some(value) => ExtractedPrice { value, source: PriceSource::Explicit },
			None => match price::extract_price(
				self.providers.price_tagger.clone(),
				&self.cfg.providers.price_model,
				&req.query,
			)
			.await
			{
				Ok(target) => target,
				Err(err) => {
					tracing::info!(query = %req.query, "{err}");

					return Ok(RecommendResponse {
						query: req.query,
						category: req.category,
						target_price: None,
						price_source: None,
						tolerance: req.tolerance.or(profile.tolerance),
						recommendations: Vec::new(),
						message: Some(NO_PRICE_MESSAGE.to_string()),
						suggestion: Some(NO_PRICE_SUGGESTION.to_string()),
					});
				},
			},
		};
		let tolerance = req.tolerance.or(profile.tolerance);
		let plan = plan_ranking(profile, &req, target.value, tolerance, limit)?;

		tracing::debug!(
			target_price = target.value,
			price_source = ?target.source,
			fetch_limit = plan.fetch_limit,
			price_filter = plan.filter.price.is_some(),
			"Ranking plan resolved."
		);

		let vector = self.embed_query(&req.query, plan.normalize_query).await?;
		let candidates = self.retrieve(vector, &plan.filter, plan.fetch_limit).await?;
		let retrieved = candidates.len();
		let ranked = ranking::combine(candidates, &plan.params);

		tracing::debug!(retrieved, returned = ranked.len(), "Candidates combined.");

		let (message, suggestion) = if ranked.is_empty() {
			let scope = match req.category.as_deref() {
				Some(category) => format!(" in category '{category}'"),
				None => String::new(),
			};

			(
				Some(format!("No recommendations found{scope} within the specified tolerance.")),
				Some(NO_MATCH_SUGGESTION.to_string()),
			)
		} else {
			(None, None)
		};

		Ok(RecommendResponse {
			query: req.query,
			category: req.category,
			target_price: Some(target.value),
			price_source: Some(target.source),
			tolerance,
			recommendations: ranked.into_iter().map(Recommendation::from).collect(),
			message,
			suggestion,
		})
	}

	async fn embed_query(&self, query: &str, normalize: bool) -> Result<Vec<f32>> {
		let texts = vec![query.to_string()];
		let mut vectors = self.embed_texts(&texts).await?;
		let Some(mut vec) = vectors.pop() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vector.".to_string(),
			});
		};

		if normalize {
			vector::l2_normalize(&mut vec);
		}

		Ok(vec)
	}

	/// Candidates in store order. With a price filter, points outside the range are dropped.
	async fn retrieve(
		&self,
		vector: Vec<f32>,
		filter: &CatalogFilter,
		fetch_limit: u32,
	) -> Result<Vec<Candidate>> {
		let query = SearchQuery { vector, limit: fetch_limit, filter: filter.clone() };
		let hits = self.index.search(&query).await?;
		let mut candidates = Vec::with_capacity(hits.len());

		for hit in hits {
			if let Some(range) = filter.price
				&& !range.contains(hit.item.price)
			{
				tracing::debug!(
					id = %hit.id,
					price = hit.item.price,
					min = range.min,
					max = range.max,
					"Dropping candidate outside the price range."
				);

				continue;
			}

			candidates.push(Candidate::new(
				hit.id,
				hit.item.name,
				hit.item.description,
				hit.item.price,
				hit.item.category,
				hit.score,
			));
		}

		Ok(candidates)
	}
}

fn validate_request(req: &RecommendRequest) -> Result<()> {
	if req.query.trim().is_empty() {
		return Err(invalid("query must be non-empty."));
	}
	if let Some(price) = req.target_price
		&& (!price.is_finite() || price < 0.0)
	{
		return Err(invalid("target_price must be a finite number, zero or greater."));
	}
	if let Some(tolerance) = req.tolerance
		&& (!tolerance.is_finite() || tolerance < 0.0)
	{
		return Err(invalid("tolerance must be a finite number, zero or greater."));
	}
	if let Some(weights) = req.weights
		&& (!weights.price.is_finite() || !weights.text.is_finite())
	{
		return Err(invalid("weights must be finite numbers."));
	}
	if let Some(category) = req.category.as_deref()
		&& category.trim().is_empty()
	{
		return Err(invalid("category must be non-empty when provided."));
	}

	Ok(())
}

fn plan_ranking(
	profile: &RankingProfile,
	req: &RecommendRequest,
	target_price: f64,
	tolerance: Option<f64>,
	limit: u32,
) -> Result<RankingPlan> {
	let price_similarity =
		PriceSimilarity::parse(&profile.price_similarity, profile.decay_constant).ok_or_else(
			|| invalid(&format!("Unknown price_similarity mode {:?}.", profile.price_similarity)),
		)?;
	let text_score = TextScore::parse(&profile.text_score)
		.ok_or_else(|| invalid(&format!("Unknown text_score mode {:?}.", profile.text_score)))?;
	let weights =
		req.weights.unwrap_or(Weights { price: profile.price_weight, text: profile.text_weight });
	let price = tolerance.map(|tolerance| PriceRange::around(target_price, tolerance));
	let fetch_limit = match price {
		Some(_) => limit.saturating_mul(profile.over_fetch_factor),
		None => profile.unfiltered_candidate_k.max(limit),
	};

	Ok(RankingPlan {
		params: CombineParams {
			target_price,
			price_weight: weights.price,
			text_weight: weights.text,
			price_similarity,
			text_score,
			limit: limit as usize,
		},
		filter: CatalogFilter { category: req.category.clone(), price },
		fetch_limit,
		normalize_query: profile.normalize_query,
	})
}

fn invalid(message: &str) -> Error {
	Error::InvalidRequest { message: message.to_string() }
}
