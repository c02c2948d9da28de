use std::sync::Arc;

use pricefit_config::PriceModelConfig;
use pricefit_domain::price::{
	ExtractedPrice, NoPriceFound, PricePatterns, PriceSource, assemble_price,
};

use crate::PriceTagger;

/// Reads a target price out of free text.
///
/// The labeling model runs first when present, on the blocking pool. Any model failure (including
/// a panicked or cancelled task), an answer without price tokens, or an unparseable assembly falls
/// back to the ordered patterns. Model errors never escape.
pub async fn extract_price(
	tagger: Option<Arc<dyn PriceTagger>>,
	cfg: &PriceModelConfig,
	text: &str,
) -> Result<ExtractedPrice, NoPriceFound> {
	if let Some(tagger) = tagger {
		let input = text.to_string();

		match tokio::task::spawn_blocking(move || tagger.tag(&input)).await {
			Ok(Ok(tokens)) =>
				match assemble_price(&tokens, &cfg.price_label_ids, &cfg.subword_prefix) {
					Some(value) if value >= 0.0 =>
						return Ok(ExtractedPrice { value, source: PriceSource::Model }),
					_ => {
						tracing::warn!(
							tokens = tokens.len(),
							"Price model found no usable price; falling back to patterns."
						);
					},
				},
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Price model failed; falling back to patterns.");
			},
			Err(err) => {
				tracing::warn!(error = %err, "Price model task failed; falling back to patterns.");
			},
		}
	}

	let (rule, value) = PricePatterns::standard().first_match(text).ok_or(NoPriceFound)?;

	tracing::debug!(rule, value, "Price matched by fallback pattern.");

	Ok(ExtractedPrice { value, source: PriceSource::Pattern })
}
