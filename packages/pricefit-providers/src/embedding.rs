use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use pricefit_config::EmbeddingProviderConfig;

/// OpenAI-compatible embeddings endpoint client. Built once and shared.
pub struct EmbeddingClient {
	client: Client,
	url: String,
}
impl EmbeddingClient {
	pub fn new(cfg: &EmbeddingProviderConfig) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
			.build()?;

		Ok(Self { client, url: format!("{}{}", cfg.api_base, cfg.path) })
	}

	pub async fn embed(
		&self,
		cfg: &EmbeddingProviderConfig,
		texts: &[String],
	) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(Vec::new());
		}

		let body = serde_json::json!({
			"model": cfg.model,
			"input": texts,
		});
		let res = self.client.post(&self.url).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		tracing::debug!(provider_id = %cfg.provider_id, count = texts.len(), "Embedded texts.");

		parse_embedding_response(json)
	}
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::InvalidResponse {
				message: "Embedding item missing embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
