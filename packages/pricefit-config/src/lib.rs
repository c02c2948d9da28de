mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Ingest, PriceModelConfig, Providers, Qdrant, Ranking,
	RankingProfile, Service, Storage,
};

use std::{fs, path::Path};

pub const PRICE_SIMILARITY_MODES: [&str; 2] = ["normalized_distance", "exponential_decay"];
pub const TEXT_SCORE_MODES: [&str; 2] = ["raw", "min_max"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw).map_err(|err| Error::ParseToml { source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (key, value) in &cfg.providers.embedding.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("providers.embedding.default_headers.{key} must be a string."),
			});
		}
	}

	let price_model = &cfg.providers.price_model;

	if price_model.enabled {
		if price_model.path.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.price_model.path must be non-empty when enabled.".to_string(),
			});
		}
		if price_model.price_label_ids.is_empty() {
			return Err(Error::Validation {
				message: "providers.price_model.price_label_ids must be non-empty when enabled."
					.to_string(),
			});
		}
		if price_model.max_tokens < 3 {
			return Err(Error::Validation {
				message: "providers.price_model.max_tokens must be at least 3.".to_string(),
			});
		}
	}

	validate_profile("ranking.extracted", &cfg.ranking.extracted)?;
	validate_profile("ranking.explicit", &cfg.ranking.explicit)?;

	if cfg.ingest.batch_size == 0 {
		return Err(Error::Validation {
			message: "ingest.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.ingest.scan_page_size == 0 {
		return Err(Error::Validation {
			message: "ingest.scan_page_size must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_profile(label: &str, profile: &RankingProfile) -> Result<()> {
	// Weights are deliberately not required to sum to one.
	for (field, value) in
		[("price_weight", profile.price_weight), ("text_weight", profile.text_weight)]
	{
		if !value.is_finite() {
			return Err(Error::Validation {
				message: format!("{label}.{field} must be a finite number."),
			});
		}
	}

	if !PRICE_SIMILARITY_MODES.contains(&profile.price_similarity.as_str()) {
		return Err(Error::Validation {
			message: format!(
				"{label}.price_similarity must be one of normalized_distance or exponential_decay."
			),
		});
	}
	if !profile.decay_constant.is_finite() || profile.decay_constant <= 0.0 {
		return Err(Error::Validation {
			message: format!("{label}.decay_constant must be a finite number greater than zero."),
		});
	}
	if !TEXT_SCORE_MODES.contains(&profile.text_score.as_str()) {
		return Err(Error::Validation {
			message: format!("{label}.text_score must be one of raw or min_max."),
		});
	}
	if profile.max_limit == 0 {
		return Err(Error::Validation {
			message: format!("{label}.max_limit must be greater than zero."),
		});
	}
	if profile.default_limit == 0 || profile.default_limit > profile.max_limit {
		return Err(Error::Validation {
			message: format!("{label}.default_limit must be in the range 1-max_limit."),
		});
	}

	if let Some(tolerance) = profile.tolerance
		&& (!tolerance.is_finite() || tolerance < 0.0)
	{
		return Err(Error::Validation {
			message: format!("{label}.tolerance must be a finite number, zero or greater."),
		});
	}

	if profile.over_fetch_factor == 0 {
		return Err(Error::Validation {
			message: format!("{label}.over_fetch_factor must be greater than zero."),
		});
	}
	if profile.unfiltered_candidate_k == 0 {
		return Err(Error::Validation {
			message: format!("{label}.unfiltered_candidate_k must be greater than zero."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}
	if cfg.providers.embedding.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false)
	{
		cfg.providers.embedding.api_key = None;
	}
	if cfg.providers.embedding.api_base.ends_with('/')
		&& cfg.providers.embedding.path.starts_with('/')
	{
		cfg.providers.embedding.api_base.pop();
	}
}
