use std::cmp::Ordering;

/// How closeness in price is scored. The two forms are not numerically interchangeable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceSimilarity {
	/// `1 - |price / max_price - target / max_price|`. Unclamped, so it can go negative.
	NormalizedDistance,
	/// `exp(-|price - target| / decay_constant)`. Always in `(0, 1]`.
	ExponentialDecay { decay_constant: f64 },
}
impl PriceSimilarity {
	pub fn parse(mode: &str, decay_constant: f64) -> Option<Self> {
		match mode {
			"normalized_distance" => Some(Self::NormalizedDistance),
			"exponential_decay" => Some(Self::ExponentialDecay { decay_constant }),
			_ => None,
		}
	}

	/// `max_price` must already be positive.
	pub fn score(&self, price: f64, target: f64, max_price: f64) -> f64 {
		match self {
			Self::NormalizedDistance => 1.0 - (price / max_price - target / max_price).abs(),
			Self::ExponentialDecay { decay_constant } =>
				(-(price - target).abs() / decay_constant).exp(),
		}
	}
}

/// Which text signal enters the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextScore {
	/// The store's similarity score as returned.
	Raw,
	/// Min-max normalized across the candidate batch.
	MinMax,
}
impl TextScore {
	pub fn parse(mode: &str) -> Option<Self> {
		match mode {
			"raw" => Some(Self::Raw),
			"min_max" => Some(Self::MinMax),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
	pub id: String,
	pub name: String,
	pub description: String,
	pub price: f64,
	pub category: Option<String>,
	pub raw_similarity: f32,
	pub price_similarity: f64,
	pub combined_score: f64,
}
impl Candidate {
	pub fn new(
		id: String,
		name: String,
		description: String,
		price: f64,
		category: Option<String>,
		raw_similarity: f32,
	) -> Self {
		Self {
			id,
			name,
			description,
			price,
			category,
			raw_similarity,
			price_similarity: 0.0,
			combined_score: 0.0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombineParams {
	pub target_price: f64,
	pub price_weight: f64,
	pub text_weight: f64,
	pub price_similarity: PriceSimilarity,
	pub text_score: TextScore,
	pub limit: usize,
}

/// Min-max normalization. A degenerate batch (`max == min`) maps to `0.0`.
pub fn normalize(score: f64, min: f64, max: f64) -> f64 {
	if max == min {
		return 0.0;
	}

	(score - min) / (max - min)
}

/// Scores, sorts and truncates one retrieved batch.
///
/// The sort is stable, so candidates with equal combined scores keep their retrieval order.
pub fn combine(mut candidates: Vec<Candidate>, params: &CombineParams) -> Vec<Candidate> {
	if candidates.is_empty() || params.limit == 0 {
		return Vec::new();
	}

	let max_price = candidates.iter().map(|candidate| candidate.price).fold(f64::MIN, f64::max);
	let max_price = if max_price > 0.0 { max_price } else { 1.0 };
	let (min_score, max_score) =
		candidates.iter().fold((f64::MAX, f64::MIN), |(lo, hi), candidate| {
			let score = f64::from(candidate.raw_similarity);

			(lo.min(score), hi.max(score))
		});

	for candidate in &mut candidates {
		let raw = f64::from(candidate.raw_similarity);
		let text = match params.text_score {
			TextScore::Raw => raw,
			TextScore::MinMax => normalize(raw, min_score, max_score),
		};

		candidate.price_similarity =
			params.price_similarity.score(candidate.price, params.target_price, max_price);
		candidate.combined_score =
			params.price_weight * candidate.price_similarity + params.text_weight * text;
	}

	candidates.sort_by(|left, right| cmp_f64_desc(left.combined_score, right.combined_score));
	candidates.truncate(params.limit);

	candidates
}

/// Descending order with NaN last.
pub fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exponential_decay_is_one_at_target() {
		let sim = PriceSimilarity::ExponentialDecay { decay_constant: 200.0 };

		assert_eq!(sim.score(70.0, 70.0, 99.0), 1.0);
		assert!((sim.score(270.0, 70.0, 270.0) - (-1.0_f64).exp()).abs() < 1e-12);
	}

	#[test]
	fn normalized_distance_can_go_negative() {
		let sim = PriceSimilarity::NormalizedDistance;

		assert!(sim.score(10.0, 300.0, 100.0) < 0.0);
	}

	#[test]
	fn parses_modes() {
		assert_eq!(
			PriceSimilarity::parse("exponential_decay", 50.0),
			Some(PriceSimilarity::ExponentialDecay { decay_constant: 50.0 })
		);
		assert_eq!(
			PriceSimilarity::parse("normalized_distance", 50.0),
			Some(PriceSimilarity::NormalizedDistance)
		);
		assert_eq!(PriceSimilarity::parse("linear", 50.0), None);
		assert_eq!(TextScore::parse("min_max"), Some(TextScore::MinMax));
		assert_eq!(TextScore::parse("minmax"), None);
	}

	#[test]
	fn nan_sorts_last() {
		let mut values = vec![0.2, f64::NAN, 0.9];

		values.sort_by(|a, b| cmp_f64_desc(*a, *b));

		assert_eq!(values[0], 0.9);
		assert_eq!(values[1], 0.2);
		assert!(values[2].is_nan());
	}
}
