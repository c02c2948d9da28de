use std::sync::LazyLock;

use regex::Regex;

/// Neither the labeling model nor any pattern produced a usable price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("No price found in text.")]
pub struct NoPriceFound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
	/// Supplied by the caller.
	Explicit,
	/// Read from the sequence-labeling model's price tokens.
	Model,
	/// Matched by a fallback pattern.
	Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedPrice {
	pub value: f64,
	pub source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledToken {
	pub token: String,
	pub label: u32,
}

struct PriceRule {
	name: &'static str,
	regex: Regex,
}
impl PriceRule {
	fn capture(&self, text: &str) -> Option<f64> {
		let captures = self.regex.captures(text)?;

		parse_amount(captures.get(1)?.as_str())
	}
}

/// Ordered fallback rules. The first rule matching anywhere in the text decides the price, even
/// when a later rule matches earlier in the text.
pub struct PricePatterns {
	rules: Vec<PriceRule>,
}
impl PricePatterns {
	pub fn standard() -> &'static Self {
		static PATTERNS: LazyLock<PricePatterns> = LazyLock::new(|| PricePatterns::compile(RULES));

		&PATTERNS
	}

	fn compile(specs: &[(&'static str, &str)]) -> Self {
		let rules = specs
			.iter()
			.map(|(name, pattern)| {
				let pattern = pattern.replace("{N}", AMOUNT);
				let regex = Regex::new(&pattern).expect("Built-in price pattern must compile.");

				PriceRule { name: *name, regex }
			})
			.collect();

		Self { rules }
	}

	/// Name and value of the first rule, in table order, whose capture parses to a finite price.
	///
	/// A rule that matches but whose capture overflows `f64` counts as not matching, so a later
	/// rule may still decide the price.
	pub fn first_match(&self, text: &str) -> Option<(&'static str, f64)> {
		self.rules.iter().find_map(|rule| rule.capture(text).map(|value| (rule.name, value)))
	}
}

const AMOUNT: &str = r"(\d+(?:,\d{3})*(?:\.\d+)?)";

const RULES: &[(&str, &str)] = &[
	("amount_dollar_sign", r"{N}\$"),
	("dollar_sign_amount", r"\${N}"),
	("amount_dollars", r"(?i){N}\s*dollars?"),
	("amount_usd", r"(?i){N}\s*usd"),
	("amount_pounds", r"(?i){N}\s*pounds?"),
	("amount_euros", r"(?i){N}\s*euro?"),
	("dollar_sign_spaced_amount", r"\$\s*{N}"),
	("amount_spaced_dollar_sign", r"{N}\s*\$"),
	("usd_amount", r"(?i)usd\s*{N}"),
	("dollars_amount", r"(?i)dollars?\s*{N}"),
	("pound_sign_amount", r"£\s*{N}"),
	("amount_pound_sign", r"{N}\s*£"),
	("euro_sign_amount", r"€\s*{N}"),
	("amount_euro_sign", r"{N}\s*€"),
];

/// Joins the price-labeled tokens, drops everything but digits and dots, and parses the rest.
pub fn assemble_price(
	tokens: &[LabeledToken],
	price_labels: &[u32],
	subword_prefix: &str,
) -> Option<f64> {
	let mut joined = String::new();

	for token in tokens.iter().filter(|token| price_labels.contains(&token.label)) {
		if subword_prefix.is_empty() {
			joined.push_str(&token.token);
		} else {
			joined.push_str(&token.token.replace(subword_prefix, ""));
		}
	}

	let digits: String = joined.chars().filter(|ch| ch.is_ascii_digit() || *ch == '.').collect();

	parse_amount(&digits)
}

pub fn parse_amount(raw: &str) -> Option<f64> {
	let cleaned = raw.replace(',', "");

	cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}
