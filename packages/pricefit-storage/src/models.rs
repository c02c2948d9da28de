use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog entry as stored in the point payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
	pub name: String,
	pub description: String,
	pub price: f64,
	pub category: Option<String>,
}
impl CatalogItem {
	/// Text that gets embedded for the item.
	pub fn text(&self) -> String {
		format!("{} - {}", self.name, self.description)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredItem {
	pub id: String,
	#[serde(flatten)]
	pub item: CatalogItem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
	pub id: String,
	pub score: f32,
	pub item: CatalogItem,
}

#[derive(Debug, Clone)]
pub struct CatalogPoint {
	pub id: Uuid,
	pub vector: Vec<f32>,
	pub item: CatalogItem,
}

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
	pub min: f64,
	pub max: f64,
}
impl PriceRange {
	pub fn around(target: f64, tolerance: f64) -> Self {
		Self { min: target - tolerance, max: target + tolerance }
	}

	pub fn contains(&self, price: f64) -> bool {
		price >= self.min && price <= self.max
	}
}

/// Conjunction of an exact category match and a price range. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
	pub category: Option<String>,
	pub price: Option<PriceRange>,
}
impl CatalogFilter {
	pub fn matches(&self, item: &CatalogItem) -> bool {
		if let Some(category) = self.category.as_deref()
			&& item.category.as_deref() != Some(category)
		{
			return false;
		}

		self.price.is_none_or(|range| range.contains(item.price))
	}
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
	pub vector: Vec<f32>,
	pub limit: u32,
	pub filter: CatalogFilter,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollRequest {
	pub filter: CatalogFilter,
	pub limit: u32,
	/// Opaque offset from a previous page.
	pub offset: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
	pub items: Vec<StoredItem>,
	pub next_offset: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(price: f64, category: Option<&str>) -> CatalogItem {
		CatalogItem {
			name: "Lamp".to_string(),
			description: "Brass desk lamp".to_string(),
			price,
			category: category.map(str::to_string),
		}
	}

	#[test]
	fn price_range_is_inclusive() {
		let range = PriceRange::around(100.0, 20.0);

		assert!(range.contains(80.0));
		assert!(range.contains(120.0));
		assert!(!range.contains(120.01));
	}

	#[test]
	fn filter_requires_both_conditions() {
		let filter = CatalogFilter {
			category: Some("Home".to_string()),
			price: Some(PriceRange::around(50.0, 10.0)),
		};

		assert!(filter.matches(&item(55.0, Some("Home"))));
		assert!(!filter.matches(&item(55.0, Some("Garden"))));
		assert!(!filter.matches(&item(55.0, None)));
		assert!(!filter.matches(&item(75.0, Some("Home"))));
		assert!(CatalogFilter::default().matches(&item(75.0, None)));
	}

	#[test]
	fn item_text_joins_name_and_description() {
		assert_eq!(item(1.0, None).text(), "Lamp - Brass desk lamp");
	}
}
