use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pricefit_storage::models::{
	CatalogFilter, CatalogItem, CatalogPoint, ScrollRequest, StoredItem,
};

use crate::{Error, RecommendService, Result};

const SAMPLE_ITEMS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddProductRequest {
	pub name: String,
	pub description: String,
	pub price: f64,
	#[serde(default)]
	pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddProductResponse {
	pub id: String,
	pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
	pub imported: usize,
	pub batches: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductList {
	pub products: Vec<StoredItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
	pub available_categories: BTreeMap<String, u64>,
	pub total_items: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceStats {
	pub min: f64,
	pub max: f64,
	pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleItem {
	pub name: String,
	pub description: String,
	pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CategoryPriceRange {
	Found {
		category: String,
		item_count: usize,
		price_range: PriceStats,
		sample_items: Vec<SampleItem>,
	},
	Empty {
		category: String,
		message: String,
	},
}

impl RecommendService {
	pub async fn add_product(&self, req: AddProductRequest) -> Result<AddProductResponse> {
		let item = catalog_item(req)?;
		let texts = vec![item.text()];
		let mut vectors = self.embed_texts(&texts).await?;
		let vector = vectors.pop().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vector.".to_string(),
		})?;
		let id = Uuid::new_v4();

		self.index.upsert(vec![CatalogPoint { id, vector, item }]).await?;

		tracing::info!(%id, "Product added.");

		Ok(AddProductResponse {
			id: id.to_string(),
			message: "Product added successfully".to_string(),
		})
	}

	/// Validates every item first, then embeds and upserts in `ingest.batch_size` chunks.
	pub async fn add_products(&self, reqs: Vec<AddProductRequest>) -> Result<ImportReport> {
		let items = reqs.into_iter().map(catalog_item).collect::<Result<Vec<_>>>()?;
		let batch_size = self.cfg.ingest.batch_size as usize;
		let mut report = ImportReport::default();

		for batch in items.chunks(batch_size) {
			let texts = batch.iter().map(CatalogItem::text).collect::<Vec<_>>();
			let vectors = self.embed_texts(&texts).await?;
			let points = batch
				.iter()
				.cloned()
				.zip(vectors)
				.map(|(item, vector)| CatalogPoint { id: Uuid::new_v4(), vector, item })
				.collect::<Vec<_>>();

			self.index.upsert(points).await?;

			report.imported += batch.len();
			report.batches += 1;

			tracing::debug!(batch = report.batches, size = batch.len(), "Upserted product batch.");
		}

		tracing::info!(imported = report.imported, batches = report.batches, "Products imported.");

		Ok(report)
	}

	/// First scroll page, without vectors.
	pub async fn list_products(&self, limit: u32) -> Result<ProductList> {
		if limit == 0 {
			return Err(Error::InvalidRequest {
				message: "limit must be greater than zero.".to_string(),
			});
		}

		let page = self
			.index
			.scroll(&ScrollRequest { filter: CatalogFilter::default(), limit, offset: None })
			.await?;

		Ok(ProductList { products: page.items })
	}

	pub async fn categories(&self) -> Result<CategorySummary> {
		let items = self.scan_all().await?;
		let mut available_categories = BTreeMap::new();

		for stored in &items {
			if let Some(category) = stored.item.category.as_ref() {
				*available_categories.entry(category.clone()).or_insert(0) += 1;
			}
		}

		Ok(CategorySummary { available_categories, total_items: items.len() as u64 })
	}

	/// Price statistics for items whose category contains `category`, ignoring case.
	pub async fn category_price_range(&self, category: &str) -> Result<CategoryPriceRange> {
		let needle = category.to_lowercase();
		let items = self
			.scan_all()
			.await?
			.into_iter()
			.filter(|stored| {
				stored
					.item
					.category
					.as_deref()
					.is_some_and(|value| value.to_lowercase().contains(&needle))
			})
			.collect::<Vec<_>>();

		let Some(price_range) = price_stats(items.iter().map(|stored| stored.item.price)) else {
			return Ok(CategoryPriceRange::Empty {
				category: category.to_string(),
				message: "No items found in this category".to_string(),
			});
		};
		let sample_items = items
			.iter()
			.take(SAMPLE_ITEMS)
			.map(|stored| SampleItem {
				name: stored.item.name.clone(),
				description: stored.item.description.clone(),
				price: stored.item.price,
			})
			.collect();

		Ok(CategoryPriceRange::Found {
			category: category.to_string(),
			item_count: items.len(),
			price_range,
			sample_items,
		})
	}

	async fn scan_all(&self) -> Result<Vec<StoredItem>> {
		let mut request = ScrollRequest {
			filter: CatalogFilter::default(),
			limit: self.cfg.ingest.scan_page_size,
			offset: None,
		};
		let mut items = Vec::new();

		loop {
			let page = self.index.scroll(&request).await?;

			items.extend(page.items);

			match page.next_offset {
				Some(offset) => request.offset = Some(offset),
				None => break,
			}
		}

		Ok(items)
	}
}

fn catalog_item(req: AddProductRequest) -> Result<CatalogItem> {
	if req.name.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "name must be non-empty.".to_string() });
	}
	if req.description.trim().is_empty() {
		return Err(Error::InvalidRequest {
			message: "description must be non-empty.".to_string(),
		});
	}
	if !req.price.is_finite() || req.price < 0.0 {
		return Err(Error::InvalidRequest {
			message: "price must be a finite number, zero or greater.".to_string(),
		});
	}

	let category =
		req.category.map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

	Ok(CatalogItem { name: req.name, description: req.description, price: req.price, category })
}

fn price_stats(prices: impl Iterator<Item = f64>) -> Option<PriceStats> {
	let mut count = 0_usize;
	let mut sum = 0.0;
	let mut min = f64::INFINITY;
	let mut max = f64::NEG_INFINITY;

	for price in prices {
		count += 1;
		sum += price;
		min = min.min(price);
		max = max.max(price);
	}

	if count == 0 {
		return None;
	}

	Some(PriceStats { min, max, average: sum / count as f64 })
}
