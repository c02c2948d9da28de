use std::{collections::HashMap, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
		Filter, PointId, PointStruct, Query, QueryPointsBuilder, Range, ScrollPointsBuilder,
		UpsertPointsBuilder, Value, VectorParamsBuilder, point_id::PointIdOptions, value::Kind,
		vectors_config::Config as VectorsConfig,
	},
};

use crate::{
	BoxFuture, CatalogIndex, Error, Result,
	models::{
		CatalogFilter, CatalogItem, CatalogPoint, ScoredItem, ScrollPage, ScrollRequest,
		SearchQuery, StoredItem,
	},
};

pub const CATEGORY_FIELD: &str = "category";
pub const PRICE_FIELD: &str = "price";

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &pricefit_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url)
			.api_key(cfg.api_key.clone())
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the cosine collection if missing, or checks the vector size of an existing one.
	/// Payload indexes are best effort.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			let info = self.client.collection_info(self.collection.clone()).await?;
			let actual = info
				.result
				.and_then(|info| info.config)
				.and_then(|config| config.params)
				.and_then(|params| params.vectors_config)
				.and_then(|vectors| vectors.config);

			match actual {
				Some(VectorsConfig::Params(params))
					if params.size == u64::from(self.vector_dim) => {},
				Some(VectorsConfig::Params(params)) =>
					return Err(Error::DimensionMismatch {
						expected: u64::from(self.vector_dim),
						actual: params.size,
					}),
				_ =>
					return Err(Error::Unavailable(format!(
						"Collection {} has no single unnamed vector.",
						self.collection
					))),
			}
		} else {
			self.client
				.create_collection(
					CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
						VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
					),
				)
				.await?;

			tracing::info!(
				collection = %self.collection,
				vector_dim = self.vector_dim,
				"Created Qdrant collection."
			);
		}

		for (field, field_type) in
			[(CATEGORY_FIELD, FieldType::Keyword), (PRICE_FIELD, FieldType::Float)]
		{
			let request =
				CreateFieldIndexCollectionBuilder::new(self.collection.clone(), field, field_type)
					.wait(true);

			if let Err(err) = self.client.create_field_index(request).await {
				tracing::warn!(
					collection = %self.collection,
					field,
					error = %err,
					"Failed to create payload index."
				);
			}
		}

		Ok(())
	}

	async fn search_points(&self, query: &SearchQuery) -> Result<Vec<ScoredItem>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(query.vector.clone()))
			.limit(u64::from(query.limit))
			.with_payload(true);

		if let Some(filter) = build_filter(&query.filter) {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;
		let mut items = Vec::with_capacity(response.result.len());

		for point in response.result {
			let Some(id) = point.id.as_ref().and_then(point_id_to_string) else {
				continue;
			};
			let Some(item) = item_from_payload(&point.payload) else {
				tracing::warn!(point_id = %id, "Skipping point without a numeric price.");

				continue;
			};

			items.push(ScoredItem { id, score: point.score, item });
		}

		Ok(items)
	}

	async fn upsert_points(&self, points: Vec<CatalogPoint>) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		let mut structs = Vec::with_capacity(points.len());

		for point in points {
			if point.vector.len() != self.vector_dim as usize {
				return Err(Error::DimensionMismatch {
					expected: u64::from(self.vector_dim),
					actual: point.vector.len() as u64,
				});
			}

			structs.push(PointStruct::new(
				point.id.to_string(),
				point.vector,
				item_payload(&point.item),
			));
		}

		let count = structs.len();
		let upsert = UpsertPointsBuilder::new(self.collection.clone(), structs).wait(true);

		self.client.upsert_points(upsert).await?;

		tracing::debug!(collection = %self.collection, count, "Upserted catalog points.");

		Ok(())
	}

	async fn scroll_points(&self, request: &ScrollRequest) -> Result<ScrollPage> {
		let mut scroll = ScrollPointsBuilder::new(self.collection.clone())
			.limit(request.limit)
			.with_payload(true)
			.with_vectors(false);

		if let Some(filter) = build_filter(&request.filter) {
			scroll = scroll.filter(filter);
		}
		if let Some(offset) = request.offset.as_deref() {
			scroll = scroll.offset(parse_point_id(offset));
		}

		let response = self.client.scroll(scroll).await?;
		let mut items = Vec::with_capacity(response.result.len());

		for point in response.result {
			let Some(id) = point.id.as_ref().and_then(point_id_to_string) else {
				continue;
			};
			let Some(item) = item_from_payload(&point.payload) else {
				tracing::warn!(point_id = %id, "Skipping point without a numeric price.");

				continue;
			};

			items.push(StoredItem { id, item });
		}

		Ok(ScrollPage {
			items,
			next_offset: response.next_page_offset.as_ref().and_then(point_id_to_string),
		})
	}
}
impl CatalogIndex for QdrantStore {
	fn search<'a>(&'a self, query: &'a SearchQuery) -> BoxFuture<'a, Result<Vec<ScoredItem>>> {
		Box::pin(self.search_points(query))
	}

	fn upsert<'a>(&'a self, points: Vec<CatalogPoint>) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_points(points))
	}

	fn scroll<'a>(&'a self, request: &'a ScrollRequest) -> BoxFuture<'a, Result<ScrollPage>> {
		Box::pin(self.scroll_points(request))
	}
}

pub fn build_filter(filter: &CatalogFilter) -> Option<Filter> {
	let mut must = Vec::new();

	if let Some(category) = filter.category.as_ref() {
		must.push(Condition::matches(CATEGORY_FIELD, category.clone()));
	}
	if let Some(range) = filter.price {
		must.push(Condition::range(
			PRICE_FIELD,
			Range { gte: Some(range.min), lte: Some(range.max), ..Default::default() },
		));
	}

	if must.is_empty() { None } else { Some(Filter::must(must)) }
}

pub fn item_payload(item: &CatalogItem) -> Payload {
	Payload::from(item_payload_map(item))
}

pub fn item_payload_map(item: &CatalogItem) -> HashMap<String, Value> {
	let mut payload_map = HashMap::new();

	payload_map.insert("name".to_string(), Value::from(item.name.clone()));
	payload_map.insert("description".to_string(), Value::from(item.description.clone()));
	payload_map.insert(PRICE_FIELD.to_string(), Value::from(item.price));
	payload_map.insert("text".to_string(), Value::from(item.text()));

	if let Some(category) = item.category.as_ref() {
		payload_map.insert(CATEGORY_FIELD.to_string(), Value::from(category.clone()));
	}

	payload_map
}

/// Reads an item back from its payload. `None` when the price is missing or not numeric.
pub fn item_from_payload(payload: &HashMap<String, Value>) -> Option<CatalogItem> {
	let price = payload_f64(payload, PRICE_FIELD)?;

	Some(CatalogItem {
		name: payload_string(payload, "name").unwrap_or_default(),
		description: payload_string(payload, "description").unwrap_or_default(),
		price,
		category: payload_string(payload, CATEGORY_FIELD),
	})
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

pub fn payload_f64(payload: &HashMap<String, Value>, key: &str) -> Option<f64> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::DoubleValue(value)) if value.is_finite() => Some(*value),
		Some(Kind::IntegerValue(value)) => Some(*value as f64),
		_ => None,
	}
}

pub fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(num)) => Some(num.to_string()),
		None => None,
	}
}

fn parse_point_id(raw: &str) -> PointId {
	match raw.parse::<u64>() {
		Ok(num) => PointId::from(num),
		Err(_) => PointId::from(raw.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::PriceRange;

	#[test]
	fn empty_filter_builds_nothing() {
		assert!(build_filter(&CatalogFilter::default()).is_none());
	}

	#[test]
	fn filter_is_a_conjunction() {
		let filter = build_filter(&CatalogFilter {
			category: Some("Jewelry".to_string()),
			price: Some(PriceRange::around(656.0, 500.0)),
		})
		.expect("filter expected");

		assert_eq!(filter.must.len(), 2);
		assert!(filter.should.is_empty());
	}

	#[test]
	fn payload_round_trips_an_item() {
		let item = CatalogItem {
			name: "Gold necklace".to_string(),
			description: "18k chain".to_string(),
			price: 656.0,
			category: Some("Jewelry".to_string()),
		};
		let payload = item_payload_map(&item);

		assert_eq!(payload_string(&payload, "text").as_deref(), Some("Gold necklace - 18k chain"));
		assert_eq!(item_from_payload(&payload), Some(item));
	}

	#[test]
	fn integer_prices_are_accepted_and_missing_prices_are_not() {
		let mut payload = HashMap::new();

		payload.insert("name".to_string(), Value::from("Mug".to_string()));
		payload.insert(PRICE_FIELD.to_string(), Value::from(12_i64));

		assert_eq!(item_from_payload(&payload).map(|item| item.price), Some(12.0));

		payload.insert(PRICE_FIELD.to_string(), Value::from("twelve".to_string()));

		assert!(item_from_payload(&payload).is_none());
	}

	#[test]
	fn point_ids_render_as_strings() {
		let uuid = "5c56c793-69f3-4fbf-87e6-c4bf54c28c26";

		assert_eq!(point_id_to_string(&PointId::from(uuid.to_string())).as_deref(), Some(uuid));
		assert_eq!(point_id_to_string(&PointId::from(42_u64)).as_deref(), Some("42"));
		assert_eq!(point_id_to_string(&parse_point_id("42")).as_deref(), Some("42"));
	}
}
