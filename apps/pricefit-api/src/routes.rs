use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use pricefit_service::{
	AddProductRequest, AddProductResponse, CategoryPriceRange, CategorySummary, Error,
	ProductList, RecommendRequest, RecommendResponse,
};

const DEFAULT_LIST_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
struct HealthResponse {
	status: &'static str,
	service: &'static str,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
	limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::Provider { message } => {
				tracing::error!(error = %message, "Model provider failed.");

				json_error(StatusCode::BAD_GATEWAY, "model_unavailable", message)
			},
			Error::Store { message } => {
				tracing::error!(error = %message, "Vector store failed.");

				json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
			},
			err @ Error::DimensionMismatch { .. } => {
				tracing::error!(error = %err, "Embedding dimension mismatch.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch", err.to_string())
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/recommend", post(recommend))
		.route("/v1/products", post(add_product).get(list_products))
		.route("/v1/categories", get(categories))
		.route("/v1/categories/{category}/price_range", get(category_price_range))
		.fallback(not_found)
		.with_state(state)
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { status: "healthy", service: "recommendation-api" })
}

async fn recommend(
	State(state): State<AppState>,
	Json(payload): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
	let response = state.service.recommend(payload).await?;

	Ok(Json(response))
}

async fn add_product(
	State(state): State<AppState>,
	Json(payload): Json<AddProductRequest>,
) -> Result<(StatusCode, Json<AddProductResponse>), ApiError> {
	let response = state.service.add_product(payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn list_products(
	State(state): State<AppState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<ProductList>, ApiError> {
	let response = state.service.list_products(query.limit.unwrap_or(DEFAULT_LIST_LIMIT)).await?;

	Ok(Json(response))
}

async fn categories(State(state): State<AppState>) -> Result<Json<CategorySummary>, ApiError> {
	let response = state.service.categories().await?;

	Ok(Json(response))
}

async fn category_price_range(
	State(state): State<AppState>,
	Path(category): Path<String>,
) -> Result<Json<CategoryPriceRange>, ApiError> {
	let response = state.service.category_price_range(&category).await?;

	Ok(Json(response))
}

async fn not_found() -> ApiError {
	json_error(StatusCode::NOT_FOUND, "not_found", "Endpoint not found.")
}
