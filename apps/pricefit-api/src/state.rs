use std::sync::Arc;

use pricefit_service::RecommendService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RecommendService>,
}
impl AppState {
	pub async fn new(config: pricefit_config::Config) -> color_eyre::Result<Self> {
		let service = RecommendService::connect(config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: RecommendService) -> Self {
		Self { service: Arc::new(service) }
	}
}
