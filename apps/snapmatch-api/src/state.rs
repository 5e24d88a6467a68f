use std::sync::Arc;

use snapmatch_service::SnapService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SnapService>,
}
impl AppState {
	pub fn new(config: snapmatch_config::Config) -> color_eyre::Result<Self> {
		let service = SnapService::from_config(config)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: SnapService) -> Self {
		Self { service: Arc::new(service) }
	}
}
