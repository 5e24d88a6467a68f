use serde::{Deserialize, Serialize};

use crate::{Error, Result, SnapService};
use snapmatch_providers::prompt::DESCRIBE_UNAVAILABLE;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageRequest {
	#[serde(default)]
	pub image_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageResponse {
	pub analysis: String,
	pub image_url: String,
}

impl SnapService {
	/// Describes the product in an image. Provider failures degrade to a fixed notice.
	pub async fn analyze_image(&self, req: AnalyzeImageRequest) -> Result<AnalyzeImageResponse> {
		let image_url = req.image_url.trim();

		if image_url.is_empty() {
			return Err(Error::InvalidRequest { message: "Image URL is required.".to_string() });
		}

		let analysis = match self.oracle.describe(&self.cfg.provider, image_url).await {
			Ok(text) => text,
			Err(err) => {
				tracing::warn!(error = %err, "Image analysis failed.");

				DESCRIBE_UNAVAILABLE.to_string()
			},
		};

		Ok(AnalyzeImageResponse { analysis, image_url: image_url.to_string() })
	}
}
