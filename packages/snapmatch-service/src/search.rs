use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, SnapService};
use snapmatch_domain::{ImageRef, ProductMatch, SearchFilters, SearchSession, filter, image};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
	#[serde(default)]
	pub image_url: String,
}

/// Raw multipart upload as received by the HTTP layer.
#[derive(Clone, Debug)]
pub struct UploadedImage {
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCreated {
	pub search_id: Uuid,
	pub image_url: String,
}
impl From<SearchSession> for SearchCreated {
	fn from(session: SearchSession) -> Self {
		Self { search_id: session.id, image_url: session.image_url }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultsResponse {
	pub search: SearchSession,
	pub results: Vec<ProductMatch>,
	pub total_count: usize,
}

impl SnapService {
	pub async fn create_search_from_url(&self, req: SearchRequest) -> Result<SearchCreated> {
		let image_url = req.image_url.trim();

		if image_url.is_empty() {
			return Err(Error::InvalidRequest { message: "Image URL is required.".to_string() });
		}

		ImageRef::parse(image_url)?;

		let session = self.store.create_search(image_url.to_string()).await?;

		tracing::info!(search_id = %session.id, "Search session created from URL.");

		Ok(session.into())
	}

	pub async fn create_search_from_upload(&self, upload: UploadedImage) -> Result<SearchCreated> {
		let content_type = upload
			.content_type
			.as_deref()
			.map(str::trim)
			.filter(|value| value.starts_with("image/"))
			.ok_or_else(|| Error::InvalidRequest {
				message: "Only image files are allowed.".to_string(),
			})?;

		if upload.bytes.is_empty() {
			return Err(Error::InvalidRequest { message: "No image file provided.".to_string() });
		}
		if upload.bytes.len() as u64 > self.cfg.upload.max_bytes {
			return Err(Error::InvalidRequest {
				message: format!("Image exceeds the {} byte upload limit.", self.cfg.upload.max_bytes),
			});
		}

		let data_url = image::to_data_url(content_type, &upload.bytes);
		let session = self.store.create_search(data_url).await?;

		tracing::info!(
			search_id = %session.id,
			bytes = upload.bytes.len(),
			content_type,
			"Search session created from upload."
		);

		Ok(session.into())
	}

	/// Returns the filtered, ranked matches for a session, computing them on first read.
	pub async fn search_results(
		&self,
		search_id: Uuid,
		filters: SearchFilters,
	) -> Result<SearchResultsResponse> {
		validate_filters(&filters)?;

		let session = self.store.get_search(search_id).await?.ok_or_else(|| Error::NotFound {
			message: format!("Search {search_id} not found."),
		})?;

		self.ensure_computed(&session).await?;

		let results = self.store.list_results(search_id).await?;
		let products: HashMap<Uuid, _> = self
			.store
			.list_products()
			.await?
			.into_iter()
			.map(|product| (product.id, product))
			.collect();
		let mut matches = Vec::with_capacity(results.len());

		for result in &results {
			match products.get(&result.product_id) {
				Some(product) => matches.push(ProductMatch::new(product.clone(), result)),
				None => tracing::warn!(
					search_id = %search_id,
					product_id = %result.product_id,
					"Result references a missing product."
				),
			}
		}

		let results = filter::rank(matches, &filters);

		Ok(SearchResultsResponse { search: session, total_count: results.len(), results })
	}
}

fn validate_filters(filters: &SearchFilters) -> Result<()> {
	for (label, value) in [
		("minSimilarity", filters.min_similarity.map(f64::from)),
		("maxSimilarity", filters.max_similarity.map(f64::from)),
		("minPrice", filters.min_price),
		("maxPrice", filters.max_price),
	] {
		if let Some(value) = value
			&& !value.is_finite()
		{
			return Err(Error::InvalidRequest { message: format!("{label} must be a finite number.") });
		}
	}

	if let (Some(min), Some(max)) = (filters.min_similarity, filters.max_similarity)
		&& min > max
	{
		return Err(Error::InvalidRequest {
			message: "minSimilarity must not exceed maxSimilarity.".to_string(),
		});
	}
	if let (Some(min), Some(max)) = (filters.min_price, filters.max_price)
		&& min > max
	{
		return Err(Error::InvalidRequest {
			message: "minPrice must not exceed maxPrice.".to_string(),
		});
	}

	Ok(())
}
