use std::str::FromStr;

use axum::{
	Json, Router,
	extract::{
		DefaultBodyLimit, Multipart, Path, Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use snapmatch_domain::{CategoryCount, Product, SearchFilters, filter};
use snapmatch_service::{
	AnalyzeImageRequest, AnalyzeImageResponse, Error as ServiceError, SearchCreated,
	SearchRequest, SearchResultsResponse, UploadedImage,
};

const UPLOAD_FIELD: &str = "image";
// Room for multipart boundaries and part headers on top of the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1_024;

pub fn router(state: AppState) -> Router {
	let upload_limit =
		usize::try_from(state.service.cfg.upload.max_bytes).unwrap_or(usize::MAX);

	Router::new()
		.route("/health", get(health))
		.route(
			"/upload",
			post(upload)
				.layer(DefaultBodyLimit::max(upload_limit.saturating_add(MULTIPART_OVERHEAD_BYTES))),
		)
		.route("/search", post(create_search))
		.route("/search/{search_id}/results", get(search_results))
		.route("/categories", get(categories))
		.route("/products", get(products))
		.route("/analyze-image", post(analyze_image))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn upload(
	State(state): State<AppState>,
	mut multipart: Multipart,
) -> Result<Json<SearchCreated>, ApiError> {
	while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
		if field.name() != Some(UPLOAD_FIELD) {
			continue;
		}

		let content_type = field.content_type().map(ToString::to_string);
		let bytes = field.bytes().await.map_err(multipart_error)?;
		let response = state
			.service
			.create_search_from_upload(UploadedImage { content_type, bytes: bytes.to_vec() })
			.await?;

		return Ok(Json(response));
	}

	Err(json_error(StatusCode::BAD_REQUEST, "invalid_request", "No image file provided."))
}

async fn create_search(
	State(state): State<AppState>,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchCreated>, ApiError> {
	let Json(payload) = payload.map_err(json_rejection)?;
	let response = state.service.create_search_from_url(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
	pub min_similarity: Option<String>,
	pub max_similarity: Option<String>,
	pub categories: Option<String>,
	pub min_price: Option<String>,
	pub max_price: Option<String>,
}
impl ResultsQuery {
	/// Blank values count as absent; anything else must parse as a number.
	pub fn into_filters(self) -> Result<SearchFilters, ApiError> {
		Ok(SearchFilters {
			min_similarity: parse_number("minSimilarity", self.min_similarity.as_deref())?,
			max_similarity: parse_number("maxSimilarity", self.max_similarity.as_deref())?,
			categories: self.categories.as_deref().map(filter::parse_categories).unwrap_or_default(),
			min_price: parse_number("minPrice", self.min_price.as_deref())?,
			max_price: parse_number("maxPrice", self.max_price.as_deref())?,
		})
	}
}

async fn search_results(
	State(state): State<AppState>,
	Path(search_id): Path<String>,
	query: Result<Query<ResultsQuery>, QueryRejection>,
) -> Result<Json<SearchResultsResponse>, ApiError> {
	let Query(query) = query.map_err(|err| {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
	})?;
	let filters = query.into_filters()?;
	// A malformed id can never name a stored session.
	let search_id = Uuid::parse_str(search_id.trim()).map_err(|_| {
		json_error(StatusCode::NOT_FOUND, "not_found", format!("Search {search_id} not found."))
	})?;
	let response = state.service.search_results(search_id, filters).await?;

	Ok(Json(response))
}

async fn categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryCount>>, ApiError> {
	let response = state.service.categories().await?;

	Ok(Json(response))
}

async fn products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
	let response = state.service.products().await?;

	Ok(Json(response))
}

async fn analyze_image(
	State(state): State<AppState>,
	payload: Result<Json<AnalyzeImageRequest>, JsonRejection>,
) -> Result<Json<AnalyzeImageResponse>, ApiError> {
	let Json(payload) = payload.map_err(json_rejection)?;
	let response = state.service.analyze_image(payload).await?;

	Ok(Json(response))
}

fn parse_number<T>(label: &str, raw: Option<&str>) -> Result<Option<T>, ApiError>
where
	T: FromStr,
{
	let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
		return Ok(None);
	};

	raw.parse().map(Some).map_err(|_| {
		json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			format!("{label} must be a number, got {raw:?}."),
		)
	})
}

fn json_rejection(err: JsonRejection) -> ApiError {
	json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
	json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: String,
	error_code: String,
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

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message),
			ServiceError::Provider { message } | ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Request failed.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"Internal server error.",
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error: self.message, error_code: self.error_code };

		(self.status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blank_query_values_are_absent() {
		let query = ResultsQuery {
			min_similarity: Some("  ".to_string()),
			categories: Some(" , ".to_string()),
			..Default::default()
		};

		assert!(query.into_filters().expect("filters failed").is_empty());
	}

	#[test]
	fn parses_every_filter() {
		let query = ResultsQuery {
			min_similarity: Some("0.4".to_string()),
			max_similarity: Some("0.9".to_string()),
			categories: Some("Electronics > Audio,Home > Lighting".to_string()),
			min_price: Some("500".to_string()),
			max_price: Some("1500".to_string()),
		};
		let filters = query.into_filters().expect("filters failed");

		assert_eq!(filters.min_similarity, Some(0.4));
		assert_eq!(filters.max_similarity, Some(0.9));
		assert_eq!(filters.categories, vec!["Electronics > Audio", "Home > Lighting"]);
		assert_eq!(filters.min_price, Some(500.0));
		assert_eq!(filters.max_price, Some(1_500.0));
	}

	#[test]
	fn unparsable_number_is_a_bad_request() {
		let query = ResultsQuery { max_price: Some("cheap".to_string()), ..Default::default() };
		let err = query.into_filters().expect_err("Expected a parse error.");

		assert_eq!(err.status, StatusCode::BAD_REQUEST);
		assert_eq!(err.error_code, "invalid_request");
	}
}
