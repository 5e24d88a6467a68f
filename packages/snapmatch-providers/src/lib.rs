pub mod gemini;
pub mod prompt;
pub mod replicate;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

use snapmatch_config::{PROVIDER_GEMINI, PROVIDER_REPLICATE, ProviderConfig};
use snapmatch_domain::SimilarityVerdict;

const GEMINI_API_KEY_HEADER: &str = "x-goog-api-key";

/// The catalog side of a comparison.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
	pub image_url: &'a str,
	pub name: &'a str,
	pub category: &'a str,
}

/// Compares `query_image` against `candidate` with the configured provider.
pub async fn compare(
	cfg: &ProviderConfig,
	query_image: &str,
	candidate: Candidate<'_>,
) -> Result<SimilarityVerdict> {
	match cfg.provider_id.as_str() {
		PROVIDER_GEMINI => gemini::compare(cfg, query_image, candidate).await,
		PROVIDER_REPLICATE => replicate::compare(cfg, query_image, candidate).await,
		other => Err(Error::InvalidConfig { message: format!("Unknown provider {other:?}.") }),
	}
}

/// Asks the configured provider for a short description of the product shown in `image`.
pub async fn describe(cfg: &ProviderConfig, image: &str) -> Result<String> {
	match cfg.provider_id.as_str() {
		PROVIDER_GEMINI => gemini::describe(cfg, image).await,
		PROVIDER_REPLICATE => replicate::describe(cfg, image).await,
		other => Err(Error::InvalidConfig { message: format!("Unknown provider {other:?}.") }),
	}
}

pub fn request_headers(cfg: &ProviderConfig) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	match cfg.provider_id.as_str() {
		PROVIDER_GEMINI => {
			headers.insert(GEMINI_API_KEY_HEADER, HeaderValue::from_str(&cfg.api_key)?);
		},
		_ => {
			headers.insert(AUTHORIZATION, format!("Bearer {}", cfg.api_key).parse()?);
		},
	}

	for (key, value) in &cfg.default_headers {
		let Value::String(raw) = value else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn http_client(cfg: &ProviderConfig) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?)
}

/// Reads a model verdict object shaped as `{similarityScore, reasoning, visualFeatures}`.
pub(crate) fn verdict_from_json(json: &Value) -> Result<SimilarityVerdict> {
	if !json.is_object() {
		return Err(Error::InvalidResponse {
			message: "Similarity verdict must be a JSON object.".to_string(),
		});
	}

	let score = json.get("similarityScore").and_then(Value::as_f64).unwrap_or(0.0);
	let reasoning = json
		.get("reasoning")
		.and_then(Value::as_str)
		.filter(|text| !text.trim().is_empty())
		.unwrap_or(snapmatch_domain::verdict::MISSING_REASONING);
	let features = json
		.get("visualFeatures")
		.and_then(Value::as_array)
		.map(|items| items.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
		.unwrap_or_default();

	Ok(SimilarityVerdict::new(score, reasoning, features))
}
