use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value;

use snapmatch_config::ProviderConfig;
use snapmatch_domain::{ImageRef, SimilarityVerdict, image};

use crate::{Candidate, Error, Result, prompt};

const FALLBACK_MIME: &str = "image/jpeg";
const EMPTY_DESCRIPTION: &str = "Unable to analyze image content";

pub async fn compare(
	cfg: &ProviderConfig,
	query_image: &str,
	candidate: Candidate<'_>,
) -> Result<SimilarityVerdict> {
	let client = crate::http_client(cfg)?;
	let query_part = inline_part(&client, query_image).await?;
	let product_part = inline_part(&client, candidate.image_url).await?;
	let body = serde_json::json!({
		"contents": [{
			"role": "user",
			"parts": [
				{ "text": prompt::comparison(candidate.name, candidate.category) },
				query_part,
				product_part,
			],
		}],
		"generationConfig": {
			"responseMimeType": "application/json",
			"responseSchema": {
				"type": "object",
				"properties": {
					"similarityScore": { "type": "number" },
					"reasoning": { "type": "string" },
					"visualFeatures": { "type": "array", "items": { "type": "string" } },
				},
				"required": ["similarityScore", "reasoning", "visualFeatures"],
			},
		},
	});
	let json = generate(&client, cfg, &body).await?;

	parse_compare_response(&json)
}

pub async fn describe(cfg: &ProviderConfig, image: &str) -> Result<String> {
	let client = crate::http_client(cfg)?;
	let image_part = inline_part(&client, image).await?;
	let body = serde_json::json!({
		"contents": [{
			"role": "user",
			"parts": [{ "text": prompt::DESCRIBE_PROMPT }, image_part],
		}],
	});
	let json = generate(&client, cfg, &body).await?;
	let text = response_text(&json)?;

	if text.trim().is_empty() {
		return Ok(EMPTY_DESCRIPTION.to_string());
	}

	Ok(text.trim().to_string())
}

async fn generate(client: &Client, cfg: &ProviderConfig, body: &Value) -> Result<Value> {
	let url = format!("{}/models/{}:generateContent", cfg.api_base, cfg.model);
	let res =
		client.post(url).headers(crate::request_headers(cfg)?).json(body).send().await?;

	Ok(res.error_for_status()?.json().await?)
}

/// Builds an `inline_data` part, downloading remote images first.
async fn inline_part(client: &Client, raw: &str) -> Result<Value> {
	let (mime_type, data) = match ImageRef::parse(raw)? {
		ImageRef::Inline { mime_type, data } => (mime_type.to_string(), data.to_string()),
		ImageRef::Remote { url } => {
			let res = client.get(url).send().await?.error_for_status()?;
			let mime_type = res
				.headers()
				.get(CONTENT_TYPE)
				.and_then(|value| value.to_str().ok())
				.map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
				.filter(|value| value.starts_with("image/"))
				.unwrap_or_else(|| FALLBACK_MIME.to_string());
			let bytes = res.bytes().await?;

			(mime_type, image::encode_base64(&bytes))
		},
	};

	Ok(serde_json::json!({ "inline_data": { "mime_type": mime_type, "data": data } }))
}

fn response_text(json: &Value) -> Result<String> {
	let parts = json
		.pointer("/candidates/0/content/parts")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Gemini response is missing candidate content.".to_string(),
		})?;

	Ok(parts.iter().filter_map(|part| part.get("text").and_then(Value::as_str)).collect())
}

fn parse_compare_response(json: &Value) -> Result<SimilarityVerdict> {
	let text = response_text(json)?;
	let parsed: Value = serde_json::from_str(strip_code_fence(&text))?;

	crate::verdict_from_json(&parsed)
}

fn strip_code_fence(text: &str) -> &str {
	let trimmed = text.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}
