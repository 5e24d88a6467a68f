use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use snapmatch_config::ProviderConfig;
use snapmatch_domain::{ImageRef, SimilarityVerdict};

use crate::{Candidate, Error, Result, prompt};

const MAX_POLLS: usize = 20;
const POLL_INTERVAL_MS: u64 = 500;
const DESCRIBE_MAX_TOKENS: u32 = 200;
const HEURISTIC_EXCERPT_CHARS: usize = 150;

static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)\{.*\}").expect("JSON object pattern must compile.")
});

pub async fn compare(
	cfg: &ProviderConfig,
	query_image: &str,
	candidate: Candidate<'_>,
) -> Result<SimilarityVerdict> {
	let text = format!(
		"{}\n\nAdditional context: Compare this image with a {} ({}). Focus on visual similarity.",
		prompt::comparison(candidate.name, candidate.category),
		candidate.name,
		candidate.category,
	);
	let output = predict(cfg, query_image, &text, cfg.max_tokens).await?;

	Ok(parse_compare_output(&output, candidate.category))
}

pub async fn describe(cfg: &ProviderConfig, image: &str) -> Result<String> {
	let output = predict(cfg, image, prompt::DESCRIBE_PROMPT, DESCRIBE_MAX_TOKENS).await?;

	if output.trim().is_empty() {
		return Ok("Unable to analyze image content".to_string());
	}

	Ok(output.trim().to_string())
}

/// Runs one prediction and returns its joined text output.
async fn predict(cfg: &ProviderConfig, image: &str, text: &str, max_tokens: u32) -> Result<String> {
	// Replicate accepts both data URLs and remote URLs as-is; parsing only validates the reference.
	ImageRef::parse(image)?;

	let client = crate::http_client(cfg)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"input": { "image": image, "prompt": text, "max_tokens": max_tokens },
	});

	if let Some(version) = cfg.version.as_deref() {
		body["version"] = Value::String(version.to_string());
	}

	let res = client
		.post(url)
		.headers(crate::request_headers(cfg)?)
		.header("Prefer", "wait")
		.json(&body)
		.send()
		.await?;
	let mut prediction: Value = res.error_for_status()?.json().await?;

	for _ in 0..MAX_POLLS {
		match prediction_state(&prediction)? {
			PredictionState::Done(text) => return Ok(text),
			PredictionState::Pending(poll_url) => {
				tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;

				prediction = poll(&client, cfg, &poll_url).await?;
			},
		}
	}

	Err(Error::InvalidResponse { message: "Replicate prediction did not finish in time.".to_string() })
}

async fn poll(client: &Client, cfg: &ProviderConfig, url: &str) -> Result<Value> {
	let res = client.get(url).headers(crate::request_headers(cfg)?).send().await?;

	Ok(res.error_for_status()?.json().await?)
}

#[derive(Debug, PartialEq)]
enum PredictionState {
	Done(String),
	Pending(String),
}

fn prediction_state(prediction: &Value) -> Result<PredictionState> {
	let status = prediction.get("status").and_then(Value::as_str).unwrap_or("succeeded");

	match status {
		"succeeded" => Ok(PredictionState::Done(output_text(prediction.get("output")))),
		"failed" | "canceled" => {
			let reason =
				prediction.get("error").and_then(Value::as_str).unwrap_or("no error detail");

			Err(Error::InvalidResponse { message: format!("Replicate prediction {status}: {reason}") })
		},
		_ => prediction
			.pointer("/urls/get")
			.and_then(Value::as_str)
			.map(|url| PredictionState::Pending(url.to_string()))
			.ok_or_else(|| Error::InvalidResponse {
				message: format!("Replicate prediction is {status} without a poll URL."),
			}),
	}
}

/// Joins streamed token arrays; strings pass through and anything else is rendered as JSON.
fn output_text(output: Option<&Value>) -> String {
	match output {
		None | Some(Value::Null) => String::new(),
		Some(Value::String(text)) => text.clone(),
		Some(Value::Array(tokens)) => tokens
			.iter()
			.map(|token| match token {
				Value::String(text) => text.clone(),
				other => other.to_string(),
			})
			.collect(),
		Some(other) => other.to_string(),
	}
}

fn parse_compare_output(output: &str, category: &str) -> SimilarityVerdict {
	let embedded = JSON_OBJECT
		.find(output)
		.and_then(|found| serde_json::from_str::<Value>(found.as_str()).ok())
		.and_then(|json| crate::verdict_from_json(&json).ok());

	match embedded {
		Some(verdict) => verdict,
		None => {
			tracing::debug!("Replicate output has no JSON verdict; using keyword heuristic.");

			keyword_verdict(output, category)
		},
	}
}

/// Scores free-form model prose by looking for similarity keywords.
pub fn keyword_verdict(output: &str, category: &str) -> SimilarityVerdict {
	let text = output.to_lowercase();
	let mentions_similar = text.contains("similar");
	let mut score = 0.1_f64;
	let mut features = Vec::new();

	if mentions_similar || text.contains("match") {
		score += 0.3;
		features.push("AI detected similarities".to_string());
	}
	if text.contains("same") || text.contains("identical") {
		score += 0.4;
		features.push("Strong visual match".to_string());
	}
	if text.contains("color") && mentions_similar {
		score += 0.2;
		features.push("Color similarity".to_string());
	}
	if text.contains("shape") && mentions_similar {
		score += 0.2;
		features.push("Shape similarity".to_string());
	}
	if category.to_lowercase().split(' ').filter(|word| !word.is_empty()).any(|word| text.contains(word))
	{
		score += 0.1;
		features.push("Category match".to_string());
	}
	if features.is_empty() {
		features.push("Basic visual analysis".to_string());
	}

	let excerpt: String = output.chars().take(HEURISTIC_EXCERPT_CHARS).collect();

	SimilarityVerdict::new(
		score.min(1.0),
		format!("Analysis based on AI description: {excerpt}..."),
		features,
	)
}
