use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub provider: ProviderConfig,
	pub orchestrator: Orchestrator,
	#[serde(default)]
	pub fallback: Fallback,
	#[serde(default)]
	pub upload: Upload,
	#[serde(default)]
	pub catalog: Catalog,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	/// One of "gemini" or "replicate".
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	/// Request path appended to `api_base`. Gemini ignores it and derives the path from `model`.
	pub path: String,
	pub model: String,
	/// Replicate model version hash. Sent as `version` when set.
	pub version: Option<String>,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Orchestrator {
	pub batch_size: u32,
	/// Results are stored only when the score is strictly greater than this value.
	pub inclusion_threshold: f32,
	#[serde(default)]
	pub pacing: Pacing,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pacing {
	/// One of "fixed" or "token_bucket".
	pub mode: String,
	#[serde(default = "default_batch_delay_ms")]
	pub batch_delay_ms: u64,
	#[serde(default = "default_bucket_capacity")]
	pub capacity: u32,
	#[serde(default = "default_refill_per_sec")]
	pub refill_per_sec: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fallback {
	pub enabled: bool,
	pub min_score: f32,
	pub max_score: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Upload {
	pub max_bytes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
	/// Optional JSON product seed. The built-in catalog is used when absent.
	pub path: Option<PathBuf>,
}

impl Default for Pacing {
	fn default() -> Self {
		Self {
			mode: "fixed".to_string(),
			batch_delay_ms: default_batch_delay_ms(),
			capacity: default_bucket_capacity(),
			refill_per_sec: default_refill_per_sec(),
		}
	}
}

impl Default for Fallback {
	fn default() -> Self {
		Self { enabled: true, min_score: 0.3, max_score: 0.8 }
	}
}

impl Default for Upload {
	fn default() -> Self {
		Self { max_bytes: 10 * 1_024 * 1_024 }
	}
}

fn default_max_tokens() -> u32 {
	500
}

fn default_batch_delay_ms() -> u64 {
	1_000
}

fn default_bucket_capacity() -> u32 {
	5
}

fn default_refill_per_sec() -> f64 {
	5.0
}
