mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Catalog, Config, Fallback, Orchestrator, Pacing, ProviderConfig, Service, Upload,
};

use std::{fs, net::SocketAddr, path::Path};

pub const PROVIDER_GEMINI: &str = "gemini";
pub const PROVIDER_REPLICATE: &str = "replicate";
/// Slowest accepted token-bucket refill, one token every 100 seconds.
pub const MIN_REFILL_PER_SEC: f64 = 0.01;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.parse::<SocketAddr>().is_err() {
		return Err(Error::Validation {
			message: "service.http_bind must be a socket address such as 127.0.0.1:8080."
				.to_string(),
		});
	}
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if !matches!(cfg.provider.provider_id.as_str(), PROVIDER_GEMINI | PROVIDER_REPLICATE) {
		return Err(Error::UnsupportedProvider { provider_id: cfg.provider.provider_id.clone() });
	}
	if cfg.provider.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "provider.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.provider.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "provider.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.provider.model.trim().is_empty() {
		return Err(Error::Validation { message: "provider.model must be non-empty.".to_string() });
	}
	if cfg.provider.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "provider.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.provider.max_tokens == 0 {
		return Err(Error::Validation {
			message: "provider.max_tokens must be greater than zero.".to_string(),
		});
	}
	if cfg.orchestrator.batch_size == 0 {
		return Err(Error::Validation {
			message: "orchestrator.batch_size must be greater than zero.".to_string(),
		});
	}

	let threshold = cfg.orchestrator.inclusion_threshold;

	if !threshold.is_finite() || !(0.0..1.0).contains(&threshold) {
		return Err(Error::Validation {
			message: "orchestrator.inclusion_threshold must be in the range 0.0-1.0 (exclusive)."
				.to_string(),
		});
	}

	validate_pacing(&cfg.orchestrator.pacing)?;

	if cfg.fallback.enabled {
		let Fallback { min_score, max_score, .. } = cfg.fallback;

		if !min_score.is_finite() || !max_score.is_finite() {
			return Err(Error::Validation {
				message: "fallback scores must be finite numbers.".to_string(),
			});
		}
		if !(0.0..=1.0).contains(&min_score) || !(0.0..=1.0).contains(&max_score) {
			return Err(Error::Validation {
				message: "fallback scores must be in the range 0.0-1.0.".to_string(),
			});
		}
		if min_score >= max_score {
			return Err(Error::Validation {
				message: "fallback.min_score must be less than fallback.max_score.".to_string(),
			});
		}
	}
	if cfg.upload.max_bytes == 0 {
		return Err(Error::Validation {
			message: "upload.max_bytes must be greater than zero.".to_string(),
		});
	}

	for (key, value) in &cfg.provider.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("provider.default_headers.{key} must be a string."),
			});
		}
	}

	Ok(())
}

fn validate_pacing(pacing: &Pacing) -> Result<()> {
	match pacing.mode.as_str() {
		"fixed" => Ok(()),
		"token_bucket" => {
			if pacing.capacity == 0 {
				return Err(Error::Validation {
					message: "orchestrator.pacing.capacity must be greater than zero.".to_string(),
				});
			}
			if !pacing.refill_per_sec.is_finite() || pacing.refill_per_sec < MIN_REFILL_PER_SEC {
				return Err(Error::Validation {
					message: format!(
						"orchestrator.pacing.refill_per_sec must be at least {MIN_REFILL_PER_SEC}."
					),
				});
			}

			Ok(())
		},
		_ => Err(Error::Validation {
			message: "orchestrator.pacing.mode must be one of fixed or token_bucket.".to_string(),
		}),
	}
}

fn normalize(cfg: &mut Config) {
	cfg.provider.provider_id = cfg.provider.provider_id.trim().to_ascii_lowercase();
	cfg.provider.api_base = cfg.provider.api_base.trim_end_matches('/').to_string();

	if cfg.provider.version.as_deref().map(|version| version.trim().is_empty()).unwrap_or(false) {
		cfg.provider.version = None;
	}
	if cfg
		.catalog
		.path
		.as_deref()
		.map(|path| path.as_os_str().to_string_lossy().trim().is_empty())
		.unwrap_or(false)
	{
		cfg.catalog.path = None;
	}
}
