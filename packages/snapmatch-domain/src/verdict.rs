use rand::Rng;
use serde::{Deserialize, Serialize};

pub const FALLBACK_REASONING: &str = "AI analysis unavailable, using fallback similarity";
pub const FALLBACK_FEATURE: &str = "fallback analysis";
pub const MISSING_REASONING: &str = "Unable to analyze similarity";

/// Outcome of comparing a query image against one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityVerdict {
	/// Always within `[0, 1]`.
	pub score: f32,
	pub reasoning: String,
	pub features: Vec<String>,
	pub fallback: bool,
}
impl SimilarityVerdict {
	pub fn new(score: f64, reasoning: impl Into<String>, features: Vec<String>) -> Self {
		Self { score: clamp_score(score), reasoning: reasoning.into(), features, fallback: false }
	}

	/// A pseudo-random verdict in `[min_score, max_score)`, flagged as a fallback.
	pub fn fallback<R>(rng: &mut R, min_score: f32, max_score: f32) -> Self
	where
		R: Rng,
	{
		let score = if min_score < max_score { rng.gen_range(min_score..max_score) } else { min_score };

		Self {
			score: clamp_score(f64::from(score)),
			reasoning: FALLBACK_REASONING.to_string(),
			features: vec![FALLBACK_FEATURE.to_string()],
			fallback: true,
		}
	}
}

pub fn clamp_score(score: f64) -> f32 {
	if score.is_nan() {
		return 0.0;
	}

	score.clamp(0.0, 1.0) as f32
}
