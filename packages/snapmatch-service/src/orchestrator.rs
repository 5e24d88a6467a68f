use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::{Candidate, Result, SnapService};
use snapmatch_domain::{Product, SearchSession, SimilarityVerdict};
use snapmatch_storage::NewSimilarityResult;

/// Lifecycle of the similarity pass for one search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeState {
	Uninitialized,
	Computing,
	/// Terminal, even when no product cleared the threshold.
	Ready,
}

/// Counters for one completed similarity pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeReport {
	pub evaluated: usize,
	pub stored: usize,
	pub fallbacks: usize,
	pub failures: usize,
}

#[derive(Default)]
pub(crate) struct SessionGates {
	gates: Mutex<HashMap<Uuid, Arc<SessionGate>>>,
}
impl SessionGates {
	fn gate(&self, search_id: Uuid) -> Arc<SessionGate> {
		self.gates.lock().entry(search_id).or_default().clone()
	}

	fn state(&self, search_id: Uuid) -> ComputeState {
		self.gates
			.lock()
			.get(&search_id)
			.map(|gate| *gate.state.lock())
			.unwrap_or(ComputeState::Uninitialized)
	}
}

struct SessionGate {
	run: tokio::sync::Mutex<()>,
	state: Mutex<ComputeState>,
}
impl Default for SessionGate {
	fn default() -> Self {
		Self { run: tokio::sync::Mutex::new(()), state: Mutex::new(ComputeState::Uninitialized) }
	}
}

enum Assessment {
	Scored(SimilarityVerdict),
	Fallback(SimilarityVerdict),
	Excluded,
}

impl SnapService {
	pub fn compute_state(&self, search_id: Uuid) -> ComputeState {
		self.gates.state(search_id)
	}

	/// Runs the similarity pass for `session` unless it already ran.
	///
	/// Concurrent callers for the same session wait on one pass. A failed pass returns the
	/// session to [`ComputeState::Uninitialized`] so a later read retries it.
	pub async fn ensure_computed(&self, session: &SearchSession) -> Result<Option<ComputeReport>> {
		let gate = self.gates.gate(session.id);
		let _running = gate.run.lock().await;

		if *gate.state.lock() == ComputeState::Ready {
			return Ok(None);
		}
		if !self.store.list_results(session.id).await?.is_empty() {
			*gate.state.lock() = ComputeState::Ready;

			return Ok(None);
		}

		*gate.state.lock() = ComputeState::Computing;

		match self.compute_similarities(session).await {
			Ok(report) => {
				*gate.state.lock() = ComputeState::Ready;

				Ok(Some(report))
			},
			Err(err) => {
				*gate.state.lock() = ComputeState::Uninitialized;

				Err(err)
			},
		}
	}

	/// Scores every catalog product against the session image in paced batches, then stores the
	/// results above the inclusion threshold in a single write.
	pub(crate) async fn compute_similarities(&self, session: &SearchSession) -> Result<ComputeReport> {
		let products = self.store.list_products().await?;
		let batch_size = self.cfg.orchestrator.batch_size.max(1) as usize;
		let threshold = self.cfg.orchestrator.inclusion_threshold;
		let mut report = ComputeReport::default();
		let mut kept = Vec::new();

		tracing::info!(
			search_id = %session.id,
			products = products.len(),
			batch_size,
			"Computing similarities."
		);

		for (index, batch) in products.chunks(batch_size).enumerate() {
			self.pacer.before_batch(index, batch.len()).await;

			let assessments = futures::future::join_all(
				batch.iter().map(|product| self.assess(session, product)),
			)
			.await;

			for (product, assessment) in batch.iter().zip(assessments) {
				report.evaluated += 1;

				let verdict = match assessment {
					Assessment::Scored(verdict) => verdict,
					Assessment::Fallback(verdict) => {
						report.failures += 1;
						report.fallbacks += 1;

						verdict
					},
					Assessment::Excluded => {
						report.failures += 1;

						continue;
					},
				};

				if verdict.score <= threshold {
					continue;
				}

				kept.push(NewSimilarityResult {
					search_id: session.id,
					product_id: product.id,
					score: verdict.score,
					fallback: verdict.fallback,
				});
			}

			tracing::debug!(search_id = %session.id, batch = index, "Similarity batch finished.");
		}

		report.stored = self.store.create_results(kept).await?.len();

		tracing::info!(
			search_id = %session.id,
			evaluated = report.evaluated,
			stored = report.stored,
			fallbacks = report.fallbacks,
			failures = report.failures,
			"Similarity computation finished."
		);

		Ok(report)
	}

	async fn assess(&self, session: &SearchSession, product: &Product) -> Assessment {
		let candidate = Candidate {
			image_url: &product.image_url,
			name: &product.name,
			category: &product.category,
		};

		match self.oracle.compare(&self.cfg.provider, &session.image_url, candidate).await {
			Ok(verdict) => Assessment::Scored(verdict),
			Err(err) => {
				tracing::warn!(
					search_id = %session.id,
					product_id = %product.id,
					error = %err,
					"Similarity oracle failed for product."
				);

				let fallback = &self.cfg.fallback;

				if !fallback.enabled {
					return Assessment::Excluded;
				}

				let verdict = SimilarityVerdict::fallback(
					&mut rand::thread_rng(),
					fallback.min_score,
					fallback.max_score,
				);

				Assessment::Fallback(verdict)
			},
		}
	}
}
