use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use parking_lot::Mutex;
use serde_json::Map;

use snapmatch_config::{
	Catalog, Config, Fallback, Orchestrator, Pacing, ProviderConfig, Service, Upload,
};
use snapmatch_domain::{NewProduct, SimilarityVerdict};
use snapmatch_service::{
	BoxFuture, Candidate, Error, FixedDelay, Pacer, Result, SimilarityOracle, SnapService,
};
use snapmatch_storage::MemoryStore;

pub const SCRIPTED_DESCRIPTION: &str = "A scripted product description.";

/// A config pointing at an unreachable Gemini endpoint with no batch delay.
pub fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		provider: ProviderConfig {
			provider_id: "gemini".to_string(),
			api_base: "http://127.0.0.1:1/v1beta".to_string(),
			api_key: "test-key".to_string(),
			path: String::new(),
			model: "gemini-1.5-flash".to_string(),
			version: None,
			max_tokens: 500,
			timeout_ms: 1_000,
			default_headers: Map::new(),
		},
		orchestrator: Orchestrator {
			batch_size: 5,
			inclusion_threshold: 0.3,
			pacing: Pacing { batch_delay_ms: 0, ..Pacing::default() },
		},
		fallback: Fallback::default(),
		upload: Upload::default(),
		catalog: Catalog::default(),
	}
}

pub fn product(name: &str, category: &str, price: f64) -> NewProduct {
	NewProduct {
		name: name.to_string(),
		category: category.to_string(),
		price,
		image_url: format!("https://images.test/{}.jpg", name.to_lowercase().replace(' ', "-")),
		description: None,
		rating: None,
		brand: None,
		features: Vec::new(),
	}
}

/// Builds a service over an in-memory catalog with the given oracle and no pacing delay.
pub fn service_with(
	cfg: Config,
	products: Vec<NewProduct>,
	oracle: Arc<dyn SimilarityOracle>,
) -> SnapService {
	service_with_pacer(cfg, products, oracle, Arc::new(FixedDelay::new(Duration::ZERO)))
}

/// Like [`service_with`], also handing back the store so tests can inspect it.
pub fn service_with_store(
	cfg: Config,
	products: Vec<NewProduct>,
	oracle: Arc<dyn SimilarityOracle>,
) -> (SnapService, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::with_catalog(products));
	let service = SnapService::with_parts(
		cfg,
		store.clone(),
		oracle,
		Arc::new(FixedDelay::new(Duration::ZERO)),
	);

	(service, store)
}

pub fn service_with_pacer(
	cfg: Config,
	products: Vec<NewProduct>,
	oracle: Arc<dyn SimilarityOracle>,
	pacer: Arc<dyn Pacer>,
) -> SnapService {
	SnapService::with_parts(cfg, Arc::new(MemoryStore::with_catalog(products)), oracle, pacer)
}

/// Answers with a fixed score per product name and counts every call.
///
/// Names listed in `failing` produce a provider error instead.
#[derive(Default)]
pub struct ScriptedOracle {
	scores: HashMap<String, f32>,
	default_score: f32,
	failing: Vec<String>,
	latency: Duration,
	calls: AtomicUsize,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
}
impl ScriptedOracle {
	pub fn new<'a>(scores: impl IntoIterator<Item = (&'a str, f32)>) -> Self {
		Self {
			scores: scores.into_iter().map(|(name, score)| (name.to_string(), score)).collect(),
			..Self::default()
		}
	}

	pub fn with_default_score(mut self, score: f32) -> Self {
		self.default_score = score;

		self
	}

	pub fn failing_on(mut self, names: &[&str]) -> Self {
		self.failing = names.iter().map(ToString::to_string).collect();

		self
	}

	/// Every call sleeps this long before answering.
	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = latency;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Highest number of comparisons observed running at once.
	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::SeqCst)
	}
}
impl SimilarityOracle for ScriptedOracle {
	fn compare<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query_image: &'a str,
		candidate: Candidate<'a>,
	) -> BoxFuture<'a, Result<SimilarityVerdict>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;

			self.max_in_flight.fetch_max(running, Ordering::SeqCst);

			if !self.latency.is_zero() {
				tokio::time::sleep(self.latency).await;
			}

			self.in_flight.fetch_sub(1, Ordering::SeqCst);

			if self.failing.iter().any(|name| name == candidate.name) {
				return Err(Error::Provider {
					message: format!("Scripted failure for {}.", candidate.name),
				});
			}

			let score = self.scores.get(candidate.name).copied().unwrap_or(self.default_score);

			Ok(SimilarityVerdict::new(f64::from(score), "scripted", vec!["scripted".to_string()]))
		})
	}

	fn describe<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_image: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(SCRIPTED_DESCRIPTION.to_string())
		})
	}
}

/// Fails every call, as an unreachable provider would.
#[derive(Default)]
pub struct FailingOracle {
	calls: AtomicUsize,
}
impl FailingOracle {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl SimilarityOracle for FailingOracle {
	fn compare<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query_image: &'a str,
		_candidate: Candidate<'a>,
	) -> BoxFuture<'a, Result<SimilarityVerdict>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Err(Error::Provider { message: "Provider unavailable.".to_string() })
		})
	}

	fn describe<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_image: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Err(Error::Provider { message: "Provider unavailable.".to_string() })
		})
	}
}

/// Records every batch it is asked to release, without waiting.
#[derive(Default)]
pub struct RecordingPacer {
	batches: Mutex<Vec<(usize, usize)>>,
}
impl RecordingPacer {
	/// `(index, size)` for each batch, in dispatch order.
	pub fn batches(&self) -> Vec<(usize, usize)> {
		self.batches.lock().clone()
	}
}
impl Pacer for RecordingPacer {
	fn before_batch(&self, index: usize, size: usize) -> BoxFuture<'_, ()> {
		self.batches.lock().push((index, size));

		Box::pin(async {})
	}
}
