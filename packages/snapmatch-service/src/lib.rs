pub mod analyze;
pub mod catalog;
pub mod orchestrator;
pub mod pacing;
pub mod search;

mod error;

pub use analyze::{AnalyzeImageRequest, AnalyzeImageResponse};
pub use error::{Error, Result};
pub use orchestrator::{ComputeReport, ComputeState};
pub use pacing::{FixedDelay, Pacer, TokenBucket};
pub use search::{SearchCreated, SearchRequest, SearchResultsResponse, UploadedImage};
pub use snapmatch_providers::Candidate;

use std::{future::Future, pin::Pin, sync::Arc};

use snapmatch_config::{Config, ProviderConfig};
use snapmatch_domain::SimilarityVerdict;
use snapmatch_storage::{MemoryStore, Store};

use crate::orchestrator::SessionGates;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote capability that scores a query image against one catalog product.
pub trait SimilarityOracle
where
	Self: Send + Sync,
{
	fn compare<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query_image: &'a str,
		candidate: Candidate<'a>,
	) -> BoxFuture<'a, Result<SimilarityVerdict>>;

	fn describe<'a>(&'a self, cfg: &'a ProviderConfig, image: &'a str)
	-> BoxFuture<'a, Result<String>>;
}

pub struct SnapService {
	pub cfg: Config,
	pub store: Arc<dyn Store>,
	pub oracle: Arc<dyn SimilarityOracle>,
	pub pacer: Arc<dyn Pacer>,
	gates: SessionGates,
}

struct HttpOracle;

impl SimilarityOracle for HttpOracle {
	fn compare<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query_image: &'a str,
		candidate: Candidate<'a>,
	) -> BoxFuture<'a, Result<SimilarityVerdict>> {
		Box::pin(async move { Ok(snapmatch_providers::compare(cfg, query_image, candidate).await?) })
	}

	fn describe<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		image: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(snapmatch_providers::describe(cfg, image).await?) })
	}
}

impl SnapService {
	/// Builds a service over the configured catalog, talking to the configured provider.
	pub fn from_config(cfg: Config) -> Result<Self> {
		let products = snapmatch_storage::catalog::load(&cfg.catalog)?;
		let store = Arc::new(MemoryStore::with_catalog(products));

		Ok(Self::new(cfg, store))
	}

	pub fn new(cfg: Config, store: Arc<dyn Store>) -> Self {
		Self::with_oracle(cfg, store, Arc::new(HttpOracle))
	}

	pub fn with_oracle(cfg: Config, store: Arc<dyn Store>, oracle: Arc<dyn SimilarityOracle>) -> Self {
		let pacer = pacing::from_config(&cfg.orchestrator.pacing);

		Self::with_parts(cfg, store, oracle, pacer)
	}

	pub fn with_parts(
		cfg: Config,
		store: Arc<dyn Store>,
		oracle: Arc<dyn SimilarityOracle>,
		pacer: Arc<dyn Pacer>,
	) -> Self {
		Self { cfg, store, oracle, pacer, gates: SessionGates::default() }
	}
}
