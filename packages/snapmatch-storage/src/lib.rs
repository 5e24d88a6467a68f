pub mod catalog;
pub mod memory;

mod error;

pub use error::Error;
pub use memory::MemoryStore;

use std::{future::Future, pin::Pin};

use uuid::Uuid;

use snapmatch_domain::{Product, SearchSession, SimilarityResult};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq)]
pub struct NewSimilarityResult {
	pub search_id: Uuid,
	pub product_id: Uuid,
	pub score: f32,
	pub fallback: bool,
}

/// Persistence for the catalog, search sessions and their similarity results.
///
/// Implementations must keep `list_products` and `list_results` in insertion order; ranking
/// relies on it to break score ties.
pub trait Store
where
	Self: Send + Sync,
{
	fn list_products(&self) -> BoxFuture<'_, Result<Vec<Product>>>;

	fn get_product(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Product>>>;

	fn create_search(&self, image_url: String) -> BoxFuture<'_, Result<SearchSession>>;

	fn get_search(&self, id: Uuid) -> BoxFuture<'_, Result<Option<SearchSession>>>;

	/// Stores every result or none of them, keeping the given order.
	///
	/// Fails with [`Error::Conflict`] when a pair already has a result or appears twice.
	fn create_results(
		&self,
		results: Vec<NewSimilarityResult>,
	) -> BoxFuture<'_, Result<Vec<SimilarityResult>>>;

	fn list_results(&self, search_id: Uuid) -> BoxFuture<'_, Result<Vec<SimilarityResult>>>;
}
