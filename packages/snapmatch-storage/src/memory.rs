use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;

use snapmatch_domain::{NewProduct, Product, SearchSession, SimilarityResult};

use crate::{BoxFuture, Error, NewSimilarityResult, Result, Store};

/// Process-local store. Everything is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
	inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
	products: Vec<Product>,
	product_index: HashMap<Uuid, usize>,
	searches: HashMap<Uuid, SearchSession>,
	results: HashMap<Uuid, Vec<SimilarityResult>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_catalog(products: Vec<NewProduct>) -> Self {
		let store = Self::new();

		{
			let mut inner = store.inner.write();

			for product in products {
				inner.insert_product(product);
			}
		}

		store
	}

	pub fn search_count(&self) -> usize {
		self.inner.read().searches.len()
	}
}

impl Inner {
	fn insert_product(&mut self, product: NewProduct) -> Product {
		let product = product.into_product(Uuid::new_v4());

		self.product_index.insert(product.id, self.products.len());
		self.products.push(product.clone());

		product
	}
}

impl Store for MemoryStore {
	fn list_products(&self) -> BoxFuture<'_, Result<Vec<Product>>> {
		let products = self.inner.read().products.clone();

		Box::pin(async move { Ok(products) })
	}

	fn get_product(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Product>>> {
		let product = {
			let inner = self.inner.read();

			inner.product_index.get(&id).map(|&index| inner.products[index].clone())
		};

		Box::pin(async move { Ok(product) })
	}

	fn create_search(&self, image_url: String) -> BoxFuture<'_, Result<SearchSession>> {
		let session =
			SearchSession { id: Uuid::new_v4(), image_url, created_at: OffsetDateTime::now_utc() };

		self.inner.write().searches.insert(session.id, session.clone());

		Box::pin(async move { Ok(session) })
	}

	fn get_search(&self, id: Uuid) -> BoxFuture<'_, Result<Option<SearchSession>>> {
		let session = self.inner.read().searches.get(&id).cloned();

		Box::pin(async move { Ok(session) })
	}

	fn create_results(
		&self,
		results: Vec<NewSimilarityResult>,
	) -> BoxFuture<'_, Result<Vec<SimilarityResult>>> {
		let created = insert_results(&mut self.inner.write(), results);

		Box::pin(async move { created })
	}

	fn list_results(&self, search_id: Uuid) -> BoxFuture<'_, Result<Vec<SimilarityResult>>> {
		let results = self.inner.read().results.get(&search_id).cloned().unwrap_or_default();

		Box::pin(async move { Ok(results) })
	}
}

fn insert_results(
	inner: &mut Inner,
	results: Vec<NewSimilarityResult>,
) -> Result<Vec<SimilarityResult>> {
	let mut seen = HashSet::with_capacity(results.len());

	for result in &results {
		check_result(inner, result)?;

		if !seen.insert((result.search_id, result.product_id)) {
			return Err(Error::Conflict(format!(
				"Product {} appears twice for search {}.",
				result.product_id, result.search_id
			)));
		}
	}

	let created: Vec<SimilarityResult> = results
		.into_iter()
		.map(|result| SimilarityResult {
			id: Uuid::new_v4(),
			search_id: result.search_id,
			product_id: result.product_id,
			score: result.score,
			fallback: result.fallback,
		})
		.collect();

	for result in &created {
		inner.results.entry(result.search_id).or_default().push(result.clone());
	}

	Ok(created)
}

fn check_result(inner: &Inner, result: &NewSimilarityResult) -> Result<()> {
	if !inner.searches.contains_key(&result.search_id) {
		return Err(Error::NotFound(format!("Search {} does not exist.", result.search_id)));
	}
	if !inner.product_index.contains_key(&result.product_id) {
		return Err(Error::NotFound(format!("Product {} does not exist.", result.product_id)));
	}
	if !(0.0..=1.0).contains(&result.score) {
		return Err(Error::InvalidArgument(format!(
			"Similarity score {} is outside 0.0-1.0.",
			result.score
		)));
	}

	let exists = inner.results.get(&result.search_id).is_some_and(|stored| {
		stored.iter().any(|existing| existing.product_id == result.product_id)
	});

	if exists {
		return Err(Error::Conflict(format!(
			"Search {} already has a result for product {}.",
			result.search_id, result.product_id
		)));
	}

	Ok(())
}
