use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A catalog entry. Immutable once the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
	pub id: Uuid,
	pub name: String,
	/// Hierarchical label such as `Electronics > Audio`.
	pub category: String,
	pub price: f64,
	pub image_url: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub rating: Option<f32>,
	#[serde(default)]
	pub brand: Option<String>,
	#[serde(default)]
	pub features: Vec<String>,
}

/// Catalog entry without an id, as read from a seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
	pub name: String,
	pub category: String,
	pub price: f64,
	pub image_url: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub rating: Option<f32>,
	#[serde(default)]
	pub brand: Option<String>,
	#[serde(default)]
	pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSession {
	pub id: Uuid,
	/// Either a `data:` URL or a remote `http(s)` URL.
	pub image_url: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityResult {
	pub id: Uuid,
	pub search_id: Uuid,
	pub product_id: Uuid,
	pub score: f32,
	/// Set when the score was substituted after an oracle failure.
	pub fallback: bool,
}

/// A product joined with its similarity score for one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMatch {
	#[serde(flatten)]
	pub product: Product,
	pub similarity_score: f32,
	pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
	pub name: String,
	pub count: usize,
}

impl NewProduct {
	pub fn into_product(self, id: Uuid) -> Product {
		Product {
			id,
			name: self.name,
			category: self.category,
			price: self.price,
			image_url: self.image_url,
			description: self.description,
			rating: self.rating,
			brand: self.brand,
			features: self.features,
		}
	}
}

impl ProductMatch {
	pub fn new(product: Product, result: &SimilarityResult) -> Self {
		Self { product, similarity_score: result.score, fallback: result.fallback }
	}
}

/// Counts products per category, in order of first appearance.
pub fn count_categories(products: &[Product]) -> Vec<CategoryCount> {
	let mut counts: Vec<CategoryCount> = Vec::new();

	for product in products {
		match counts.iter_mut().find(|entry| entry.name == product.category) {
			Some(entry) => entry.count += 1,
			None => counts.push(CategoryCount { name: product.category.clone(), count: 1 }),
		}
	}

	counts
}
