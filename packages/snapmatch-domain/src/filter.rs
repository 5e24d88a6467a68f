use serde::{Deserialize, Serialize};

use crate::model::ProductMatch;

/// Query-time predicates. Every supplied predicate must hold for a match to be kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
	pub min_similarity: Option<f32>,
	pub max_similarity: Option<f32>,
	/// Exact category labels. Empty means any category.
	#[serde(default)]
	pub categories: Vec<String>,
	pub min_price: Option<f64>,
	pub max_price: Option<f64>,
}
impl SearchFilters {
	pub fn is_empty(&self) -> bool {
		self.min_similarity.is_none()
			&& self.max_similarity.is_none()
			&& self.categories.is_empty()
			&& self.min_price.is_none()
			&& self.max_price.is_none()
	}

	pub fn matches(&self, item: &ProductMatch) -> bool {
		if let Some(min) = self.min_similarity
			&& item.similarity_score < min
		{
			return false;
		}
		if let Some(max) = self.max_similarity
			&& item.similarity_score > max
		{
			return false;
		}
		if !self.categories.is_empty()
			&& !self.categories.iter().any(|category| category == &item.product.category)
		{
			return false;
		}
		if let Some(min) = self.min_price
			&& item.product.price < min
		{
			return false;
		}
		if let Some(max) = self.max_price
			&& item.product.price > max
		{
			return false;
		}

		true
	}
}

/// Drops matches failing `filters`, then orders by descending score.
///
/// The sort is stable, so equal scores keep the order in which results were stored.
pub fn rank(matches: Vec<ProductMatch>, filters: &SearchFilters) -> Vec<ProductMatch> {
	let mut kept: Vec<ProductMatch> = if filters.is_empty() {
		matches
	} else {
		matches.into_iter().filter(|item| filters.matches(item)).collect()
	};

	kept.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));

	kept
}

/// Splits a comma-separated category list, dropping blank entries.
pub fn parse_categories(raw: &str) -> Vec<String> {
	raw.split(',')
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(ToString::to_string)
		.collect()
}
