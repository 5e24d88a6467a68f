use crate::{Result, SnapService};
use snapmatch_domain::{CategoryCount, Product, count_categories};

impl SnapService {
	pub async fn products(&self) -> Result<Vec<Product>> {
		Ok(self.store.list_products().await?)
	}

	/// Distinct catalog categories with product counts, in first-seen order.
	pub async fn categories(&self) -> Result<Vec<CategoryCount>> {
		let products = self.store.list_products().await?;

		Ok(count_categories(&products))
	}
}
