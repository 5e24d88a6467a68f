use std::{fs, path::Path};

use snapmatch_domain::NewProduct;

use crate::{Error, Result};

const BUILTIN_CATALOG_JSON: &str = include_str!("../catalog/products.json");

/// Loads the product seed named by `cfg`, or the built-in catalog when no path is set.
pub fn load(cfg: &snapmatch_config::Catalog) -> Result<Vec<NewProduct>> {
	match cfg.path.as_deref() {
		Some(path) => load_file(path),
		None => builtin(),
	}
}

pub fn builtin() -> Result<Vec<NewProduct>> {
	parse(BUILTIN_CATALOG_JSON)
}

pub fn load_file(path: &Path) -> Result<Vec<NewProduct>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadCatalog { path: path.to_path_buf(), source: err })?;

	parse(&raw)
}

pub fn parse(raw: &str) -> Result<Vec<NewProduct>> {
	let products: Vec<NewProduct> = serde_json::from_str(raw)?;

	for (index, product) in products.iter().enumerate() {
		validate(index, product)?;
	}

	Ok(products)
}

fn validate(index: usize, product: &NewProduct) -> Result<()> {
	for (label, value) in [
		("name", &product.name),
		("category", &product.category),
		("imageUrl", &product.image_url),
	] {
		if value.trim().is_empty() {
			return Err(Error::InvalidArgument(format!("Catalog entry {index} has an empty {label}.")));
		}
	}

	if !product.price.is_finite() || product.price < 0.0 {
		return Err(Error::InvalidArgument(format!(
			"Catalog entry {index} ({}) must have a non-negative price.",
			product.name
		)));
	}
	if let Some(rating) = product.rating
		&& !(0.0..=5.0).contains(&rating)
	{
		return Err(Error::InvalidArgument(format!(
			"Catalog entry {index} ({}) must have a rating between 0 and 5.",
			product.name
		)));
	}

	Ok(())
}
