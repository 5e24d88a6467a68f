pub mod filter;
pub mod image;
pub mod model;
pub mod verdict;

mod error;

pub use error::{Error, Result};
pub use filter::SearchFilters;
pub use image::ImageRef;
pub use model::{
	CategoryCount, NewProduct, Product, ProductMatch, SearchSession, SimilarityResult,
	count_categories,
};
pub use verdict::SimilarityVerdict;
