pub const DESCRIBE_PROMPT: &str = "Analyze this image and describe what product or object it shows. Be specific about the type, color, style, and key visual features. Keep it concise but detailed.";

pub const DESCRIBE_UNAVAILABLE: &str = "Image analysis unavailable";

/// Instructions for scoring the query image against one catalog product.
pub fn comparison(name: &str, category: &str) -> String {
	format!(
		"\
Compare these two images for visual similarity.

Image 1: User uploaded image
Image 2: Product image ({name} - {category})

Analyze:
1. Overall visual similarity (shape, color, style, type of object)
2. Specific visual features that match or differ
3. Whether they represent similar types of products

Respond with JSON in this exact format:
{{
  \"similarityScore\": 0.85,
  \"reasoning\": \"Brief explanation of why they are or aren't similar\",
  \"visualFeatures\": [\"color match\", \"similar shape\", \"same product type\"]
}}

Score from 0.0 to 1.0 where:
- 0.9-1.0: Nearly identical or same product type with very similar features
- 0.7-0.9: Similar product type with matching visual characteristics
- 0.5-0.7: Some visual similarities but different product types
- 0.3-0.5: Few visual similarities
- 0.0-0.3: Very different or unrelated objects"
	)
}
