use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::{Error, Result};

const DEFAULT_MIME: &str = "image/jpeg";

/// A query or catalog image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef<'a> {
	/// Inline `data:<mime>;base64,<payload>` image.
	Inline { mime_type: &'a str, data: &'a str },
	/// Remote `http(s)` URL.
	Remote { url: &'a str },
}
impl<'a> ImageRef<'a> {
	pub fn parse(raw: &'a str) -> Result<Self> {
		let raw = raw.trim();

		if let Some(rest) = raw.strip_prefix("data:") {
			let (header, data) = rest.split_once(',').ok_or_else(|| Error::InvalidImageRef {
				message: "Data URL is missing a payload.".to_string(),
			})?;
			let Some(mime_type) = header.strip_suffix(";base64") else {
				return Err(Error::InvalidImageRef {
					message: "Data URL must be base64 encoded.".to_string(),
				});
			};
			let mime_type = if mime_type.is_empty() { DEFAULT_MIME } else { mime_type };

			if !mime_type.starts_with("image/") {
				return Err(Error::InvalidImageRef {
					message: format!("Data URL mime type {mime_type} is not an image."),
				});
			}
			if data.is_empty() {
				return Err(Error::InvalidImageRef {
					message: "Data URL payload is empty.".to_string(),
				});
			}

			return Ok(Self::Inline { mime_type, data });
		}
		if raw.starts_with("http://") || raw.starts_with("https://") {
			return Ok(Self::Remote { url: raw });
		}

		Err(Error::InvalidImageRef {
			message: "Image reference must be a data URL or an http(s) URL.".to_string(),
		})
	}
}

/// Encodes raw image bytes as a `data:` URL.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
	format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

pub fn encode_base64(bytes: &[u8]) -> String {
	STANDARD.encode(bytes)
}
