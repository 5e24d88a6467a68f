pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<snapmatch_storage::Error> for Error {
	fn from(err: snapmatch_storage::Error) -> Self {
		match err {
			snapmatch_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			snapmatch_storage::Error::NotFound(message) => Self::NotFound { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<snapmatch_providers::Error> for Error {
	fn from(err: snapmatch_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<snapmatch_domain::Error> for Error {
	fn from(err: snapmatch_domain::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
