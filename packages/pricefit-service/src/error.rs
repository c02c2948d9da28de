pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Store error: {message}")]
	Store { message: String },
	#[error("Embedding dimension mismatch: expected {expected}, found {actual}.")]
	DimensionMismatch { expected: u64, actual: u64 },
}
impl From<pricefit_storage::Error> for Error {
	fn from(err: pricefit_storage::Error) -> Self {
		match err {
			pricefit_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			pricefit_storage::Error::DimensionMismatch { expected, actual } =>
				Self::DimensionMismatch { expected, actual },
			pricefit_storage::Error::Qdrant(inner) => Self::Store { message: inner.to_string() },
			pricefit_storage::Error::Unavailable(message) => Self::Store { message },
		}
	}
}

impl From<pricefit_providers::Error> for Error {
	fn from(err: pricefit_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
