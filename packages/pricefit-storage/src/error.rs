#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Vector dimension mismatch: expected {expected}, found {actual}.")]
	DimensionMismatch { expected: u64, actual: u64 },
	#[error("Store unavailable: {0}")]
	Unavailable(String),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
