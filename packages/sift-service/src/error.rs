pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced to callers of the engine.
///
/// An item that is not Ready yet is never an error; searches simply leave it out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("Invalid query: {message}")]
	InvalidQuery { message: String },
	#[error("Invalid vector: {message}")]
	InvalidVector { message: String },
	#[error("Invalid weight: {message}")]
	InvalidWeight { message: String },
	#[error("Unauthorized access: {message}")]
	UnauthorizedAccess { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Index partition for owner {owner_id:?} is corrupted: {message}")]
	IndexCorruption { owner_id: String, message: String },
	#[error("Service unavailable: {message}")]
	ServiceUnavailable { message: String },
	#[error("Search timed out after {timeout_ms} ms.")]
	Timeout { timeout_ms: u64 },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl Error {
	pub(crate) fn unauthorized(owner_id: &str, item_id: uuid::Uuid) -> Self {
		Self::UnauthorizedAccess {
			message: format!("Item {item_id} does not belong to owner {owner_id:?}."),
		}
	}
}

impl From<sift_index::Error> for Error {
	fn from(err: sift_index::Error) -> Self {
		match err {
			sift_index::Error::InvalidVector { message } => Self::InvalidVector { message },
			sift_index::Error::IndexCorruption { owner_id, message } =>
				Self::IndexCorruption { owner_id, message },
		}
	}
}

impl From<sift_domain::QueryError> for Error {
	fn from(err: sift_domain::QueryError) -> Self {
		Self::InvalidQuery { message: err.to_string() }
	}
}

impl From<sift_domain::WeightError> for Error {
	fn from(err: sift_domain::WeightError) -> Self {
		Self::InvalidWeight { message: err.to_string() }
	}
}

impl From<sift_domain::VectorError> for Error {
	fn from(err: sift_domain::VectorError) -> Self {
		Self::InvalidVector { message: err.to_string() }
	}
}
