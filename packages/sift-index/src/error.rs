pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the embedding index.
///
/// Approximate retrieval may miss some of the exact top matches once a partition is clustered.
/// That recall loss is expected behaviour and is never reported as an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("Invalid vector: {message}")]
	InvalidVector { message: String },
	#[error("Index partition for owner {owner_id:?} is corrupted: {message}")]
	IndexCorruption { owner_id: String, message: String },
}
