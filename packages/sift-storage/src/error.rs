pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Store unavailable: {0}")]
	Unavailable(String),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Failed to decode stored row: {0}")]
	Decode(String),
}
impl Error {
	/// Whether retrying the same call could succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Sqlx(err) => matches!(
				err,
				sqlx::Error::Io(_)
					| sqlx::Error::PoolTimedOut
					| sqlx::Error::PoolClosed
					| sqlx::Error::WorkerCrashed
					| sqlx::Error::Tls(_)
			),
			Self::Unavailable(_) => true,
			Self::InvalidArgument(_) | Self::Decode(_) => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_transient_failures() {
		assert!(Error::Unavailable("connection refused".to_string()).is_transient());
		assert!(Error::Sqlx(sqlx::Error::PoolTimedOut).is_transient());
		assert!(!Error::Sqlx(sqlx::Error::RowNotFound).is_transient());
		assert!(!Error::Decode("bad status".to_string()).is_transient());
	}
}
