pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Test database setup failed: {0}")]
	Setup(String),
	#[error("Test database cleanup failed: {0}")]
	Cleanup(String),
}
