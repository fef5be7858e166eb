use std::{future::Future, time::Duration};

use crate::{Error, Result};

/// Bounded exponential backoff for store calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}
impl RetryPolicy {
	/// Delay before retrying after failed attempt number `attempt` (1-based).
	pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(16);
		let base = self.base_backoff_ms.saturating_mul(1 << exp);

		Duration::from_millis(base.min(self.max_backoff_ms))
	}

	/// Runs `call` until it succeeds, fails permanently, or runs out of attempts.
	///
	/// Transient failures that survive every attempt become `ServiceUnavailable`. Permanent
	/// failures are returned after the first attempt as `Storage`.
	pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = sift_storage::Result<T>>,
	{
		let max_attempts = self.max_attempts.max(1);
		let mut attempt = 0;

		loop {
			attempt += 1;

			let err = match call().await {
				Ok(value) => return Ok(value),
				Err(err) => err,
			};

			if !err.is_transient() {
				return Err(Error::Storage { message: format!("{operation}: {err}") });
			}
			if attempt >= max_attempts {
				tracing::error!(
					operation,
					attempt,
					error = %err,
					"Store call exhausted its retries."
				);

				return Err(Error::ServiceUnavailable {
					message: format!("{operation} failed after {attempt} attempts: {err}"),
				});
			}

			let backoff = self.backoff_for_attempt(attempt);

			tracing::warn!(
				operation,
				attempt,
				backoff_ms = backoff.as_millis() as u64,
				error = %err,
				"Store call failed. Retrying."
			);

			tokio::time::sleep(backoff).await;
		}
	}
}
impl From<&sift_config::Retry> for RetryPolicy {
	fn from(cfg: &sift_config::Retry) -> Self {
		Self {
			max_attempts: cfg.max_attempts,
			base_backoff_ms: cfg.base_backoff_ms,
			max_backoff_ms: cfg.max_backoff_ms,
		}
	}
}
