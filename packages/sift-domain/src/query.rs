use crate::vector::{self, VectorError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
	#[error("Query vector is invalid: {0}")]
	Vector(#[from] VectorError),
	#[error("Threshold {0} is outside the range -1.0-1.0.")]
	Threshold(f32),
	#[error("Limit must be greater than zero.")]
	Limit,
	#[error("Owner id must be non-empty.")]
	Owner,
}

/// Checks a search request before it may touch the index.
///
/// A zero query vector is well formed; it simply matches nothing.
pub fn validate_query(
	owner_id: &str,
	vector: &[f32],
	threshold: f32,
	limit: u32,
	expected_dim: usize,
) -> Result<(), QueryError> {
	if owner_id.trim().is_empty() {
		return Err(QueryError::Owner);
	}

	vector::validate_vector(vector, expected_dim)?;

	if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
		return Err(QueryError::Threshold(threshold));
	}
	if limit == 0 {
		return Err(QueryError::Limit);
	}

	Ok(())
}
