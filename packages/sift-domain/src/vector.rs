#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VectorError {
	#[error("Vector has {actual} dimensions; expected {expected}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Vector contains a non-finite value at position {position}.")]
	NonFinite { position: usize },
}

pub fn validate_vector(vector: &[f32], expected_dim: usize) -> Result<(), VectorError> {
	if vector.len() != expected_dim {
		return Err(VectorError::DimensionMismatch { expected: expected_dim, actual: vector.len() });
	}
	if let Some(position) = vector.iter().position(|value| !value.is_finite()) {
		return Err(VectorError::NonFinite { position });
	}

	Ok(())
}

/// True when the vector has no usable direction: its norm, accumulated in `f64` the same way the
/// index scores vectors, is zero or not finite.
pub fn is_degenerate(vector: &[f32]) -> bool {
	let norm = vector.iter().map(|value| f64::from(*value).powi(2)).sum::<f64>().sqrt();

	norm == 0.0 || !norm.is_finite()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_wrong_dimension() {
		assert_eq!(
			validate_vector(&[1.0, 2.0], 3),
			Err(VectorError::DimensionMismatch { expected: 3, actual: 2 })
		);
	}

	#[test]
	fn rejects_nan() {
		assert_eq!(
			validate_vector(&[1.0, f32::NAN, 0.0], 3),
			Err(VectorError::NonFinite { position: 1 })
		);
	}

	#[test]
	fn zero_vector_is_degenerate() {
		assert!(is_degenerate(&[0.0, 0.0]));
		assert!(is_degenerate(&[0.0, -0.0]));
		assert!(!is_degenerate(&[0.0, 1e-9]));
	}

	#[test]
	fn extreme_but_finite_vectors_keep_a_direction() {
		assert!(!is_degenerate(&[1e-23, 1e-23]));
		assert!(!is_degenerate(&[1e-45, 0.0]));
		assert!(!is_degenerate(&[f32::MAX, f32::MAX]));
		assert!(!is_degenerate(&[1e20, -1e20]));
		assert!(is_degenerate(&[f32::INFINITY, 0.0]));
		assert!(is_degenerate(&[f32::NAN, 1.0]));
	}
}
