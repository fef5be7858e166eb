//! Vector arithmetic. Sums accumulate in `f64`, which holds the square of any finite `f32` and
//! the sum of those squares, so norms neither overflow nor flush to zero.

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f64 {
	a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

pub(crate) fn l2_norm(vector: &[f32]) -> f64 {
	dot(vector, vector).sqrt()
}

/// Unit-length copy of `vector`, or `None` when it has no direction.
pub(crate) fn normalized(vector: &[f32]) -> Option<Vec<f32>> {
	let norm = l2_norm(vector);

	if norm == 0.0 || !norm.is_finite() {
		return None;
	}

	Some(scaled(vector, norm))
}

/// Divides every component by `norm` in `f64` before narrowing back.
pub(crate) fn scaled(vector: &[f32], norm: f64) -> Vec<f32> {
	vector.iter().map(|value| (f64::from(*value) / norm) as f32).collect()
}

/// Cosine similarity given precomputed norms. Zero-norm inputs have no similarity at all.
pub(crate) fn cosine_with_norms(a: &[f32], a_norm: f64, b: &[f32], b_norm: f64) -> Option<f32> {
	if a.len() != b.len() || a_norm == 0.0 || b_norm == 0.0 {
		return None;
	}

	Some((dot(a, b) / a_norm / b_norm) as f32)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cosine_of_parallel_vectors_is_one() {
		let a = [1.0, 2.0, 3.0];
		let b = [2.0, 4.0, 6.0];
		let sim =
			cosine_with_norms(&a, l2_norm(&a), &b, l2_norm(&b)).expect("Expected similarity.");

		assert!((sim - 1.0).abs() < 1e-6);
	}

	#[test]
	fn extreme_magnitudes_keep_their_direction() {
		let huge = [1e20_f32, 1e20, 0.0];
		let huger = [3e38_f32, 3e38, 0.0];
		let tiny = [1e-23_f32, 1e-23, 0.0];
		let subnormal = [1e-45_f32, 0.0, 0.0];

		for (a, b) in [(&huge, &huger), (&tiny, &huge), (&subnormal, &[1.0, 0.0, 0.0])] {
			let (a_norm, b_norm) = (l2_norm(a), l2_norm(b));

			assert!(a_norm > 0.0 && a_norm.is_finite());
			assert!(b_norm > 0.0 && b_norm.is_finite());

			let sim = cosine_with_norms(a, a_norm, b, b_norm).expect("Expected similarity.");

			assert!((sim - 1.0).abs() < 1e-6, "Parallel vectors scored {sim}.");
		}

		let unit = normalized(&tiny).expect("Tiny vectors still have a direction.");

		assert!((l2_norm(&unit) - 1.0).abs() < 1e-6);
	}

	#[test]
	fn zero_norm_has_no_similarity() {
		let a = [0.0, 0.0];
		let b = [1.0, 0.0];

		assert_eq!(cosine_with_norms(&a, 0.0, &b, 1.0), None);
		assert_eq!(normalized(&a), None);
	}

	#[test]
	fn mismatched_dimensions_have_no_similarity() {
		assert_eq!(cosine_with_norms(&[1.0], 1.0, &[1.0, 0.0], 1.0), None);
	}
}
