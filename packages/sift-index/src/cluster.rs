//! Spherical k-means over unit vectors.
//!
//! Seeding is deterministic farthest-point selection, so the same partition contents always
//! train the same centroids. Training runs on a strided sample of at most
//! `TRAINING_SAMPLE_PER_CLUSTER` points per cluster; every point is assigned afterwards.

use std::cmp::Ordering;

use crate::similarity;

const TRAINING_SAMPLE_PER_CLUSTER: usize = 64;

#[derive(Debug, Clone, Copy)]
pub(crate) struct TrainingParams {
	pub(crate) cluster_count: usize,
	pub(crate) min_cluster_size: usize,
	pub(crate) iterations: usize,
}

/// Number of clusters worth training for `n` points.
pub(crate) fn cluster_count_for(n: usize, params: &TrainingParams) -> usize {
	if n == 0 {
		return 0;
	}

	(n / params.min_cluster_size.max(1)).clamp(1, params.cluster_count.max(1)).min(n)
}

/// Trains unit-length centroids. `points` must already be unit length and in a stable order.
pub(crate) fn train(points: &[&[f32]], params: &TrainingParams) -> Vec<Vec<f32>> {
	let k = cluster_count_for(points.len(), params);

	if k == 0 {
		return Vec::new();
	}

	let sample = strided_sample(points, k.saturating_mul(TRAINING_SAMPLE_PER_CLUSTER));
	let mut centroids = seed_farthest(&sample, k);
	let mut assignments = vec![usize::MAX; sample.len()];

	for _ in 0..params.iterations.max(1) {
		let mut changed = false;

		for (idx, point) in sample.iter().enumerate() {
			let best = nearest(&centroids, point);

			if assignments[idx] != best {
				assignments[idx] = best;
				changed = true;
			}
		}

		if !changed {
			break;
		}

		let dim = centroids[0].len();
		let mut sums = vec![vec![0.0_f32; dim]; centroids.len()];

		for (point, cluster) in sample.iter().zip(&assignments) {
			for (sum, value) in sums[*cluster].iter_mut().zip(point.iter()) {
				*sum += value;
			}
		}

		// A cluster that lost every member keeps its previous centroid.
		for (centroid, sum) in centroids.iter_mut().zip(sums) {
			if let Some(unit) = similarity::normalized(&sum) {
				*centroid = unit;
			}
		}
	}

	centroids
}

/// Index of the centroid most similar to `unit`. Ties go to the lower index.
pub(crate) fn nearest(centroids: &[Vec<f32>], unit: &[f32]) -> usize {
	let mut best = 0;
	let mut best_score = f64::NEG_INFINITY;

	for (idx, centroid) in centroids.iter().enumerate() {
		let score = similarity::dot(centroid, unit);

		if score > best_score {
			best = idx;
			best_score = score;
		}
	}

	best
}

/// Indices of the `n` centroids most similar to `unit`, best first.
pub(crate) fn nearest_n(centroids: &[Vec<f32>], unit: &[f32], n: usize) -> Vec<usize> {
	let mut scored: Vec<(usize, f64)> = centroids
		.iter()
		.enumerate()
		.map(|(idx, centroid)| (idx, similarity::dot(centroid, unit)))
		.collect();

	scored.sort_by(|left, right| {
		right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal).then_with(|| left.0.cmp(&right.0))
	});
	scored.truncate(n);

	scored.into_iter().map(|(idx, _)| idx).collect()
}

fn strided_sample<'a>(points: &[&'a [f32]], max: usize) -> Vec<&'a [f32]> {
	if points.len() <= max || max == 0 {
		return points.to_vec();
	}

	let stride = points.len().div_ceil(max);

	points.iter().step_by(stride).copied().collect()
}

fn seed_farthest(sample: &[&[f32]], k: usize) -> Vec<Vec<f32>> {
	let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
	let mut min_distance = vec![f64::INFINITY; sample.len()];

	centroids.push(sample[0].to_vec());

	while centroids.len() < k {
		let Some(last) = centroids.last() else {
			break;
		};

		for (distance, point) in min_distance.iter_mut().zip(sample) {
			let candidate = 1.0 - similarity::dot(last, point);

			if candidate < *distance {
				*distance = candidate;
			}
		}

		let mut farthest = None;
		let mut farthest_distance = 0.0_f64;

		for (idx, distance) in min_distance.iter().enumerate() {
			if *distance > farthest_distance {
				farthest = Some(idx);
				farthest_distance = *distance;
			}
		}

		// Every remaining point coincides with a centroid.
		let Some(farthest) = farthest else {
			break;
		};

		centroids.push(sample[farthest].to_vec());
	}

	centroids
}
