use std::{collections::HashSet, sync::Arc, thread};

use uuid::Uuid;

use sift_index::{EmbeddingIndex, Error};

const DIM: usize = 32;

struct Lcg(u64);
impl Lcg {
	fn next_f32(&mut self) -> f32 {
		self.0 =
			self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);

		((self.0 >> 40) as f32 / (1_u64 << 24) as f32) * 2.0 - 1.0
	}

	fn vector(&mut self) -> Vec<f32> {
		(0..DIM).map(|_| self.next_f32()).collect()
	}

	fn near(&mut self, center: &[f32], spread: f32) -> Vec<f32> {
		center.iter().map(|value| value + self.next_f32() * spread).collect()
	}
}

fn index_cfg(exact_scan_threshold: u32) -> sift_config::Index {
	sift_config::Index {
		vector_dim: DIM as u32,
		cluster_count: 32,
		probe_count: 8,
		exact_scan_threshold,
		kmeans_iterations: 10,
		retrain_churn_ratio: 0.25,
		min_cluster_size: 8,
		sync: Default::default(),
	}
}

fn item(n: u128) -> Uuid {
	Uuid::from_u128(n)
}

fn unit_x() -> Vec<f32> {
	let mut vector = vec![0.0; DIM];

	vector[0] = 1.0;

	vector
}

fn scaled(vector: &[f32], factor: f32) -> Vec<f32> {
	vector.iter().map(|value| value * factor).collect()
}

/// Fills `owner` with `blobs` tight groups of `per_blob` vectors. Returns the blob centers.
fn fill_blobs(
	index: &EmbeddingIndex,
	owner: &str,
	rng: &mut Lcg,
	blobs: usize,
	per_blob: usize,
) -> Vec<Vec<f32>> {
	let centers: Vec<Vec<f32>> = (0..blobs).map(|_| rng.vector()).collect();
	let mut n = 0;

	for center in &centers {
		for _ in 0..per_blob {
			index.upsert(owner, item(n), &rng.near(center, 0.05)).expect("Upsert must succeed.");

			n += 1;
		}
	}

	centers
}

#[test]
fn clustered_query_recalls_exact_top_matches() {
	let index = EmbeddingIndex::new(&index_cfg(256));
	let mut rng = Lcg(7);
	let centers = fill_blobs(&index, "owner-a", &mut rng, 20, 100);

	assert_eq!(index.stats().clustered_owners, 1, "Large partitions must be clustered.");
	assert!(index.verify("owner-a").is_ok());

	let mut hits = 0;
	let mut total = 0;

	for center in &centers {
		let query = rng.near(center, 0.05);
		let exact = index.exact_query("owner-a", &query, 10).expect("Exact query must succeed.");
		let approx = index.query("owner-a", &query, 10).expect("Query must succeed.");
		let approx_ids: HashSet<Uuid> = approx.iter().map(|candidate| candidate.item_id).collect();

		hits += exact.iter().filter(|candidate| approx_ids.contains(&candidate.item_id)).count();
		total += exact.len();
	}

	let recall = hits as f32 / total as f32;

	assert!(recall >= 0.9, "Recall {recall} is below 0.9.");
}

#[test]
fn small_partitions_are_answered_exactly() {
	let index = EmbeddingIndex::new(&index_cfg(256));
	let mut rng = Lcg(11);

	for n in 0..200 {
		index.upsert("owner-a", item(n), &rng.vector()).expect("Upsert must succeed.");
	}

	assert_eq!(index.stats().clustered_owners, 0);

	for _ in 0..10 {
		let query = rng.vector();

		assert_eq!(
			index.query("owner-a", &query, 25).expect("Query must succeed."),
			index.exact_query("owner-a", &query, 25).expect("Exact query must succeed.")
		);
	}
}

#[test]
fn results_are_sorted_with_item_id_tie_break() {
	let index = EmbeddingIndex::new(&index_cfg(256));

	index.upsert("owner-a", item(3), &unit_x()).expect("Upsert must succeed.");
	index.upsert("owner-a", item(1), &unit_x()).expect("Upsert must succeed.");

	let mut other = unit_x();

	other[1] = 1.0;

	index.upsert("owner-a", item(2), &other).expect("Upsert must succeed.");

	let results = index.query("owner-a", &unit_x(), 10).expect("Query must succeed.");
	let ids: Vec<Uuid> = results.iter().map(|candidate| candidate.item_id).collect();

	assert_eq!(ids, vec![item(1), item(3), item(2)]);
	assert!((results[0].similarity - 1.0).abs() < 1e-6);
	assert!((results[2].similarity - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
}

#[test]
fn owners_never_see_each_others_vectors() {
	let index = EmbeddingIndex::new(&index_cfg(256));

	index.upsert("owner-a", item(1), &unit_x()).expect("Upsert must succeed.");

	assert!(index.query("owner-b", &unit_x(), 10).expect("Query must succeed.").is_empty());
	assert!(!index.contains("owner-b", &item(1)));
	assert!(!index.remove("owner-b", &item(1)));
	assert!(index.contains("owner-a", &item(1)));
}

#[test]
fn zero_vectors_are_stored_but_never_match() {
	let index = EmbeddingIndex::new(&index_cfg(256));
	let zero = vec![0.0; DIM];

	index.upsert("owner-a", item(1), &zero).expect("Zero vector must be accepted.");
	index.upsert("owner-a", item(2), &unit_x()).expect("Upsert must succeed.");

	assert_eq!(index.len("owner-a"), 2);

	let results = index.query("owner-a", &unit_x(), 10).expect("Query must succeed.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].item_id, item(2));
	assert!(index.query("owner-a", &zero, 10).expect("Zero query must succeed.").is_empty());
}

#[test]
fn extreme_magnitudes_score_like_their_direction() {
	for exact_scan_threshold in [256, 16] {
		let index = EmbeddingIndex::new(&index_cfg(exact_scan_threshold));
		let mut rng = Lcg(11);

		for n in 0..64 {
			index.upsert("owner-a", item(n), &rng.vector()).expect("Upsert must succeed.");
		}

		let direction = rng.vector();

		index
			.upsert("owner-a", item(100), &scaled(&direction, 1e20))
			.expect("Huge vectors must be accepted.");
		index
			.upsert("owner-a", item(101), &scaled(&direction, 1e-23))
			.expect("Tiny vectors must be accepted.");

		for factor in [1e20, 1.0, 1e-23] {
			let results = index
				.query("owner-a", &scaled(&direction, factor), 2)
				.expect("Query must succeed.");
			let ids: HashSet<Uuid> = results.iter().map(|candidate| candidate.item_id).collect();

			assert_eq!(ids, HashSet::from([item(100), item(101)]), "Query scale {factor}.");
			assert!(results.iter().all(|candidate| candidate.similarity > 0.9999));
		}

		assert!(!index.is_corrupted("owner-a"));
		assert!(index.verify("owner-a").is_ok());
	}
}

#[test]
fn ties_at_the_cutoff_are_kept_on_request() {
	let index = EmbeddingIndex::new(&index_cfg(256));
	let mut other = unit_x();

	other[1] = 1.0;

	for n in 1..=4 {
		index.upsert("owner-a", item(n), &unit_x()).expect("Upsert must succeed.");
	}

	index.upsert("owner-a", item(5), &other).expect("Upsert must succeed.");

	let ids = |results: Vec<sift_index::Candidate>| -> Vec<Uuid> {
		results.iter().map(|candidate| candidate.item_id).collect()
	};
	let strict = index.query("owner-a", &unit_x(), 2).expect("Query must succeed.");
	let tied = index.query_with_ties("owner-a", &unit_x(), 2).expect("Query must succeed.");
	let past_ties = index.query_with_ties("owner-a", &unit_x(), 4).expect("Query must succeed.");

	assert_eq!(ids(strict), vec![item(1), item(2)]);
	assert_eq!(ids(tied), vec![item(1), item(2), item(3), item(4)]);
	assert_eq!(ids(past_ties).len(), 4, "A strictly lower similarity ends the tie run.");
}

#[test]
fn malformed_vectors_are_rejected() {
	let index = EmbeddingIndex::new(&index_cfg(256));

	assert!(matches!(
		index.upsert("owner-a", item(1), &[1.0, 0.0]),
		Err(Error::InvalidVector { .. })
	));

	let mut nan = unit_x();

	nan[3] = f32::NAN;

	assert!(matches!(index.upsert("owner-a", item(1), &nan), Err(Error::InvalidVector { .. })));
	assert!(matches!(index.query("owner-a", &nan, 5), Err(Error::InvalidVector { .. })));
	assert_eq!(index.len("owner-a"), 0);
}

#[test]
fn replacing_and_removing_keeps_clusters_consistent() {
	let index = EmbeddingIndex::new(&index_cfg(64));
	let mut rng = Lcg(23);

	for n in 0..300 {
		index.upsert("owner-a", item(n), &rng.vector()).expect("Upsert must succeed.");
	}
	for n in 0..150 {
		index.upsert("owner-a", item(n), &rng.vector()).expect("Replace must succeed.");
	}
	for n in 150..260 {
		assert!(index.remove("owner-a", &item(n)));
	}

	assert_eq!(index.len("owner-a"), 190);
	assert!(index.verify("owner-a").is_ok());

	let replaced = rng.vector();

	index.upsert("owner-a", item(5), &replaced).expect("Replace must succeed.");

	assert_eq!(index.get_vector("owner-a", &item(5)), Some(replaced.clone()));

	let top = index.query("owner-a", &replaced, 1).expect("Query must succeed.");

	assert_eq!(top[0].item_id, item(5));

	for n in (0..150).chain(260..300) {
		index.remove("owner-a", &item(n));
	}

	assert!(index.is_empty("owner-a"));
	assert_eq!(index.stats().clustered_owners, 0);
	assert!(index.verify("owner-a").is_ok());
}

#[test]
fn corrupted_partition_fails_until_rebuilt() {
	let index = EmbeddingIndex::new(&index_cfg(256));

	index.upsert("owner-a", item(1), &unit_x()).expect("Upsert must succeed.");
	index.upsert("owner-b", item(2), &unit_x()).expect("Upsert must succeed.");
	index.mark_corrupted("owner-a");

	assert!(index.is_corrupted("owner-a"));
	assert!(matches!(
		index.query("owner-a", &unit_x(), 5),
		Err(Error::IndexCorruption { owner_id, .. }) if owner_id == "owner-a"
	));
	let other = index.query("owner-b", &unit_x(), 5).expect("Other owners are unaffected.");

	assert_eq!(other.len(), 1);

	let rebuilt = index
		.rebuild_owner("owner-a", vec![(item(1), unit_x()), (item(3), unit_x())])
		.expect("Rebuild must succeed.");

	assert_eq!(rebuilt, 2);
	assert!(!index.is_corrupted("owner-a"));
	assert_eq!(index.query("owner-a", &unit_x(), 5).expect("Query must succeed.").len(), 2);
}

#[test]
fn rebuild_rejects_malformed_vectors_and_keeps_old_contents() {
	let index = EmbeddingIndex::new(&index_cfg(256));

	index.upsert("owner-a", item(1), &unit_x()).expect("Upsert must succeed.");

	assert!(index.rebuild_owner("owner-a", vec![(item(2), vec![1.0])]).is_err());
	assert!(index.contains("owner-a", &item(1)));
}

#[test]
fn compact_drops_empty_partitions() {
	let index = EmbeddingIndex::new(&index_cfg(256));

	index.upsert("owner-a", item(1), &unit_x()).expect("Upsert must succeed.");
	index.upsert("owner-b", item(2), &unit_x()).expect("Upsert must succeed.");
	index.remove("owner-a", &item(1));

	let report = index.compact();

	assert_eq!(report.dropped_owners, 1);
	assert_eq!(index.owners(), vec!["owner-b".to_string()]);
}

#[test]
fn writers_and_readers_of_different_owners_run_concurrently() {
	let index = Arc::new(EmbeddingIndex::new(&index_cfg(128)));
	let mut handles = Vec::new();

	for worker in 0..4_u128 {
		let index = Arc::clone(&index);

		handles.push(thread::spawn(move || {
			let owner = format!("owner-{worker}");
			let mut rng = Lcg(worker as u64 + 1);

			for n in 0..300 {
				let item_id = item(worker * 1_000 + n);

				index.upsert(&owner, item_id, &rng.vector()).expect("Upsert must succeed.");

				if n % 10 == 0 {
					let results =
						index.query(&owner, &rng.vector(), 5).expect("Query must succeed.");

					assert!(results.iter().all(|candidate| {
						candidate.item_id.as_u128() / 1_000 == worker
					}));
				}
			}
		}));
	}

	for handle in handles {
		handle.join().expect("Worker thread panicked.");
	}

	let stats = index.stats();

	assert_eq!(stats.owners, 4);
	assert_eq!(stats.vectors, 1_200);
	assert_eq!(stats.corrupted_owners, 0);

	for owner in index.owners() {
		assert!(index.verify(&owner).is_ok());
	}
}
