//! In-memory embedding index partitioned by owner.
//!
//! Each owner's vectors live in their own partition behind their own lock, so writes for one
//! owner never block queries for another. Small partitions are scanned exhaustively; once a
//! partition reaches `exact_scan_threshold` entries it is clustered with spherical k-means and
//! queries only visit the `probe_count` closest clusters.

pub mod error;

mod cluster;
mod partition;
mod similarity;

pub use error::{Error, Result};

use std::{
	collections::HashMap,
	sync::{Arc, RwLock},
};

use uuid::Uuid;

use partition::{Cutoff, Partition, PartitionParams};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
	pub item_id: Uuid,
	/// Cosine similarity in `[-1, 1]`.
	pub similarity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
	pub owners: usize,
	pub vectors: usize,
	pub clustered_owners: usize,
	pub corrupted_owners: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactReport {
	pub dropped_owners: usize,
	pub shrunk_owners: usize,
}

pub struct EmbeddingIndex {
	vector_dim: usize,
	params: PartitionParams,
	partitions: RwLock<HashMap<String, Arc<RwLock<Partition>>>>,
}
impl EmbeddingIndex {
	pub fn new(cfg: &sift_config::Index) -> Self {
		Self {
			vector_dim: cfg.vector_dim as usize,
			params: PartitionParams::from(cfg),
			partitions: RwLock::new(HashMap::new()),
		}
	}

	pub fn vector_dim(&self) -> usize {
		self.vector_dim
	}

	/// Adds or replaces the vector for `item_id`. Zero vectors are kept but never match.
	pub fn upsert(&self, owner_id: &str, item_id: Uuid, vector: &[f32]) -> Result<()> {
		sift_domain::validate_vector(vector, self.vector_dim)
			.map_err(|err| Error::InvalidVector { message: err.to_string() })?;

		let partition = self.partition_or_insert(owner_id);
		let mut guard = partition.write().unwrap_or_else(|err| err.into_inner());

		guard.upsert(item_id, vector.to_vec(), &self.params);

		Ok(())
	}

	/// Removes `item_id`. Returns false when it was not indexed.
	pub fn remove(&self, owner_id: &str, item_id: &Uuid) -> bool {
		let Some(partition) = self.partition(owner_id) else {
			return false;
		};
		let mut guard = partition.write().unwrap_or_else(|err| err.into_inner());

		guard.remove(item_id, &self.params)
	}

	/// Top `k` candidates for `vector` within the owner's partition, best first.
	///
	/// Ordering is by similarity, then by ascending item id. An unknown owner has no candidates.
	pub fn query(&self, owner_id: &str, vector: &[f32], k: usize) -> Result<Vec<Candidate>> {
		self.search(owner_id, vector, k, false, Cutoff::Strict)
	}

	/// Same as [`Self::query`], but also returns every candidate whose similarity equals that of
	/// the `k`-th one, so callers can break those ties on their own terms.
	pub fn query_with_ties(
		&self,
		owner_id: &str,
		vector: &[f32],
		k: usize,
	) -> Result<Vec<Candidate>> {
		self.search(owner_id, vector, k, false, Cutoff::KeepTies)
	}

	/// Same as [`Self::query`] but always scans every vector in the partition.
	pub fn exact_query(&self, owner_id: &str, vector: &[f32], k: usize) -> Result<Vec<Candidate>> {
		self.search(owner_id, vector, k, true, Cutoff::Strict)
	}

	pub fn contains(&self, owner_id: &str, item_id: &Uuid) -> bool {
		self.read_partition(owner_id, |partition| partition.contains(item_id)).unwrap_or(false)
	}

	pub fn len(&self, owner_id: &str) -> usize {
		self.read_partition(owner_id, Partition::len).unwrap_or(0)
	}

	pub fn is_empty(&self, owner_id: &str) -> bool {
		self.len(owner_id) == 0
	}

	pub fn get_vector(&self, owner_id: &str, item_id: &Uuid) -> Option<Vec<f32>> {
		self.read_partition(owner_id, |partition| partition.vector(item_id).map(<[f32]>::to_vec))
			.flatten()
	}

	pub fn owners(&self) -> Vec<String> {
		let partitions = self.partitions.read().unwrap_or_else(|err| err.into_inner());
		let mut owners: Vec<String> = partitions.keys().cloned().collect();

		owners.sort();

		owners
	}

	/// Checks the internal consistency of one partition. A failed check marks it corrupted.
	pub fn verify(&self, owner_id: &str) -> Result<()> {
		let Some(partition) = self.partition(owner_id) else {
			return Ok(());
		};
		let guard = partition.read().unwrap_or_else(|err| err.into_inner());

		if guard.is_corrupted() {
			return Err(corruption(owner_id, "Partition was already marked corrupted."));
		}

		guard.verify().map_err(|message| {
			guard.mark_corrupted();

			tracing::error!(owner_id, error = %message, "Index partition failed verification.");

			corruption(owner_id, message)
		})
	}

	pub fn is_corrupted(&self, owner_id: &str) -> bool {
		self.read_partition(owner_id, Partition::is_corrupted).unwrap_or(false)
	}

	/// Fails every query against the owner's partition until it is rebuilt.
	pub fn mark_corrupted(&self, owner_id: &str) {
		let partition = self.partition_or_insert(owner_id);
		let guard = partition.read().unwrap_or_else(|err| err.into_inner());

		guard.mark_corrupted();

		tracing::warn!(owner_id, "Index partition marked corrupted.");
	}

	/// Replaces the owner's partition with one built from `items`.
	///
	/// The new partition is built without holding any lock; readers see either the old contents or
	/// the new ones, never a mix. Returns the number of vectors indexed.
	pub fn rebuild_owner(&self, owner_id: &str, items: Vec<(Uuid, Vec<f32>)>) -> Result<usize> {
		for (item_id, vector) in &items {
			sift_domain::validate_vector(vector, self.vector_dim).map_err(|err| {
				Error::InvalidVector { message: format!("Item {item_id}: {err}") }
			})?;
		}

		let rebuilt = Partition::build(items, &self.params);
		let count = rebuilt.len();
		let partition = self.partition_or_insert(owner_id);
		let mut guard = partition.write().unwrap_or_else(|err| err.into_inner());

		*guard = rebuilt;

		tracing::info!(
			owner_id,
			vectors = count,
			clusters = guard.cluster_count(),
			"Rebuilt index partition."
		);

		Ok(count)
	}

	/// Rebuilds every partition from `owners`. Owners missing from `owners` end up empty.
	pub fn rebuild(&self, mut owners: HashMap<String, Vec<(Uuid, Vec<f32>)>>) -> Result<usize> {
		let mut total = 0;

		for owner_id in self.owners() {
			owners.entry(owner_id).or_default();
		}
		for (owner_id, items) in owners {
			total += self.rebuild_owner(&owner_id, items)?;
		}

		Ok(total)
	}

	/// Drops empty partitions nobody else holds and releases spare capacity in the rest.
	pub fn compact(&self) -> CompactReport {
		let mut report = CompactReport::default();
		let mut partitions = self.partitions.write().unwrap_or_else(|err| err.into_inner());

		partitions.retain(|_, partition| {
			let mut guard = partition.write().unwrap_or_else(|err| err.into_inner());

			if guard.is_empty() && !guard.is_corrupted() && Arc::strong_count(partition) == 1 {
				report.dropped_owners += 1;

				return false;
			}
			if guard.compact() {
				report.shrunk_owners += 1;
			}

			true
		});

		report
	}

	pub fn stats(&self) -> IndexStats {
		let partitions = self.partitions.read().unwrap_or_else(|err| err.into_inner());
		let mut stats = IndexStats { owners: partitions.len(), ..Default::default() };

		for partition in partitions.values() {
			let guard = partition.read().unwrap_or_else(|err| err.into_inner());

			stats.vectors += guard.len();

			if guard.cluster_count() > 0 {
				stats.clustered_owners += 1;
			}
			if guard.is_corrupted() {
				stats.corrupted_owners += 1;
			}
		}

		stats
	}

	fn search(
		&self,
		owner_id: &str,
		vector: &[f32],
		k: usize,
		exact: bool,
		cutoff: Cutoff,
	) -> Result<Vec<Candidate>> {
		sift_domain::validate_vector(vector, self.vector_dim)
			.map_err(|err| Error::InvalidVector { message: err.to_string() })?;

		let Some(partition) = self.partition(owner_id) else {
			return Ok(Vec::new());
		};
		let guard = partition.read().unwrap_or_else(|err| err.into_inner());

		if guard.is_corrupted() {
			return Err(corruption(owner_id, "Partition is awaiting rebuild."));
		}

		guard.search(vector, k, &self.params, exact, cutoff).map_err(|message| {
			guard.mark_corrupted();

			tracing::error!(
				owner_id,
				error = %message,
				"Index partition returned an invalid result."
			);

			corruption(owner_id, message)
		})
	}

	fn partition(&self, owner_id: &str) -> Option<Arc<RwLock<Partition>>> {
		let partitions = self.partitions.read().unwrap_or_else(|err| err.into_inner());

		partitions.get(owner_id).cloned()
	}

	fn partition_or_insert(&self, owner_id: &str) -> Arc<RwLock<Partition>> {
		if let Some(partition) = self.partition(owner_id) {
			return partition;
		}

		let mut partitions = self.partitions.write().unwrap_or_else(|err| err.into_inner());

		partitions.entry(owner_id.to_string()).or_default().clone()
	}

	fn read_partition<T>(&self, owner_id: &str, f: impl FnOnce(&Partition) -> T) -> Option<T> {
		let partition = self.partition(owner_id)?;
		let guard = partition.read().unwrap_or_else(|err| err.into_inner());

		Some(f(&guard))
	}
}

fn corruption(owner_id: &str, message: impl Into<String>) -> Error {
	Error::IndexCorruption { owner_id: owner_id.to_string(), message: message.into() }
}
