use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
	sync::atomic::{AtomicBool, Ordering as AtomicOrdering},
};

use uuid::Uuid;

use crate::{
	Candidate,
	cluster::{self, TrainingParams},
	similarity,
};

const SIMILARITY_SLACK: f32 = 1e-4;
const NORM_TOLERANCE: f64 = 1e-3;
const MIN_SHRINK_CAPACITY: usize = 64;

#[derive(Debug)]
struct Entry {
	vector: Vec<f32>,
	norm: f64,
	cluster: Option<usize>,
}

#[derive(Debug)]
struct Clusters {
	centroids: Vec<Vec<f32>>,
	members: Vec<Vec<Uuid>>,
}

/// How a search treats candidates tied with the last one that fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cutoff {
	Strict,
	KeepTies,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PartitionParams {
	pub(crate) exact_scan_threshold: usize,
	pub(crate) probe_count: usize,
	pub(crate) retrain_churn_ratio: f32,
	pub(crate) training: TrainingParams,
}
impl From<&sift_config::Index> for PartitionParams {
	fn from(cfg: &sift_config::Index) -> Self {
		Self {
			exact_scan_threshold: cfg.exact_scan_threshold as usize,
			probe_count: cfg.probe_count as usize,
			retrain_churn_ratio: cfg.retrain_churn_ratio,
			training: TrainingParams {
				cluster_count: cfg.cluster_count as usize,
				min_cluster_size: cfg.min_cluster_size as usize,
				iterations: cfg.kmeans_iterations as usize,
			},
		}
	}
}

/// The vectors of one owner. All access goes through the owning `RwLock`.
#[derive(Debug, Default)]
pub(crate) struct Partition {
	entries: HashMap<Uuid, Entry>,
	clusters: Option<Clusters>,
	churn: usize,
	corrupted: AtomicBool,
}
impl Partition {
	pub(crate) fn build(items: Vec<(Uuid, Vec<f32>)>, params: &PartitionParams) -> Self {
		let mut partition = Self::default();

		for (item_id, vector) in items {
			let norm = similarity::l2_norm(&vector);

			partition.entries.insert(item_id, Entry { vector, norm, cluster: None });
		}

		if partition.entries.len() >= params.exact_scan_threshold {
			partition.train(params);
		}

		partition
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub(crate) fn cluster_count(&self) -> usize {
		self.clusters.as_ref().map(|clusters| clusters.centroids.len()).unwrap_or(0)
	}

	pub(crate) fn contains(&self, item_id: &Uuid) -> bool {
		self.entries.contains_key(item_id)
	}

	pub(crate) fn vector(&self, item_id: &Uuid) -> Option<&[f32]> {
		self.entries.get(item_id).map(|entry| entry.vector.as_slice())
	}

	pub(crate) fn is_corrupted(&self) -> bool {
		self.corrupted.load(AtomicOrdering::Acquire)
	}

	pub(crate) fn mark_corrupted(&self) {
		self.corrupted.store(true, AtomicOrdering::Release);
	}

	/// Inserts or replaces `item_id`. The old vector is detached before the new one is attached,
	/// all under the caller's write lock.
	pub(crate) fn upsert(&mut self, item_id: Uuid, vector: Vec<f32>, params: &PartitionParams) {
		self.detach(&item_id);

		let norm = similarity::l2_norm(&vector);

		self.entries.insert(item_id, Entry { vector, norm, cluster: None });
		self.churn += 1;

		if self.maintain(params) {
			return;
		}

		self.attach(&item_id);
	}

	pub(crate) fn remove(&mut self, item_id: &Uuid, params: &PartitionParams) -> bool {
		self.detach(item_id);

		if self.entries.remove(item_id).is_none() {
			return false;
		}

		self.churn += 1;
		self.maintain(params);

		true
	}

	/// Releases spare capacity left behind by removals.
	pub(crate) fn compact(&mut self) -> bool {
		let capacity = self.entries.capacity();

		if capacity <= MIN_SHRINK_CAPACITY || capacity <= self.entries.len().saturating_mul(4) {
			return false;
		}

		self.entries.shrink_to_fit();

		if let Some(clusters) = self.clusters.as_mut() {
			for members in &mut clusters.members {
				members.shrink_to_fit();
			}
		}

		true
	}

	pub(crate) fn search(
		&self,
		query: &[f32],
		candidate_count: usize,
		params: &PartitionParams,
		exact: bool,
		cutoff: Cutoff,
	) -> Result<Vec<Candidate>, String> {
		let query_norm = similarity::l2_norm(query);

		if query_norm == 0.0 || candidate_count == 0 {
			return Ok(Vec::new());
		}

		let mut out = Vec::new();

		match self.clusters.as_ref() {
			Some(clusters) if !exact => {
				let unit = similarity::scaled(query, query_norm);
				let mut seen = HashSet::new();

				for cluster in cluster::nearest_n(&clusters.centroids, &unit, params.probe_count) {
					for item_id in &clusters.members[cluster] {
						if !seen.insert(*item_id) {
							return Err(duplicate_member(item_id));
						}

						let Some(entry) = self.entries.get(item_id) else {
							return Err(unknown_member(cluster, item_id));
						};

						push_scored(&mut out, *item_id, entry, query, query_norm)?;
					}
				}
			},
			_ => {
				for (item_id, entry) in &self.entries {
					push_scored(&mut out, *item_id, entry, query, query_norm)?;
				}
			},
		}

		out.sort_by(cmp_candidates);

		let keep = match (cutoff, out.get(candidate_count.saturating_sub(1))) {
			(Cutoff::KeepTies, Some(last)) => {
				let boundary = last.similarity;

				candidate_count
					+ out[candidate_count..]
						.iter()
						.take_while(|candidate| candidate.similarity == boundary)
						.count()
			},
			_ => candidate_count,
		};

		out.truncate(keep);

		Ok(out)
	}

	/// Checks cluster bookkeeping and stored norms.
	pub(crate) fn verify(&self) -> Result<(), String> {
		for (item_id, entry) in &self.entries {
			let norm = similarity::l2_norm(&entry.vector);

			if (norm - entry.norm).abs() > NORM_TOLERANCE * norm.max(1.0) {
				return Err(format!("Stored norm of item {item_id} does not match its vector."));
			}
		}

		let Some(clusters) = self.clusters.as_ref() else {
			if let Some(item_id) =
				self.entries.iter().find(|(_, entry)| entry.cluster.is_some()).map(|(id, _)| id)
			{
				return Err(format!(
					"Item {item_id} references a cluster in an unclustered partition."
				));
			}

			return Ok(());
		};

		if clusters.members.len() != clusters.centroids.len() {
			return Err("Cluster member lists do not match centroid count.".to_string());
		}

		let mut listed = HashSet::new();

		for (cluster, members) in clusters.members.iter().enumerate() {
			for item_id in members {
				if !listed.insert(*item_id) {
					return Err(duplicate_member(item_id));
				}

				match self.entries.get(item_id) {
					Some(entry) if entry.cluster == Some(cluster) => {},
					Some(_) => {
						return Err(format!("Item {item_id} is listed under the wrong cluster."));
					},
					None => return Err(unknown_member(cluster, item_id)),
				}
			}
		}

		for (item_id, entry) in &self.entries {
			if entry.norm > 0.0 && !listed.contains(item_id) {
				return Err(format!("Item {item_id} is not reachable through any cluster."));
			}
		}

		Ok(())
	}

	/// Keeps the clustering in line with the partition size. Returns true when every entry was
	/// reassigned.
	fn maintain(&mut self, params: &PartitionParams) -> bool {
		let len = self.entries.len();

		if len < params.exact_scan_threshold {
			if self.clusters.is_some() {
				self.drop_clusters();
			}

			return true;
		}

		let churn_limit = (params.retrain_churn_ratio * len as f32).ceil() as usize;

		if self.clusters.is_none() || self.churn > churn_limit {
			self.train(params);

			return true;
		}

		false
	}

	fn train(&mut self, params: &PartitionParams) {
		let mut ids: Vec<Uuid> =
			self.entries.iter().filter(|(_, entry)| entry.norm > 0.0).map(|(id, _)| *id).collect();

		ids.sort_unstable();

		let units: Vec<Vec<f32>> = ids
			.iter()
			.filter_map(|id| self.entries.get(id))
			.map(|entry| similarity::scaled(&entry.vector, entry.norm))
			.collect();
		let refs: Vec<&[f32]> = units.iter().map(Vec::as_slice).collect();
		let centroids = cluster::train(&refs, &params.training);

		self.churn = 0;

		if centroids.is_empty() {
			self.drop_clusters();

			return;
		}

		let mut members = vec![Vec::new(); centroids.len()];

		for entry in self.entries.values_mut() {
			entry.cluster = None;
		}
		for (id, unit) in ids.iter().zip(&units) {
			let cluster = cluster::nearest(&centroids, unit);

			members[cluster].push(*id);

			if let Some(entry) = self.entries.get_mut(id) {
				entry.cluster = Some(cluster);
			}
		}

		tracing::debug!(
			entries = self.entries.len(),
			clusters = centroids.len(),
			"Trained partition clusters."
		);

		self.clusters = Some(Clusters { centroids, members });
	}

	fn drop_clusters(&mut self) {
		self.clusters = None;
		self.churn = 0;

		for entry in self.entries.values_mut() {
			entry.cluster = None;
		}
	}

	fn attach(&mut self, item_id: &Uuid) {
		let (Some(clusters), Some(entry)) = (self.clusters.as_mut(), self.entries.get_mut(item_id))
		else {
			return;
		};

		if entry.norm == 0.0 {
			return;
		}

		let unit = similarity::scaled(&entry.vector, entry.norm);
		let cluster = cluster::nearest(&clusters.centroids, &unit);

		clusters.members[cluster].push(*item_id);
		entry.cluster = Some(cluster);
	}

	fn detach(&mut self, item_id: &Uuid) {
		let Some(entry) = self.entries.get_mut(item_id) else {
			return;
		};
		let Some(cluster) = entry.cluster.take() else {
			return;
		};

		if let Some(members) =
			self.clusters.as_mut().and_then(|clusters| clusters.members.get_mut(cluster))
			&& let Some(position) = members.iter().position(|member| member == item_id)
		{
			members.swap_remove(position);
		}
	}
}

fn push_scored(
	out: &mut Vec<Candidate>,
	item_id: Uuid,
	entry: &Entry,
	query: &[f32],
	query_norm: f64,
) -> Result<(), String> {
	let Some(similarity) =
		similarity::cosine_with_norms(query, query_norm, &entry.vector, entry.norm)
	else {
		return Ok(());
	};

	if !similarity.is_finite() || similarity.abs() > 1.0 + SIMILARITY_SLACK {
		return Err(format!("Item {item_id} scored an impossible similarity {similarity}."));
	}

	out.push(Candidate { item_id, similarity: similarity.clamp(-1.0, 1.0) });

	Ok(())
}

fn duplicate_member(item_id: &Uuid) -> String {
	format!("Item {item_id} is listed in more than one cluster.")
}

fn unknown_member(cluster: usize, item_id: &Uuid) -> String {
	format!("Cluster {cluster} lists unknown item {item_id}.")
}

fn cmp_candidates(left: &Candidate, right: &Candidate) -> Ordering {
	right
		.similarity
		.partial_cmp(&left.similarity)
		.unwrap_or(Ordering::Equal)
		.then_with(|| left.item_id.cmp(&right.item_id))
}
