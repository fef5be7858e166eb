use uuid::Uuid;

use sift_domain::UploadItem;
use sift_index::EmbeddingIndex;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
	Admitted,
	Revoked,
	/// Not eligible and not indexed before either.
	Absent,
}

/// Decides which records the index may hold.
///
/// Only a Ready item with a finite, correctly sized, non-zero embedding is admitted. Everything
/// else is revoked.
pub struct LifecycleGate<'a> {
	index: &'a EmbeddingIndex,
}
impl<'a> LifecycleGate<'a> {
	pub fn new(index: &'a EmbeddingIndex) -> Self {
		Self { index }
	}

	/// Makes `item` queryable when it is eligible. Returns whether it was admitted.
	///
	/// Re-admission replaces the previous vector in one step, so a query sees the old vector or
	/// the new one and never both.
	pub fn admit(&self, item: &UploadItem) -> Result<bool> {
		let Some(embedding) = item.indexable_embedding(self.index.vector_dim()) else {
			self.revoke(&item.owner_id, item.item_id);

			return Ok(false);
		};

		self.index.upsert(&item.owner_id, item.item_id, embedding)?;

		tracing::debug!(
			owner_id = %item.owner_id,
			item_id = %item.item_id,
			"Admitted item to the index."
		);

		Ok(true)
	}

	/// Removes `item_id` from the index. Idempotent.
	pub fn revoke(&self, owner_id: &str, item_id: Uuid) -> bool {
		let removed = self.index.remove(owner_id, &item_id);

		if removed {
			tracing::debug!(owner_id, item_id = %item_id, "Revoked item from the index.");
		}

		removed
	}

	/// Admits or revokes `item` to match its current state.
	pub fn apply(&self, item: &UploadItem) -> Result<GateOutcome> {
		let was_indexed = self.index.contains(&item.owner_id, &item.item_id);

		if self.admit(item)? {
			return Ok(GateOutcome::Admitted);
		}

		Ok(if was_indexed { GateOutcome::Revoked } else { GateOutcome::Absent })
	}
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use sift_domain::ContentFields;

	use super::*;

	fn index() -> EmbeddingIndex {
		EmbeddingIndex::new(&sift_config::Index {
			vector_dim: 3,
			cluster_count: 4,
			probe_count: 2,
			exact_scan_threshold: 256,
			kmeans_iterations: 4,
			retrain_churn_ratio: 0.25,
			min_cluster_size: 8,
			sync: Default::default(),
		})
	}

	fn ts(seconds: i64) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(seconds).expect("Valid timestamp.")
	}

	fn ready(embedding: Vec<f32>) -> UploadItem {
		let mut item =
			UploadItem::new(Uuid::from_u128(1), "owner-a", ContentFields::default(), ts(1));

		item.set_embedding(embedding, ts(2));
		item.mark_ready(ts(3));

		item
	}

	#[test]
	fn admits_only_ready_items_with_usable_vectors() {
		let index = index();
		let gate = LifecycleGate::new(&index);
		let mut item = ready(vec![1.0, 0.0, 0.0]);

		assert_eq!(gate.apply(&item).expect("Gate must succeed."), GateOutcome::Admitted);
		assert!(index.contains("owner-a", &item.item_id));

		item.mark_processing(ts(4));

		assert_eq!(gate.apply(&item).expect("Gate must succeed."), GateOutcome::Revoked);
		assert!(!index.contains("owner-a", &item.item_id));
		assert_eq!(gate.apply(&item).expect("Gate must succeed."), GateOutcome::Absent);
	}

	#[test]
	fn degenerate_embeddings_are_not_admitted() {
		let index = index();
		let gate = LifecycleGate::new(&index);

		assert!(!gate.admit(&ready(vec![0.0, 0.0, 0.0])).expect("Gate must succeed."));
		assert!(index.is_empty("owner-a"));
	}

	#[test]
	fn readmission_replaces_the_old_vector() {
		let index = index();
		let gate = LifecycleGate::new(&index);

		gate.admit(&ready(vec![1.0, 0.0, 0.0])).expect("Gate must succeed.");
		gate.admit(&ready(vec![0.0, 1.0, 0.0])).expect("Gate must succeed.");

		assert_eq!(index.len("owner-a"), 1);
		assert_eq!(index.get_vector("owner-a", &Uuid::from_u128(1)), Some(vec![0.0, 1.0, 0.0]));
	}
}
