use std::{collections::BTreeSet, sync::Arc};

use serde::Serialize;

use sift_index::IndexStats;

use crate::{Error, Result, SiftService};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
	pub owners: usize,
	pub rebuilt_count: usize,
	/// Ready records whose embedding is missing, all zero, or the wrong size.
	pub skipped_count: usize,
}
impl RebuildReport {
	fn merge(&mut self, other: Self) {
		self.owners += other.owners;
		self.rebuilt_count += other.rebuilt_count;
		self.skipped_count += other.skipped_count;
	}
}

impl SiftService {
	/// Rebuilds every partition from the Ready records in the content store.
	///
	/// Owners are rebuilt one at a time under their own lock, so writes for other owners keep
	/// flowing. Partitions of owners without Ready records end up empty.
	pub async fn rebuild_index(&self) -> Result<RebuildReport> {
		let mut owners: BTreeSet<String> =
			self.list_ready(None).await?.into_iter().map(|item| item.owner_id).collect();

		owners.extend(self.index.owners());

		let mut report = RebuildReport::default();

		for owner_id in owners {
			report.merge(self.rebuild_owner(&owner_id).await?);
		}

		tracing::info!(
			owners = report.owners,
			rebuilt = report.rebuilt_count,
			skipped = report.skipped_count,
			"Rebuilt embedding index."
		);

		Ok(report)
	}

	/// Rebuilds one owner's partition from the content store. Clears any corruption mark.
	pub async fn rebuild_owner(&self, owner_id: &str) -> Result<RebuildReport> {
		crate::require_owner(owner_id)?;

		let _guard = self.locks.lock(owner_id).await;
		let vector_dim = self.index.vector_dim();
		let mut entries = Vec::new();
		let mut skipped_count = 0;

		for item in self.list_ready(Some(owner_id)).await? {
			match item.indexable_embedding(vector_dim) {
				Some(embedding) => entries.push((item.item_id, embedding.to_vec())),
				None => {
					skipped_count += 1;

					tracing::warn!(
						owner_id,
						item_id = %item.item_id,
						"Skipping Ready item without a usable embedding."
					);
				},
			}
		}

		let index = Arc::clone(&self.index);
		let owner = owner_id.to_string();
		let rebuilt_count =
			tokio::task::spawn_blocking(move || index.rebuild_owner(&owner, entries))
				.await
				.map_err(|err| Error::Internal {
					message: format!("Index rebuild task failed: {err}."),
				})??;

		Ok(RebuildReport { owners: 1, rebuilt_count, skipped_count })
	}

	pub fn stats(&self) -> IndexStats {
		self.index.stats()
	}
}
