use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{ContentFields, ItemStatus, UploadItem};

use crate::{Error, Result, SiftService};

impl SiftService {
	/// Writes the canonical record for `item_id` and re-applies the lifecycle gate.
	///
	/// Unknown items are created. Leaving `Ready` or entering `Failed` drops the stored embedding
	/// and revokes the item from the index before this call returns.
	pub async fn upsert_content(
		&self,
		owner_id: &str,
		item_id: Uuid,
		fields: ContentFields,
		status: ItemStatus,
	) -> Result<UploadItem> {
		crate::require_owner(owner_id)?;

		let _guard = self.locks.lock(owner_id).await;
		let now = OffsetDateTime::now_utc();
		let item = match self.fetch_item(item_id).await? {
			Some(existing) if existing.owner_id != owner_id => {
				return Err(Error::unauthorized(owner_id, item_id));
			},
			Some(mut existing) => {
				existing.replace_fields(fields, now);

				if existing.status != status {
					existing.transition(status, now);
				}

				existing
			},
			None => {
				let mut created = UploadItem::new(item_id, owner_id, fields, now);

				if status != ItemStatus::Pending {
					created.transition(status, now);
				}

				created
			},
		};

		self.save_item(&item).await?;

		let outcome = self.gate().apply(&item)?;

		tracing::info!(
			owner_id,
			item_id = %item_id,
			status = %item.status,
			outcome = ?outcome,
			"Upserted content."
		);

		Ok(item)
	}

	/// Stores the embedding for `item_id` and re-applies the lifecycle gate.
	///
	/// The vector is validated before anything is written. Failed items do not take embeddings;
	/// they must be moved back to `Processing` first.
	pub async fn set_embedding(&self, item_id: Uuid, vector: Vec<f32>) -> Result<UploadItem> {
		sift_domain::validate_vector(&vector, self.index.vector_dim())?;

		let Some(found) = self.fetch_item(item_id).await? else {
			return Err(not_found(item_id));
		};
		let _guard = self.locks.lock(&found.owner_id).await;
		// Re-read under the owner lock so a concurrent delete is never undone.
		let mut item = match self.fetch_item(item_id).await? {
			Some(item) if item.owner_id == found.owner_id => item,
			_ => return Err(not_found(item_id)),
		};

		if item.status == ItemStatus::Failed {
			return Err(Error::InvalidVector {
				message: format!("Item {item_id} failed processing and cannot take an embedding."),
			});
		}

		item.set_embedding(vector, OffsetDateTime::now_utc());

		self.save_item(&item).await?;

		let outcome = self.gate().apply(&item)?;

		tracing::info!(
			owner_id = %item.owner_id,
			item_id = %item_id,
			outcome = ?outcome,
			"Stored embedding."
		);

		Ok(item)
	}
}

fn not_found(item_id: Uuid) -> Error {
	Error::NotFound { message: format!("Item {item_id} does not exist.") }
}
