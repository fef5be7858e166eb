use uuid::Uuid;

use sift_domain::UploadItem;

use crate::{Error, Result, SiftService};

impl SiftService {
	pub async fn get_item(&self, owner_id: &str, item_id: Uuid) -> Result<UploadItem> {
		crate::require_owner(owner_id)?;

		match self.fetch_item(item_id).await? {
			Some(item) if item.owner_id == owner_id => Ok(item),
			Some(_) => Err(Error::unauthorized(owner_id, item_id)),
			None => Err(Error::NotFound { message: format!("Item {item_id} does not exist.") }),
		}
	}

	/// Deletes the record and its index entry. Deleting a missing item succeeds and returns false.
	pub async fn delete_item(&self, owner_id: &str, item_id: Uuid) -> Result<bool> {
		crate::require_owner(owner_id)?;

		let _guard = self.locks.lock(owner_id).await;

		match self.fetch_item(item_id).await? {
			Some(item) if item.owner_id != owner_id => Err(Error::unauthorized(owner_id, item_id)),
			Some(_) => {
				let deleted = self.remove_item(item_id).await?;

				self.gate().revoke(owner_id, item_id);

				tracing::info!(owner_id, item_id = %item_id, "Deleted item.");

				Ok(deleted)
			},
			None => {
				self.gate().revoke(owner_id, item_id);

				Ok(false)
			},
		}
	}
}
