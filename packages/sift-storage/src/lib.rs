pub mod db;
pub mod memory;
pub mod models;
pub mod pg;
pub mod schema;

mod error;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use models::IndexChange;
pub use pg::PgStore;

use std::{future::Future, pin::Pin};

use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{UploadItem, WeightProfile};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable home of every `UploadItem`.
///
/// Every write replaces the whole record and appends one row to the change feed in the same
/// transaction.
pub trait ContentStore
where
	Self: Send + Sync,
{
	fn fetch_item<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<Option<UploadItem>>>;

	/// Items of `owner_id` among `item_ids`. Ids that are missing or owned by someone else are
	/// left out.
	fn fetch_items<'a>(
		&'a self,
		owner_id: &'a str,
		item_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<UploadItem>>>;

	fn save_item<'a>(&'a self, item: &'a UploadItem) -> BoxFuture<'a, Result<()>>;

	/// Returns false when the item did not exist.
	fn delete_item<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<bool>>;

	/// Ready items, optionally limited to one owner, ordered by owner then item id.
	fn list_ready<'a>(
		&'a self,
		owner_id: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<UploadItem>>>;

	/// Change rows with `seq > cursor`, oldest first.
	fn changes_since<'a>(
		&'a self,
		cursor: i64,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<IndexChange>>>;

	/// Highest sequence number written so far, or 0.
	fn latest_change<'a>(&'a self) -> BoxFuture<'a, Result<i64>>;

	fn purge_changes<'a>(&'a self, before: OffsetDateTime) -> BoxFuture<'a, Result<u64>>;
}

/// Durable home of every `WeightProfile`.
pub trait WeightStore
where
	Self: Send + Sync,
{
	fn fetch_profile<'a>(
		&'a self,
		owner_id: &'a str,
	) -> BoxFuture<'a, Result<Option<WeightProfile>>>;

	/// Writes `profile` unless a stored profile carries a later `updated_at`.
	///
	/// Returns whether the write was applied. Profiles without `updated_at` are rejected.
	fn save_profile<'a>(&'a self, profile: &'a WeightProfile) -> BoxFuture<'a, Result<bool>>;
}
