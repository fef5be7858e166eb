//! Per-owner semantic search with personalized re-ranking.
//!
//! `SiftService` ties the embedding index to the content and weight stores. Writes go through the
//! lifecycle gate so the index only ever holds Ready items; searches run the index, the ranker,
//! and the blender in that order.

pub mod admin;
pub mod blend;
pub mod gate;
pub mod ingest;
pub mod items;
pub mod ranking;
pub mod retry;
pub mod search;
pub mod sync;
pub mod weights;

mod error;
mod locks;

pub use admin::RebuildReport;
pub use blend::{BlendedItem, Blender, FieldContribution};
pub use error::{Error, Result};
pub use gate::{GateOutcome, LifecycleGate};
pub use ranking::{ScoredItem, rank};
pub use retry::RetryPolicy;
pub use search::{SearchRequest, SearchResult};
pub use sync::{IndexSync, PurgeReport, SyncReport};

use std::sync::Arc;

use uuid::Uuid;

use sift_config::Config;
use sift_domain::{UploadItem, WeightProfile};
use sift_index::EmbeddingIndex;
use sift_storage::{ContentStore, IndexChange, MemoryStore, PgStore, WeightStore, db::Db};

use locks::OwnerLocks;

pub struct SiftService {
	pub cfg: Config,
	pub index: Arc<EmbeddingIndex>,
	pub content_store: Arc<dyn ContentStore>,
	pub weight_store: Arc<dyn WeightStore>,
	retry: RetryPolicy,
	blender: Blender,
	locks: OwnerLocks,
}
impl SiftService {
	pub fn new(
		cfg: Config,
		content_store: Arc<dyn ContentStore>,
		weight_store: Arc<dyn WeightStore>,
	) -> Self {
		let index = Arc::new(EmbeddingIndex::new(&cfg.index));
		let retry = RetryPolicy::from(&cfg.storage.retry);
		let blender = Blender::new(&cfg.ranking);

		Self {
			cfg,
			index,
			content_store,
			weight_store,
			retry,
			blender,
			locks: OwnerLocks::default(),
		}
	}

	/// A service backed by one process-local store.
	pub fn in_memory(cfg: Config) -> Self {
		let store = Arc::new(MemoryStore::new());

		Self::new(cfg, store.clone(), store)
	}

	/// Connects to Postgres, applies the schema, and builds a service on top of it.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let postgres = cfg.storage.postgres.clone();
		let retry = RetryPolicy::from(&cfg.storage.retry);
		let db = retry.run("connect", || Db::connect(&postgres)).await?;

		retry.run("ensure_schema", || db.ensure_schema(cfg.index.vector_dim)).await?;

		let store = Arc::new(PgStore::new(db));

		Ok(Self::new(cfg, store.clone(), store))
	}

	pub fn gate(&self) -> LifecycleGate<'_> {
		LifecycleGate::new(&self.index)
	}

	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry
	}

	pub(crate) async fn fetch_item(&self, item_id: Uuid) -> Result<Option<UploadItem>> {
		let store = &self.content_store;

		self.retry.run("fetch_item", move || store.fetch_item(item_id)).await
	}

	pub(crate) async fn fetch_items(
		&self,
		owner_id: &str,
		item_ids: &[Uuid],
	) -> Result<Vec<UploadItem>> {
		let store = &self.content_store;

		self.retry.run("fetch_items", move || store.fetch_items(owner_id, item_ids)).await
	}

	pub(crate) async fn save_item(&self, item: &UploadItem) -> Result<()> {
		let store = &self.content_store;

		self.retry.run("save_item", move || store.save_item(item)).await
	}

	pub(crate) async fn remove_item(&self, item_id: Uuid) -> Result<bool> {
		let store = &self.content_store;

		self.retry.run("delete_item", move || store.delete_item(item_id)).await
	}

	pub(crate) async fn list_ready(&self, owner_id: Option<&str>) -> Result<Vec<UploadItem>> {
		let store = &self.content_store;

		self.retry.run("list_ready", move || store.list_ready(owner_id)).await
	}

	pub(crate) async fn changes_since(&self, cursor: i64, limit: u32) -> Result<Vec<IndexChange>> {
		let store = &self.content_store;

		self.retry.run("changes_since", move || store.changes_since(cursor, limit)).await
	}

	pub(crate) async fn latest_change(&self) -> Result<i64> {
		let store = &self.content_store;

		self.retry.run("latest_change", move || store.latest_change()).await
	}

	pub(crate) async fn fetch_profile(&self, owner_id: &str) -> Result<Option<WeightProfile>> {
		let store = &self.weight_store;

		self.retry.run("fetch_profile", move || store.fetch_profile(owner_id)).await
	}

	pub(crate) async fn save_profile(&self, profile: &WeightProfile) -> Result<bool> {
		let store = &self.weight_store;

		self.retry.run("save_profile", move || store.save_profile(profile)).await
	}
}

pub(crate) fn require_owner(owner_id: &str) -> Result<()> {
	if owner_id.trim().is_empty() {
		return Err(Error::UnauthorizedAccess {
			message: "Owner id must be non-empty.".to_string(),
		});
	}

	Ok(())
}
