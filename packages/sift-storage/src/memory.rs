use std::{
	collections::{BTreeMap, HashMap, VecDeque},
	sync::Mutex,
};

use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{ItemStatus, UploadItem, WeightProfile};

use crate::{BoxFuture, ContentStore, Error, Result, WeightStore, models::IndexChange};

#[derive(Default)]
struct State {
	items: HashMap<Uuid, UploadItem>,
	profiles: HashMap<String, WeightProfile>,
	changes: VecDeque<IndexChange>,
	last_seq: i64,
}
impl State {
	fn record_change(&mut self, item_id: Uuid, owner_id: &str) {
		self.last_seq += 1;
		self.changes.push_back(IndexChange {
			seq: self.last_seq,
			item_id,
			owner_id: owner_id.to_string(),
			created_at: OffsetDateTime::now_utc(),
		});
	}
}

/// Process-local store with the same contracts as the Postgres one.
///
/// Every call takes one lock, so readers always see whole records.
#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<State>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn item_count(&self) -> usize {
		self.with_state(|state| state.items.len())
	}

	fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		f(&mut state)
	}
}
impl ContentStore for MemoryStore {
	fn fetch_item<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<Option<UploadItem>>> {
		Box::pin(async move { Ok(self.with_state(|state| state.items.get(&item_id).cloned())) })
	}

	fn fetch_items<'a>(
		&'a self,
		owner_id: &'a str,
		item_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<UploadItem>>> {
		Box::pin(async move {
			Ok(self.with_state(|state| {
				item_ids
					.iter()
					.filter_map(|item_id| state.items.get(item_id))
					.filter(|item| item.owner_id == owner_id)
					.cloned()
					.collect()
			}))
		})
	}

	fn save_item<'a>(&'a self, item: &'a UploadItem) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.with_state(|state| {
				if let Some(existing) = state.items.get(&item.item_id)
					&& existing.owner_id != item.owner_id
				{
					return Err(Error::InvalidArgument(format!(
						"Item {} belongs to another owner.",
						item.item_id
					)));
				}

				state.items.insert(item.item_id, item.clone());
				state.record_change(item.item_id, &item.owner_id);

				Ok(())
			})
		})
	}

	fn delete_item<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			Ok(self.with_state(|state| {
				let Some(removed) = state.items.remove(&item_id) else {
					return false;
				};

				state.record_change(item_id, &removed.owner_id);

				true
			}))
		})
	}

	fn list_ready<'a>(
		&'a self,
		owner_id: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<UploadItem>>> {
		Box::pin(async move {
			Ok(self.with_state(|state| {
				let ready: BTreeMap<(&str, Uuid), &UploadItem> = state
					.items
					.values()
					.filter(|item| item.status == ItemStatus::Ready)
					.filter(|item| owner_id.is_none_or(|owner_id| item.owner_id == owner_id))
					.map(|item| ((item.owner_id.as_str(), item.item_id), item))
					.collect();

				ready.into_values().cloned().collect()
			}))
		})
	}

	fn changes_since<'a>(
		&'a self,
		cursor: i64,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<IndexChange>>> {
		Box::pin(async move {
			Ok(self.with_state(|state| {
				state
					.changes
					.iter()
					.filter(|change| change.seq > cursor)
					.take(limit as usize)
					.cloned()
					.collect()
			}))
		})
	}

	fn latest_change<'a>(&'a self) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move { Ok(self.with_state(|state| state.last_seq)) })
	}

	fn purge_changes<'a>(&'a self, before: OffsetDateTime) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			Ok(self.with_state(|state| {
				let len = state.changes.len();

				state.changes.retain(|change| change.created_at >= before);

				(len - state.changes.len()) as u64
			}))
		})
	}
}
impl WeightStore for MemoryStore {
	fn fetch_profile<'a>(
		&'a self,
		owner_id: &'a str,
	) -> BoxFuture<'a, Result<Option<WeightProfile>>> {
		Box::pin(async move { Ok(self.with_state(|state| state.profiles.get(owner_id).cloned())) })
	}

	fn save_profile<'a>(&'a self, profile: &'a WeightProfile) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let Some(updated_at) = profile.updated_at else {
				return Err(Error::InvalidArgument(
					"Weight profiles must carry updated_at when saved.".to_string(),
				));
			};

			Ok(self.with_state(|state| {
				let stale = state
					.profiles
					.get(&profile.owner_id)
					.and_then(|stored| stored.updated_at)
					.is_some_and(|stored_at| stored_at > updated_at);

				if stale {
					return false;
				}

				state.profiles.insert(profile.owner_id.clone(), profile.clone());

				true
			}))
		})
	}
}
