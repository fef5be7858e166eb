//! Change-feed synchronisation.
//!
//! Writes made through this service reach the index synchronously. Writes made by other
//! processes show up in the store's change feed; `IndexSync` polls it and re-applies the
//! lifecycle gate to every item it names, so index staleness is bounded by the poll interval.

use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
	time::{Duration, Instant},
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{GateOutcome, RebuildReport, Result, SiftService};

const PURGE_INTERVAL: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
	pub changes: usize,
	pub admitted: usize,
	pub revoked: usize,
	pub cursor: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
	pub purged_changes: u64,
	pub dropped_owners: usize,
	pub shrunk_owners: usize,
	pub pruned_locks: usize,
}

pub struct IndexSync {
	cursor: i64,
	batch_size: u32,
	poll_interval: Duration,
	retention: time::Duration,
	last_purge: Instant,
}
impl IndexSync {
	/// A sync that will apply every change after `cursor`.
	pub fn new(cfg: &sift_config::IndexSync, cursor: i64) -> Self {
		Self {
			cursor,
			batch_size: cfg.batch_size,
			poll_interval: Duration::from_millis(cfg.poll_interval_ms),
			retention: time::Duration::hours(cfg.change_retention_hours),
			last_purge: Instant::now(),
		}
	}

	pub fn cursor(&self) -> i64 {
		self.cursor
	}

	/// Applies at most one batch of changes.
	pub async fn sync_once(&mut self, service: &SiftService) -> Result<SyncReport> {
		let changes = service.changes_since(self.cursor, self.batch_size).await?;
		let Some(last_seq) = changes.last().map(|change| change.seq) else {
			return Ok(SyncReport { cursor: self.cursor, ..Default::default() });
		};
		let mut report =
			SyncReport { changes: changes.len(), cursor: last_seq, ..Default::default() };
		let mut by_owner: BTreeMap<String, BTreeSet<Uuid>> = BTreeMap::new();

		for change in changes {
			by_owner.entry(change.owner_id).or_default().insert(change.item_id);
		}
		for (owner_id, item_ids) in by_owner {
			let _guard = service.locks.lock(&owner_id).await;
			let item_ids: Vec<Uuid> = item_ids.into_iter().collect();
			let mut current: BTreeMap<Uuid, _> = service
				.fetch_items(&owner_id, &item_ids)
				.await?
				.into_iter()
				.map(|item| (item.item_id, item))
				.collect();
			let gate = service.gate();

			for item_id in item_ids {
				let outcome = match current.remove(&item_id) {
					Some(item) => gate.apply(&item)?,
					None if gate.revoke(&owner_id, item_id) => GateOutcome::Revoked,
					None => GateOutcome::Absent,
				};

				match outcome {
					GateOutcome::Admitted => report.admitted += 1,
					GateOutcome::Revoked => report.revoked += 1,
					GateOutcome::Absent => {},
				}
			}
		}

		self.cursor = last_seq;

		Ok(report)
	}

	/// Applies batches until the feed is drained.
	pub async fn drain(&mut self, service: &SiftService) -> Result<SyncReport> {
		let mut total = SyncReport { cursor: self.cursor, ..Default::default() };

		loop {
			let report = self.sync_once(service).await?;

			total.changes += report.changes;
			total.admitted += report.admitted;
			total.revoked += report.revoked;
			total.cursor = report.cursor;

			if report.changes < self.batch_size as usize {
				return Ok(total);
			}
		}
	}

	/// Drops expired change rows and releases index memory held by removed items.
	pub async fn purge(&mut self, service: &SiftService) -> Result<PurgeReport> {
		let before = OffsetDateTime::now_utc() - self.retention;
		let store = &service.content_store;
		let purged_changes =
			service.retry.run("purge_changes", move || store.purge_changes(before)).await?;
		let compact = service.index.compact();
		let pruned_locks = service.locks.prune();

		self.last_purge = Instant::now();

		Ok(PurgeReport {
			purged_changes,
			dropped_owners: compact.dropped_owners,
			shrunk_owners: compact.shrunk_owners,
			pruned_locks,
		})
	}

	/// Polls the change feed until `shutdown` flips to true or its sender is dropped.
	pub async fn run(mut self, service: Arc<SiftService>, mut shutdown: watch::Receiver<bool>) {
		tracing::info!(cursor = self.cursor, "Index sync started.");

		loop {
			if *shutdown.borrow() {
				break;
			}

			match self.drain(&service).await {
				Ok(report) if report.changes > 0 => tracing::info!(
					changes = report.changes,
					admitted = report.admitted,
					revoked = report.revoked,
					cursor = report.cursor,
					"Applied index changes."
				),
				Ok(_) => {},
				Err(err) => tracing::error!(error = %err, "Index sync batch failed."),
			}

			if self.last_purge.elapsed() >= PURGE_INTERVAL {
				match self.purge(&service).await {
					Ok(report) => tracing::info!(
						purged_changes = report.purged_changes,
						dropped_owners = report.dropped_owners,
						shrunk_owners = report.shrunk_owners,
						"Purged index change feed."
					),
					Err(err) => tracing::error!(error = %err, "Index change purge failed."),
				}
			}

			tokio::select! {
				_ = tokio::time::sleep(self.poll_interval) => {},
				changed = shutdown.changed() => {
					if changed.is_err() {
						break;
					}
				},
			}
		}

		tracing::info!(cursor = self.cursor, "Index sync stopped.");
	}
}

impl SiftService {
	/// Loads every Ready item into the index and returns a sync positioned at the load point.
	///
	/// The cursor is read before the load, so changes racing the load are applied again by the
	/// sync rather than lost.
	pub async fn bootstrap(&self) -> Result<(RebuildReport, IndexSync)> {
		let cursor = self.latest_change().await?;
		let report = self.rebuild_index().await?;

		Ok((report, IndexSync::new(&self.cfg.index.sync, cursor)))
	}
}
