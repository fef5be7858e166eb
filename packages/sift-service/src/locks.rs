use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per owner. Caller writes, gate application and sync for an owner all take it.
#[derive(Default)]
pub(crate) struct OwnerLocks {
	locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}
impl OwnerLocks {
	pub(crate) async fn lock(&self, owner_id: &str) -> OwnedMutexGuard<()> {
		let lock = {
			let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

			locks.entry(owner_id.to_string()).or_default().clone()
		};

		lock.lock_owned().await
	}

	/// Forgets locks nobody is holding or waiting on. Returns how many were dropped.
	pub(crate) fn prune(&self) -> usize {
		let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());
		let before = locks.len();

		locks.retain(|_, lock| Arc::strong_count(lock) > 1);

		before - locks.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn prune_keeps_held_locks() {
		let locks = OwnerLocks::default();
		let held = locks.lock("owner-a").await;

		drop(locks.lock("owner-b").await);

		assert_eq!(locks.prune(), 1);

		drop(held);

		assert_eq!(locks.prune(), 1);
	}
}
