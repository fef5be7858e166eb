use std::collections::BTreeMap;

use time::OffsetDateTime;

use sift_domain::{FieldWeights, WeightProfile};

use crate::{Result, SiftService};

impl SiftService {
	/// The owner's profile, or the uniform profile when none was ever written.
	pub async fn get_weights(&self, owner_id: &str) -> Result<WeightProfile> {
		crate::require_owner(owner_id)?;

		Ok(self.fetch_profile(owner_id).await?.unwrap_or_else(|| WeightProfile::uniform(owner_id)))
	}

	/// Replaces the owner's weights with `weights`, stamping `updated_at`.
	///
	/// Fields missing from `weights` are stored as 0.0. When a later write already landed, that
	/// write is kept and returned.
	pub async fn set_weights(
		&self,
		owner_id: &str,
		weights: &BTreeMap<String, f32>,
	) -> Result<WeightProfile> {
		crate::require_owner(owner_id)?;

		let weights = FieldWeights::from_named(weights)?;
		let _guard = self.locks.lock(owner_id).await;
		let profile = WeightProfile {
			owner_id: owner_id.to_string(),
			weights,
			updated_at: Some(OffsetDateTime::now_utc()),
		};

		if self.save_profile(&profile).await? {
			tracing::info!(owner_id, "Stored weight profile.");

			return Ok(profile);
		}

		tracing::warn!(owner_id, "Weight profile write lost to a later write.");

		self.get_weights(owner_id).await
	}
}
