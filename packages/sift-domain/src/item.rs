use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{ContentFields, vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
	Pending,
	Processing,
	Ready,
	Failed,
}
impl ItemStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Ready => "ready",
			Self::Failed => "failed",
		}
	}
}
impl fmt::Display for ItemStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for ItemStatus {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"pending" => Ok(Self::Pending),
			"processing" => Ok(Self::Processing),
			"ready" => Ok(Self::Ready),
			"failed" => Ok(Self::Failed),
			other => Err(format!("Unknown item status {other:?}.")),
		}
	}
}

/// Canonical record of one uploaded item.
///
/// The record never stamps itself implicitly: every mutating method takes `now` and writes
/// `updated_at` from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
	pub item_id: Uuid,
	pub owner_id: String,
	pub fields: ContentFields,
	pub status: ItemStatus,
	pub embedding: Option<Vec<f32>>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
impl UploadItem {
	pub fn new(
		item_id: Uuid,
		owner_id: impl Into<String>,
		fields: ContentFields,
		now: OffsetDateTime,
	) -> Self {
		Self {
			item_id,
			owner_id: owner_id.into(),
			fields,
			status: ItemStatus::Pending,
			embedding: None,
			created_at: now,
			updated_at: now,
		}
	}

	/// Moves the item to `status`.
	///
	/// Leaving `Ready` drops the embedding, as does entering `Failed`. An embedding staged while
	/// `Processing` survives the move to `Ready`.
	pub fn transition(&mut self, status: ItemStatus, now: OffsetDateTime) {
		let leaving_ready = self.status == ItemStatus::Ready && status != ItemStatus::Ready;

		if leaving_ready || status == ItemStatus::Failed {
			self.embedding = None;
		}

		self.status = status;
		self.updated_at = now;
	}

	pub fn mark_processing(&mut self, now: OffsetDateTime) {
		self.transition(ItemStatus::Processing, now);
	}

	pub fn mark_ready(&mut self, now: OffsetDateTime) {
		self.transition(ItemStatus::Ready, now);
	}

	pub fn mark_failed(&mut self, now: OffsetDateTime) {
		self.transition(ItemStatus::Failed, now);
	}

	pub fn set_embedding(&mut self, embedding: Vec<f32>, now: OffsetDateTime) {
		self.embedding = Some(embedding);
		self.updated_at = now;
	}

	pub fn replace_fields(&mut self, fields: ContentFields, now: OffsetDateTime) {
		self.fields = fields;
		self.updated_at = now;
	}

	/// The embedding the index may hold for this item, if any.
	///
	/// Only a `Ready` item with a correctly sized, finite, non-zero vector qualifies.
	pub fn indexable_embedding(&self, vector_dim: usize) -> Option<&[f32]> {
		if self.status != ItemStatus::Ready {
			return None;
		}

		let embedding = self.embedding.as_deref()?;

		if vector::validate_vector(embedding, vector_dim).is_err() {
			return None;
		}
		if vector::is_degenerate(embedding) {
			return None;
		}

		Some(embedding)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ts(seconds: i64) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(seconds).expect("Valid timestamp.")
	}

	fn item() -> UploadItem {
		UploadItem::new(
			Uuid::new_v4(),
			"owner-a",
			ContentFields {
				raw_text_content: Some("apple pie recipe".to_string()),
				..Default::default()
			},
			ts(10),
		)
	}

	#[test]
	fn new_items_start_pending_without_embedding() {
		let item = item();

		assert_eq!(item.status, ItemStatus::Pending);
		assert!(item.embedding.is_none());
		assert_eq!(item.created_at, item.updated_at);
	}

	#[test]
	fn staged_embedding_survives_move_to_ready() {
		let mut item = item();

		item.mark_processing(ts(11));
		item.set_embedding(vec![1.0, 0.0, 0.0], ts(12));
		item.mark_ready(ts(13));

		assert_eq!(item.indexable_embedding(3), Some(&[1.0, 0.0, 0.0][..]));
		assert_eq!(item.updated_at, ts(13));
	}

	#[test]
	fn leaving_ready_drops_embedding() {
		let mut item = item();

		item.set_embedding(vec![1.0, 0.0, 0.0], ts(11));
		item.mark_ready(ts(12));
		item.mark_processing(ts(13));

		assert!(item.embedding.is_none());
		assert!(item.indexable_embedding(3).is_none());
	}

	#[test]
	fn failure_drops_staged_embedding() {
		let mut item = item();

		item.mark_processing(ts(11));
		item.set_embedding(vec![0.5, 0.5, 0.0], ts(12));
		item.mark_failed(ts(13));

		assert!(item.embedding.is_none());
	}

	#[test]
	fn degenerate_or_mis_sized_embeddings_are_not_indexable() {
		let mut item = item();

		item.set_embedding(vec![0.0, 0.0, 0.0], ts(11));
		item.mark_ready(ts(12));

		assert!(item.indexable_embedding(3).is_none());

		item.set_embedding(vec![1.0, 0.0], ts(13));

		assert!(item.indexable_embedding(3).is_none());
	}

	#[test]
	fn status_parses_case_insensitively() {
		assert_eq!("READY".parse::<ItemStatus>(), Ok(ItemStatus::Ready));
		assert!("archived".parse::<ItemStatus>().is_err());
	}

	#[test]
	fn item_serializes_timestamps_as_rfc3339() {
		let value = serde_json::to_value(item()).expect("Failed to encode item.");

		assert_eq!(value["created_at"], "1970-01-01T00:00:10Z");
		assert_eq!(value["status"], "pending");
	}
}
