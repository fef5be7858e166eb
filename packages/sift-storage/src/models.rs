use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{ContentFields, ItemStatus, UploadItem};

use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
pub struct UploadItemRow {
	pub item_id: Uuid,
	pub owner_id: String,
	pub raw_text_content: Option<String>,
	pub image_caption: Option<String>,
	pub ocr_text: Option<String>,
	pub summary: Option<String>,
	pub transcript_text: Option<String>,
	pub status: String,
	pub embedding: Option<Vec<f32>>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl TryFrom<UploadItemRow> for UploadItem {
	type Error = Error;

	fn try_from(row: UploadItemRow) -> Result<Self> {
		let status = row.status.parse::<ItemStatus>().map_err(|err| {
			Error::Decode(format!("Item {} has an invalid status: {err}", row.item_id))
		})?;

		Ok(Self {
			item_id: row.item_id,
			owner_id: row.owner_id,
			fields: ContentFields {
				raw_text_content: row.raw_text_content,
				image_caption: row.image_caption,
				ocr_text: row.ocr_text,
				summary: row.summary,
				transcript_text: row.transcript_text,
			},
			status,
			embedding: row.embedding,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

/// One content mutation observed by the change feed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IndexChange {
	pub seq: i64,
	pub item_id: Uuid,
	pub owner_id: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct WeightProfileRow {
	pub owner_id: String,
	pub weights: serde_json::Value,
	pub updated_at: OffsetDateTime,
}
