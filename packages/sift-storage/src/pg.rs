use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{FieldWeights, UploadItem, WeightProfile};

use crate::{
	BoxFuture, ContentStore, Error, Result, WeightStore,
	db::Db,
	models::{IndexChange, UploadItemRow, WeightProfileRow},
};

const ITEM_COLUMNS: &str = "\
item_id,
\towner_id,
\traw_text_content,
\timage_caption,
\tocr_text,
\tsummary,
\ttranscript_text,
\tstatus,
\tembedding,
\tcreated_at,
\tupdated_at";

/// Postgres-backed content and weight stores sharing one pool.
pub struct PgStore {
	db: Db,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	pub fn db(&self) -> &Db {
		&self.db
	}

	async fn fetch_item_row(&self, item_id: Uuid) -> Result<Option<UploadItem>> {
		let sql = format!("SELECT\n\t{ITEM_COLUMNS}\nFROM upload_items\nWHERE item_id = $1");
		let row = sqlx::query_as::<_, UploadItemRow>(&sql)
			.bind(item_id)
			.fetch_optional(&self.db.pool)
			.await?;

		row.map(UploadItem::try_from).transpose()
	}

	async fn fetch_item_rows(&self, owner_id: &str, item_ids: &[Uuid]) -> Result<Vec<UploadItem>> {
		if item_ids.is_empty() {
			return Ok(Vec::new());
		}

		let sql = format!(
			"SELECT\n\t{ITEM_COLUMNS}\nFROM upload_items\nWHERE owner_id = $1 AND item_id = ANY($2)"
		);
		let rows = sqlx::query_as::<_, UploadItemRow>(&sql)
			.bind(owner_id)
			.bind(item_ids)
			.fetch_all(&self.db.pool)
			.await?;

		rows.into_iter().map(UploadItem::try_from).collect()
	}

	async fn save_item_row(&self, item: &UploadItem) -> Result<()> {
		let mut tx = self.db.pool.begin().await?;

		sqlx::query(
			"\
INSERT INTO upload_items (
\titem_id,
\towner_id,
\traw_text_content,
\timage_caption,
\tocr_text,
\tsummary,
\ttranscript_text,
\tstatus,
\tembedding,
\tcreated_at,
\tupdated_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
ON CONFLICT (item_id) DO UPDATE
SET raw_text_content = EXCLUDED.raw_text_content,
\timage_caption = EXCLUDED.image_caption,
\tocr_text = EXCLUDED.ocr_text,
\tsummary = EXCLUDED.summary,
\ttranscript_text = EXCLUDED.transcript_text,
\tstatus = EXCLUDED.status,
\tembedding = EXCLUDED.embedding,
\tupdated_at = EXCLUDED.updated_at
WHERE upload_items.owner_id = EXCLUDED.owner_id",
		)
		.bind(item.item_id)
		.bind(item.owner_id.as_str())
		.bind(item.fields.raw_text_content.as_deref())
		.bind(item.fields.image_caption.as_deref())
		.bind(item.fields.ocr_text.as_deref())
		.bind(item.fields.summary.as_deref())
		.bind(item.fields.transcript_text.as_deref())
		.bind(item.status.as_str())
		.bind(item.embedding.as_deref())
		.bind(item.created_at)
		.bind(item.updated_at)
		.execute(&mut *tx)
		.await?;
		sqlx::query("INSERT INTO index_changes (item_id, owner_id) VALUES ($1,$2)")
			.bind(item.item_id)
			.bind(item.owner_id.as_str())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		Ok(())
	}

	async fn delete_item_row(&self, item_id: Uuid) -> Result<bool> {
		let mut tx = self.db.pool.begin().await?;
		let owner_id: Option<String> =
			sqlx::query_scalar("DELETE FROM upload_items WHERE item_id = $1 RETURNING owner_id")
				.bind(item_id)
				.fetch_optional(&mut *tx)
				.await?;
		let Some(owner_id) = owner_id else {
			tx.rollback().await?;

			return Ok(false);
		};

		sqlx::query("INSERT INTO index_changes (item_id, owner_id) VALUES ($1,$2)")
			.bind(item_id)
			.bind(owner_id.as_str())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		Ok(true)
	}

	async fn list_ready_rows(&self, owner_id: Option<&str>) -> Result<Vec<UploadItem>> {
		let sql = format!(
			"\
SELECT
	{ITEM_COLUMNS}
FROM upload_items
WHERE status = 'ready' AND ($1::text IS NULL OR owner_id = $1)
ORDER BY owner_id ASC, item_id ASC"
		);
		let rows = sqlx::query_as::<_, UploadItemRow>(&sql)
			.bind(owner_id)
			.fetch_all(&self.db.pool)
			.await?;

		rows.into_iter().map(UploadItem::try_from).collect()
	}

	async fn change_rows_since(&self, cursor: i64, limit: u32) -> Result<Vec<IndexChange>> {
		let rows = sqlx::query_as::<_, IndexChange>(
			"\
SELECT seq, item_id, owner_id, created_at
FROM index_changes
WHERE seq > $1
ORDER BY seq ASC
LIMIT $2",
		)
		.bind(cursor)
		.bind(i64::from(limit))
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows)
	}

	async fn latest_change_seq(&self) -> Result<i64> {
		let seq: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM index_changes")
			.fetch_one(&self.db.pool)
			.await?;

		Ok(seq)
	}

	async fn purge_change_rows(&self, before: OffsetDateTime) -> Result<u64> {
		let result = sqlx::query("DELETE FROM index_changes WHERE created_at < $1")
			.bind(before)
			.execute(&self.db.pool)
			.await?;

		Ok(result.rows_affected())
	}

	async fn fetch_profile_row(&self, owner_id: &str) -> Result<Option<WeightProfile>> {
		let row = sqlx::query_as::<_, WeightProfileRow>(
			"SELECT owner_id, weights, updated_at FROM user_weight_profiles WHERE owner_id = $1",
		)
		.bind(owner_id)
		.fetch_optional(&self.db.pool)
		.await?;

		row.map(decode_profile).transpose()
	}

	async fn save_profile_row(&self, profile: &WeightProfile) -> Result<bool> {
		let Some(updated_at) = profile.updated_at else {
			return Err(Error::InvalidArgument(
				"Weight profiles must carry updated_at when saved.".to_string(),
			));
		};
		let weights = serde_json::to_value(profile.weights.to_named())
			.map_err(|err| Error::InvalidArgument(format!("Failed to encode weights: {err}.")))?;
		let result = sqlx::query(
			"\
INSERT INTO user_weight_profiles (owner_id, weights, updated_at)
VALUES ($1,$2,$3)
ON CONFLICT (owner_id) DO UPDATE
SET weights = EXCLUDED.weights,
\tupdated_at = EXCLUDED.updated_at
WHERE user_weight_profiles.updated_at <= EXCLUDED.updated_at",
		)
		.bind(profile.owner_id.as_str())
		.bind(weights)
		.bind(updated_at)
		.execute(&self.db.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}
}
impl ContentStore for PgStore {
	fn fetch_item<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<Option<UploadItem>>> {
		Box::pin(self.fetch_item_row(item_id))
	}

	fn fetch_items<'a>(
		&'a self,
		owner_id: &'a str,
		item_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<UploadItem>>> {
		Box::pin(self.fetch_item_rows(owner_id, item_ids))
	}

	fn save_item<'a>(&'a self, item: &'a UploadItem) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.save_item_row(item))
	}

	fn delete_item<'a>(&'a self, item_id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.delete_item_row(item_id))
	}

	fn list_ready<'a>(
		&'a self,
		owner_id: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<UploadItem>>> {
		Box::pin(self.list_ready_rows(owner_id))
	}

	fn changes_since<'a>(
		&'a self,
		cursor: i64,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<IndexChange>>> {
		Box::pin(self.change_rows_since(cursor, limit))
	}

	fn latest_change<'a>(&'a self) -> BoxFuture<'a, Result<i64>> {
		Box::pin(self.latest_change_seq())
	}

	fn purge_changes<'a>(&'a self, before: OffsetDateTime) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.purge_change_rows(before))
	}
}
impl WeightStore for PgStore {
	fn fetch_profile<'a>(
		&'a self,
		owner_id: &'a str,
	) -> BoxFuture<'a, Result<Option<WeightProfile>>> {
		Box::pin(self.fetch_profile_row(owner_id))
	}

	fn save_profile<'a>(&'a self, profile: &'a WeightProfile) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.save_profile_row(profile))
	}
}

fn decode_profile(row: WeightProfileRow) -> Result<WeightProfile> {
	let named: BTreeMap<String, f32> = serde_json::from_value(row.weights).map_err(|err| {
		Error::Decode(format!("Weights of owner {:?} are not a field map: {err}.", row.owner_id))
	})?;
	let weights = FieldWeights::from_named(&named).map_err(|err| {
		Error::Decode(format!("Weights of owner {:?} are invalid: {err}", row.owner_id))
	})?;

	Ok(WeightProfile { owner_id: row.owner_id, weights, updated_at: Some(row.updated_at) })
}
