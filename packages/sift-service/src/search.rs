use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{ItemStatus, UploadItem};

use crate::{
	Error, Result, SiftService,
	blend::{BlendedItem, FieldContribution},
	ranking::{self, ScoredItem},
};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
	pub owner_id: String,
	pub vector: Vec<f32>,
	/// Defaults to `search.default_threshold`.
	#[serde(default)]
	pub threshold: Option<f32>,
	/// Defaults to `search.default_limit`.
	#[serde(default)]
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
	pub item_id: Uuid,
	pub base_similarity: f32,
	pub boost: f32,
	pub blended_score: f32,
	pub snippet: Option<String>,
	pub fields: Vec<FieldContribution>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl SearchResult {
	fn from_blended(blended: BlendedItem, snippet_chars: usize) -> Self {
		Self {
			item_id: blended.item.item_id,
			base_similarity: blended.base_similarity,
			boost: blended.boost,
			blended_score: blended.blended_score,
			snippet: blended.item.fields.snippet(snippet_chars),
			fields: blended.fields,
			created_at: blended.item.created_at,
		}
	}
}

impl SiftService {
	/// Searches the owner's Ready items.
	///
	/// The request is validated before the index is touched. The whole search runs under
	/// `search.timeout_ms`; a timeout returns no results at all. A corrupted partition is rebuilt
	/// from the content store and the corruption is still reported to the caller.
	pub async fn search(&self, req: SearchRequest) -> Result<Vec<SearchResult>> {
		let threshold = req.threshold.unwrap_or(self.cfg.search.default_threshold);
		let limit = req.limit.unwrap_or(self.cfg.search.default_limit);

		sift_domain::validate_query(
			&req.owner_id,
			&req.vector,
			threshold,
			limit,
			self.index.vector_dim(),
		)?;

		let timeout_ms = self.cfg.search.timeout_ms;
		let outcome = tokio::time::timeout(
			Duration::from_millis(timeout_ms),
			self.search_ranked(&req.owner_id, req.vector, threshold, limit as usize),
		)
		.await;

		match outcome {
			Ok(Err(Error::IndexCorruption { owner_id, message })) => {
				tracing::error!(
					owner_id = %owner_id,
					error = %message,
					"Search hit a corrupted partition. Rebuilding it from the content store."
				);

				if let Err(err) = self.rebuild_owner(&owner_id).await {
					tracing::error!(
						owner_id = %owner_id,
						error = %err,
						"Partition rebuild failed."
					);
				}

				Err(Error::IndexCorruption { owner_id, message })
			},
			Ok(result) => result,
			Err(_) => {
				tracing::warn!(owner_id = %req.owner_id, timeout_ms, "Search timed out.");

				Err(Error::Timeout { timeout_ms })
			},
		}
	}

	async fn search_ranked(
		&self,
		owner_id: &str,
		vector: Vec<f32>,
		threshold: f32,
		limit: usize,
	) -> Result<Vec<SearchResult>> {
		let candidate_k = limit.max(self.cfg.search.candidate_k as usize);
		let index = Arc::clone(&self.index);
		let owner = owner_id.to_string();
		let candidates = tokio::task::spawn_blocking(move || {
			index.query_with_ties(&owner, &vector, candidate_k)
		})
		.await
		.map_err(|err| Error::Internal { message: format!("Index query task failed: {err}.") })??;

		// Candidates past `candidate_k` are only legitimate as ties with the last one that fit.
		// The ranker settles those ties by recency.
		let boundary = candidates.get(candidate_k.saturating_sub(1)).map(|last| last.similarity);
		let overflow = candidates.get(candidate_k..).unwrap_or_default();

		if overflow.iter().any(|candidate| Some(candidate.similarity) != boundary) {
			self.index.mark_corrupted(owner_id);

			return Err(Error::IndexCorruption {
				owner_id: owner_id.to_string(),
				message: format!(
					"Index returned {} candidates for a request of {candidate_k}.",
					candidates.len()
				),
			});
		}

		let above: Vec<(Uuid, f32)> = candidates
			.into_iter()
			.filter(|candidate| candidate.similarity > threshold)
			.map(|candidate| (candidate.item_id, candidate.similarity))
			.collect();

		if above.is_empty() {
			return Ok(Vec::new());
		}

		let ids: Vec<Uuid> = above.iter().map(|(item_id, _)| *item_id).collect();
		let mut ready: HashMap<Uuid, UploadItem> = self
			.fetch_items(owner_id, &ids)
			.await?
			.into_iter()
			.filter(|item| item.status == ItemStatus::Ready)
			.map(|item| (item.item_id, item))
			.collect();
		// Items that left Ready after the index answered are dropped here.
		let scored: Vec<ScoredItem> = above
			.into_iter()
			.filter_map(|(item_id, similarity)| {
				ready.remove(&item_id).map(|item| ScoredItem { item, similarity })
			})
			.collect();
		let ranked = ranking::rank(scored, threshold, limit);

		if ranked.is_empty() {
			return Ok(Vec::new());
		}

		let profile = self.fetch_profile(owner_id).await?;
		let blended = self.blender.blend_all(owner_id, ranked, profile.as_ref())?;
		let snippet_chars = self.cfg.search.snippet_chars as usize;

		tracing::debug!(owner_id, results = blended.len(), "Search completed.");

		Ok(blended
			.into_iter()
			.map(|item| SearchResult::from_blended(item, snippet_chars))
			.collect())
	}
}
