use std::cmp::Ordering;

use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::UploadItem;

/// A Ready record paired with its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredItem {
	pub item: UploadItem,
	pub similarity: f32,
}

/// Keeps candidates strictly above `threshold`, orders them, and cuts the list at `limit`.
///
/// Order is similarity descending, then newest `created_at` first, then ascending item id.
/// No candidate above the threshold yields an empty list.
pub fn rank(candidates: Vec<ScoredItem>, threshold: f32, limit: usize) -> Vec<ScoredItem> {
	let mut kept: Vec<ScoredItem> =
		candidates.into_iter().filter(|candidate| candidate.similarity > threshold).collect();

	kept.sort_by(|left, right| {
		cmp_scores(
			(left.similarity, left.item.created_at, left.item.item_id),
			(right.similarity, right.item.created_at, right.item.item_id),
		)
	});
	kept.truncate(limit);

	kept
}

/// Shared ordering for ranked and blended lists.
pub(crate) fn cmp_scores(
	left: (f32, OffsetDateTime, Uuid),
	right: (f32, OffsetDateTime, Uuid),
) -> Ordering {
	right
		.0
		.partial_cmp(&left.0)
		.unwrap_or(Ordering::Equal)
		.then_with(|| right.1.cmp(&left.1))
		.then_with(|| left.2.cmp(&right.2))
}

#[cfg(test)]
mod tests {
	use sift_domain::ContentFields;

	use super::*;

	fn scored(n: u128, similarity: f32, created_at: i64) -> ScoredItem {
		let created_at =
			OffsetDateTime::from_unix_timestamp(created_at).expect("Valid timestamp.");

		let item =
			UploadItem::new(Uuid::from_u128(n), "owner-a", ContentFields::default(), created_at);

		ScoredItem { item, similarity }
	}

	fn ids(ranked: &[ScoredItem]) -> Vec<u128> {
		ranked.iter().map(|candidate| candidate.item.item_id.as_u128()).collect()
	}

	#[test]
	fn threshold_is_strict() {
		let ranked = rank(vec![scored(1, 0.7, 0), scored(2, 0.71, 0)], 0.7, 10);

		assert_eq!(ids(&ranked), vec![2]);
	}

	#[test]
	fn ties_prefer_newer_items() {
		let ranked = rank(vec![scored(1, 0.75, 100), scored(2, 0.75, 200)], 0.7, 10);

		assert_eq!(ids(&ranked), vec![2, 1]);
	}

	#[test]
	fn full_ties_fall_back_to_item_id() {
		let ranked = rank(vec![scored(9, 0.8, 5), scored(3, 0.8, 5)], 0.7, 10);

		assert_eq!(ids(&ranked), vec![3, 9]);
	}

	#[test]
	fn truncates_after_sorting() {
		let ranked =
			rank(vec![scored(1, 0.81, 0), scored(2, 0.99, 0), scored(3, 0.9, 0)], 0.0, 2);

		assert_eq!(ids(&ranked), vec![2, 3]);
	}

	#[test]
	fn nothing_above_threshold_is_empty() {
		assert!(rank(vec![scored(1, 0.9, 0)], 0.95, 10).is_empty());
	}

	#[test]
	fn raising_the_threshold_never_adds_results() {
		let candidates: Vec<ScoredItem> =
			(0..20).map(|n| scored(n, n as f32 / 10.0 - 1.0, n as i64)).collect();
		let mut previous = usize::MAX;

		for step in 0..=20 {
			let threshold = step as f32 / 10.0 - 1.0;
			let count = rank(candidates.clone(), threshold, 100).len();

			assert!(count <= previous);

			previous = count;
		}
	}
}
