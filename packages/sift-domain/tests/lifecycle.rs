use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{ContentFields, ItemStatus, UploadItem, WeightProfile};

fn ts(seconds: i64) -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp(seconds).expect("Valid timestamp.")
}

#[test]
fn failed_item_can_be_reprocessed_into_ready() {
	let mut item = UploadItem::new(
		Uuid::new_v4(),
		"owner-a",
		ContentFields {
			transcript_text: Some("weekly sync notes".to_string()),
			..Default::default()
		},
		ts(1),
	);

	item.mark_processing(ts(2));
	item.mark_failed(ts(3));

	assert_eq!(item.status, ItemStatus::Failed);
	assert!(item.indexable_embedding(2).is_none());

	item.mark_processing(ts(4));
	item.set_embedding(vec![0.6, 0.8], ts(5));

	assert!(item.indexable_embedding(2).is_none(), "Processing items are never indexable.");

	item.mark_ready(ts(6));

	assert_eq!(item.indexable_embedding(2), Some(&[0.6, 0.8][..]));
	assert_eq!(item.created_at, ts(1));
	assert_eq!(item.updated_at, ts(6));
}

#[test]
fn weight_profile_round_trips_through_json() {
	let mut profile = WeightProfile::uniform("owner-a");

	profile.weights.image_caption = 0.9;
	profile.updated_at = Some(ts(42));

	let encoded = serde_json::to_string(&profile).expect("Failed to encode profile.");
	let decoded: WeightProfile = serde_json::from_str(&encoded).expect("Failed to decode profile.");

	assert_eq!(decoded, profile);

	let default_json = serde_json::to_value(WeightProfile::uniform("owner-b"))
		.expect("Failed to encode default profile.");

	assert!(default_json["updated_at"].is_null());
}
