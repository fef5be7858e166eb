use std::collections::BTreeMap;

use uuid::Uuid;

use sift_domain::{ContentFields, ItemStatus};
use sift_service::{SearchRequest, SiftService};
use sift_testkit::TestDatabase;

fn config_for(test_db: &TestDatabase) -> sift_config::Config {
	sift_config::parse(&format!(
		r#"
[storage.postgres]
dsn            = "{}"
pool_max_conns = 2

[index]
vector_dim = 3
"#,
		test_db.dsn()
	))
	.expect("Test config must be valid.")
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SIFT_PG_DSN to run."]
async fn search_and_rebuild_against_postgres() {
	let Some(base_dsn) = sift_testkit::env_dsn() else {
		eprintln!(
			"Skipping search_and_rebuild_against_postgres; set SIFT_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = SiftService::connect(config_for(&test_db)).await.expect("Failed to connect.");
	let item_id = Uuid::new_v4();
	let fields =
		ContentFields { summary: Some("quarterly report".to_string()), ..Default::default() };

	service
		.upsert_content("owner-a", item_id, fields.clone(), ItemStatus::Processing)
		.await
		.expect("Upsert must succeed.");
	service.set_embedding(item_id, vec![1.0, 0.0, 0.0]).await.expect("Embedding must succeed.");
	service
		.upsert_content("owner-a", item_id, fields, ItemStatus::Ready)
		.await
		.expect("Upsert must succeed.");
	service
		.set_weights("owner-a", &BTreeMap::from([("summary".to_string(), 1.0)]))
		.await
		.expect("Weights must save.");

	let request = SearchRequest {
		owner_id: "owner-a".to_string(),
		vector: vec![0.9, 0.1, 0.0],
		threshold: None,
		limit: None,
	};
	let results = service.search(request.clone()).await.expect("Search must succeed.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].item_id, item_id);
	assert_eq!(results[0].boost, 1.0);

	// A fresh engine over the same database serves the same results after bootstrap.
	let restarted = SiftService::connect(config_for(&test_db)).await.expect("Failed to connect.");
	let (report, sync) = restarted.bootstrap().await.expect("Bootstrap must succeed.");

	assert_eq!(report.rebuilt_count, 1);
	assert!(sync.cursor() > 0);
	assert_eq!(
		restarted.search(request).await.expect("Search must succeed.")[0].item_id,
		item_id
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
