use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use tokio::time::Instant;
use uuid::Uuid;

use snapmatch_domain::{NewProduct, Product, SearchFilters, SearchSession, SimilarityResult};
use snapmatch_service::{
	AnalyzeImageRequest, ComputeState, Error, FixedDelay, SearchRequest, SnapService, TokenBucket,
	UploadedImage,
};
use snapmatch_storage::{BoxFuture, MemoryStore, NewSimilarityResult, Store};
use snapmatch_testkit::{
	FailingOracle, RecordingPacer, SCRIPTED_DESCRIPTION, ScriptedOracle, product, service_with,
	service_with_pacer, service_with_store, test_config,
};

const QUERY_IMAGE: &str = "https://images.test/query.jpg";

fn ten_products() -> Vec<NewProduct> {
	vec![
		product("Wireless Headphones", "Electronics > Audio", 199.0),
		product("Studio Monitors", "Electronics > Audio", 349.0),
		product("Mirrorless Camera", "Electronics > Cameras", 1_099.0),
		product("Action Camera", "Electronics > Cameras", 399.0),
		product("Smart Watch", "Electronics > Wearables", 299.0),
		product("Running Shoes", "Fashion > Footwear", 129.0),
		product("Leather Boots", "Fashion > Footwear", 189.0),
		product("Desk Lamp", "Home > Lighting", 49.0),
		product("Floor Lamp", "Home > Lighting", 89.0),
		product("Cordless Drill", "Tools & Hardware > Power Tools", 159.0),
	]
}

fn six_above_threshold() -> ScriptedOracle {
	ScriptedOracle::new([
		("Wireless Headphones", 0.92),
		("Studio Monitors", 0.71),
		("Mirrorless Camera", 0.55),
		("Action Camera", 0.55),
		("Smart Watch", 0.44),
		("Running Shoes", 0.31),
		("Leather Boots", 0.30),
		("Desk Lamp", 0.12),
	])
	.with_default_score(0.05)
}

async fn new_search(service: &SnapService) -> Uuid {
	service
		.create_search_from_url(SearchRequest { image_url: QUERY_IMAGE.to_string() })
		.await
		.expect("Failed to create search.")
		.search_id
}

#[tokio::test]
async fn first_read_stores_only_scores_above_threshold() {
	let oracle = Arc::new(six_above_threshold());
	let service = service_with(test_config(), ten_products(), oracle.clone());
	let search_id = new_search(&service).await;

	assert_eq!(service.compute_state(search_id), ComputeState::Uninitialized);
	assert!(service.store.list_results(search_id).await.expect("list failed").is_empty());

	let response =
		service.search_results(search_id, SearchFilters::default()).await.expect("results failed");
	let names: Vec<&str> =
		response.results.iter().map(|item| item.product.name.as_str()).collect();

	assert_eq!(oracle.calls(), 10);
	assert_eq!(response.total_count, 6);
	assert_eq!(
		names,
		vec![
			"Wireless Headphones",
			"Studio Monitors",
			"Mirrorless Camera",
			"Action Camera",
			"Smart Watch",
			"Running Shoes",
		]
	);
	assert!(response.results.iter().all(|item| item.similarity_score > 0.3));
	assert!(response.results.iter().all(|item| !item.fallback));
	assert_eq!(service.compute_state(search_id), ComputeState::Ready);
}

#[tokio::test]
async fn second_read_does_not_recompute() {
	let oracle = Arc::new(six_above_threshold());
	let service = service_with(test_config(), ten_products(), oracle.clone());
	let search_id = new_search(&service).await;
	let first =
		service.search_results(search_id, SearchFilters::default()).await.expect("results failed");
	let second =
		service.search_results(search_id, SearchFilters::default()).await.expect("results failed");

	assert_eq!(oracle.calls(), 10);
	assert_eq!(first.total_count, second.total_count);
	assert_eq!(first.results, second.results);
	assert_eq!(
		service.store.list_results(search_id).await.expect("list failed").len(),
		first.total_count
	);
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_reads_share_one_pass() {
	let oracle = Arc::new(six_above_threshold().with_latency(Duration::from_millis(50)));
	let service = service_with(test_config(), ten_products(), oracle.clone());
	let search_id = new_search(&service).await;
	let (left, right) = tokio::join!(
		service.search_results(search_id, SearchFilters::default()),
		service.search_results(search_id, SearchFilters::default()),
	);

	assert_eq!(oracle.calls(), 10);
	assert_eq!(left.expect("left failed").total_count, 6);
	assert_eq!(right.expect("right failed").total_count, 6);
}

#[tokio::test]
async fn zero_matches_is_still_ready() {
	let oracle = Arc::new(ScriptedOracle::default().with_default_score(0.1));
	let service = service_with(test_config(), ten_products(), oracle.clone());
	let search_id = new_search(&service).await;

	for _ in 0..2 {
		let response = service
			.search_results(search_id, SearchFilters::default())
			.await
			.expect("results failed");

		assert_eq!(response.total_count, 0);
	}

	assert_eq!(oracle.calls(), 10);
	assert_eq!(service.compute_state(search_id), ComputeState::Ready);
}

#[tokio::test]
async fn failing_oracle_degrades_to_flagged_fallback_scores() {
	let oracle = Arc::new(FailingOracle::default());
	let service = service_with(test_config(), ten_products(), oracle.clone());
	let search_id = new_search(&service).await;
	let response =
		service.search_results(search_id, SearchFilters::default()).await.expect("results failed");

	assert_eq!(oracle.calls(), 10);
	assert!(!response.results.is_empty());
	assert!(response.results.iter().all(|item| item.fallback));
	assert!(
		response
			.results
			.iter()
			.all(|item| item.similarity_score > 0.3 && item.similarity_score <= 0.8)
	);
}

#[tokio::test]
async fn one_failing_product_does_not_fail_the_batch() {
	let oracle = Arc::new(six_above_threshold().failing_on(&["Cordless Drill"]));
	let mut cfg = test_config();

	cfg.fallback.min_score = 0.9;
	cfg.fallback.max_score = 0.95;

	let service = service_with(cfg, ten_products(), oracle.clone());
	let search_id = new_search(&service).await;
	let response =
		service.search_results(search_id, SearchFilters::default()).await.expect("results failed");
	let drill = &response.results[0];

	assert_eq!(response.total_count, 7);
	assert_eq!(drill.product.name, "Cordless Drill");
	assert!(drill.fallback);
	assert!(response.results[1..].iter().all(|item| !item.fallback));
}

#[tokio::test]
async fn disabled_fallback_excludes_failed_products() {
	let oracle = Arc::new(six_above_threshold().failing_on(&["Wireless Headphones"]));
	let mut cfg = test_config();

	cfg.fallback.enabled = false;

	let service = service_with(cfg, ten_products(), oracle.clone());
	let search_id = new_search(&service).await;
	let response =
		service.search_results(search_id, SearchFilters::default()).await.expect("results failed");

	assert_eq!(response.total_count, 5);
	assert!(response.results.iter().all(|item| item.product.name != "Wireless Headphones"));
}

#[tokio::test(start_paused = true)]
async fn batches_hold_at_most_batch_size_calls() {
	let oracle = Arc::new(six_above_threshold().with_latency(Duration::from_millis(200)));
	let pacer = Arc::new(RecordingPacer::default());
	let mut products = ten_products();

	products.push(product("Bench Grinder", "Tools & Hardware > Power Tools", 119.0));
	products.push(product("Table Saw", "Tools & Hardware > Power Tools", 599.0));

	let service = service_with_pacer(test_config(), products, oracle.clone(), pacer.clone());
	let search_id = new_search(&service).await;

	service.search_results(search_id, SearchFilters::default()).await.expect("results failed");

	assert_eq!(pacer.batches(), vec![(0, 5), (1, 5), (2, 2)]);
	assert_eq!(oracle.max_in_flight(), 5);
	assert_eq!(oracle.calls(), 12);
}

#[tokio::test(start_paused = true)]
async fn fixed_pacing_waits_between_batches() {
	let oracle = Arc::new(six_above_threshold());
	let pacer = Arc::new(FixedDelay::new(Duration::from_millis(1_000)));
	let mut products = ten_products();

	products.push(product("Table Saw", "Tools & Hardware > Power Tools", 599.0));

	let service = service_with_pacer(test_config(), products, oracle, pacer);
	let search_id = new_search(&service).await;
	let started = Instant::now();

	service.search_results(search_id, SearchFilters::default()).await.expect("results failed");

	let elapsed = started.elapsed();

	assert!(elapsed >= Duration::from_millis(2_000), "elapsed {elapsed:?}");
	assert!(elapsed < Duration::from_millis(3_000), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn token_bucket_pacing_limits_call_rate() {
	let oracle = Arc::new(six_above_threshold());
	let pacer = Arc::new(TokenBucket::new(5, 5.0));
	let service = service_with_pacer(test_config(), ten_products(), oracle.clone(), pacer);
	let search_id = new_search(&service).await;
	let started = Instant::now();

	service.search_results(search_id, SearchFilters::default()).await.expect("results failed");

	let elapsed = started.elapsed();

	assert_eq!(oracle.calls(), 10);
	assert!(elapsed >= Duration::from_millis(990), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn filters_apply_before_ranking() {
	let oracle = Arc::new(six_above_threshold());
	let service = service_with(test_config(), ten_products(), oracle);
	let search_id = new_search(&service).await;
	let filters = SearchFilters {
		min_similarity: Some(0.5),
		categories: vec!["Electronics > Cameras".to_string()],
		max_price: Some(1_000.0),
		..Default::default()
	};
	let response = service.search_results(search_id, filters).await.expect("results failed");

	assert_eq!(response.total_count, 1);
	assert_eq!(response.results[0].product.name, "Action Camera");
}

#[tokio::test]
async fn equal_scores_keep_catalog_order() {
	let oracle = Arc::new(six_above_threshold());
	let service = service_with(test_config(), ten_products(), oracle);
	let search_id = new_search(&service).await;
	let filters = SearchFilters {
		categories: vec!["Electronics > Cameras".to_string()],
		..Default::default()
	};
	let response = service.search_results(search_id, filters).await.expect("results failed");
	let names: Vec<&str> =
		response.results.iter().map(|item| item.product.name.as_str()).collect();

	assert_eq!(names, vec!["Mirrorless Camera", "Action Camera"]);
}

/// Delegates to a [`MemoryStore`] but rejects the first result write.
struct RejectFirstWrite {
	inner: MemoryStore,
	rejected: AtomicBool,
}
impl Store for RejectFirstWrite {
	fn list_products(&self) -> BoxFuture<'_, snapmatch_storage::Result<Vec<Product>>> {
		self.inner.list_products()
	}

	fn get_product(&self, id: Uuid) -> BoxFuture<'_, snapmatch_storage::Result<Option<Product>>> {
		self.inner.get_product(id)
	}

	fn create_search(
		&self,
		image_url: String,
	) -> BoxFuture<'_, snapmatch_storage::Result<SearchSession>> {
		self.inner.create_search(image_url)
	}

	fn get_search(
		&self,
		id: Uuid,
	) -> BoxFuture<'_, snapmatch_storage::Result<Option<SearchSession>>> {
		self.inner.get_search(id)
	}

	fn create_results(
		&self,
		results: Vec<NewSimilarityResult>,
	) -> BoxFuture<'_, snapmatch_storage::Result<Vec<SimilarityResult>>> {
		if !self.rejected.swap(true, Ordering::SeqCst) {
			return Box::pin(async {
				Err(snapmatch_storage::Error::Conflict("Write rejected.".to_string()))
			});
		}

		self.inner.create_results(results)
	}

	fn list_results(
		&self,
		search_id: Uuid,
	) -> BoxFuture<'_, snapmatch_storage::Result<Vec<SimilarityResult>>> {
		self.inner.list_results(search_id)
	}
}

#[tokio::test]
async fn failed_write_leaves_session_retryable() {
	let oracle = Arc::new(six_above_threshold());
	let store = Arc::new(RejectFirstWrite {
		inner: MemoryStore::with_catalog(ten_products()),
		rejected: AtomicBool::new(false),
	});
	let service = SnapService::with_parts(
		test_config(),
		store.clone(),
		oracle.clone(),
		Arc::new(FixedDelay::new(Duration::ZERO)),
	);
	let search_id = new_search(&service).await;
	let err = service
		.search_results(search_id, SearchFilters::default())
		.await
		.expect_err("Expected the write to fail.");

	assert!(matches!(err, Error::Storage { .. }));
	assert_eq!(service.compute_state(search_id), ComputeState::Uninitialized);
	assert!(store.list_results(search_id).await.expect("list failed").is_empty());

	let response =
		service.search_results(search_id, SearchFilters::default()).await.expect("results failed");

	assert_eq!(oracle.calls(), 20);
	assert_eq!(response.total_count, 6);
	assert_eq!(service.compute_state(search_id), ComputeState::Ready);
}

#[tokio::test]
async fn unknown_search_is_not_found() {
	let service =
		service_with(test_config(), ten_products(), Arc::new(ScriptedOracle::default()));
	let err = service
		.search_results(Uuid::new_v4(), SearchFilters::default())
		.await
		.expect_err("Expected not found.");

	assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn rejects_blank_and_malformed_search_urls() {
	let service =
		service_with(test_config(), ten_products(), Arc::new(ScriptedOracle::default()));

	for image_url in ["", "   ", "ftp://images.test/a.jpg", "data:text/plain;base64,aGk="] {
		let err = service
			.create_search_from_url(SearchRequest { image_url: image_url.to_string() })
			.await
			.expect_err("Expected invalid request.");

		assert!(matches!(err, Error::InvalidRequest { .. }), "{image_url:?}");
	}
}

#[tokio::test]
async fn upload_becomes_a_data_url_session() {
	let service =
		service_with(test_config(), ten_products(), Arc::new(ScriptedOracle::default()));
	let created = service
		.create_search_from_upload(UploadedImage {
			content_type: Some("image/png".to_string()),
			bytes: vec![0x89, 0x50, 0x4e, 0x47],
		})
		.await
		.expect("Upload failed.");

	assert_eq!(created.image_url, "data:image/png;base64,iVBORw==");

	let session = service
		.store
		.get_search(created.search_id)
		.await
		.expect("get failed")
		.expect("Session missing.");

	assert_eq!(session.image_url, created.image_url);
}

#[tokio::test]
async fn rejected_uploads_create_no_session() {
	let mut cfg = test_config();

	cfg.upload.max_bytes = 8;

	let (service, store) =
		service_with_store(cfg, ten_products(), Arc::new(ScriptedOracle::default()));
	let uploads = [
		UploadedImage { content_type: Some("text/plain".to_string()), bytes: b"hello".to_vec() },
		UploadedImage { content_type: None, bytes: b"hello".to_vec() },
		UploadedImage { content_type: Some("image/jpeg".to_string()), bytes: Vec::new() },
		UploadedImage { content_type: Some("image/jpeg".to_string()), bytes: vec![0; 9] },
	];

	for upload in uploads {
		let err = service.create_search_from_upload(upload).await.expect_err("Expected rejection.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}

	assert_eq!(store.search_count(), 0);

	let created = service
		.create_search_from_upload(UploadedImage {
			content_type: Some("image/jpeg".to_string()),
			bytes: vec![0; 8],
		})
		.await
		.expect("Upload at the limit failed.");

	assert!(created.image_url.starts_with("data:image/jpeg;base64,"));
	assert_eq!(store.search_count(), 1);
}

#[tokio::test]
async fn categories_count_products_per_label() {
	let service =
		service_with(test_config(), ten_products(), Arc::new(ScriptedOracle::default()));
	let categories = service.categories().await.expect("categories failed");
	let pairs: Vec<(&str, usize)> =
		categories.iter().map(|category| (category.name.as_str(), category.count)).collect();

	assert_eq!(
		pairs,
		vec![
			("Electronics > Audio", 2),
			("Electronics > Cameras", 2),
			("Electronics > Wearables", 1),
			("Fashion > Footwear", 2),
			("Home > Lighting", 2),
			("Tools & Hardware > Power Tools", 1),
		]
	);
	assert_eq!(service.products().await.expect("products failed").len(), 10);
}

#[tokio::test]
async fn analysis_falls_back_to_unavailable_notice() {
	let scripted =
		service_with(test_config(), ten_products(), Arc::new(ScriptedOracle::default()));
	let failing = service_with(test_config(), ten_products(), Arc::new(FailingOracle::default()));
	let req = AnalyzeImageRequest { image_url: QUERY_IMAGE.to_string() };

	assert_eq!(
		scripted.analyze_image(req.clone()).await.expect("analyze failed").analysis,
		SCRIPTED_DESCRIPTION
	);
	assert_eq!(
		failing.analyze_image(req).await.expect("analyze failed").analysis,
		"Image analysis unavailable"
	);
}
