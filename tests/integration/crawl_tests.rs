//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for a marketplace API and test
//! pagination, detail batching, category classification, and full runs.

use crawlee::config::{Config, CrawlConfig, FetchConfig, MarketConfig};
use crawlee::crawler::{
    run_crawl, CrawlOrchestrator, CrawlPhase, DetailBatcher, Fetcher, ListingWalker, WalkSettings,
};
use crawlee::market::{CategoryNode, ItemRef, Market, MarketKind};
use crawlee::storage::{ingestion_date, RunStatus, SqliteStorage, Storage};
use crawlee::CrawlError;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const LISTING_PATH: &str = "/api/v1/search_items/";
const DETAIL_PATH: &str = "/api/v1/items/";
const CATEGORY_PATH: &str = "/api/v1/category_list/";

/// Creates a test configuration pointing the `sg` market at `base_url`
fn create_test_config(base_url: &str, page_limit: u32, page_retries: u32, db_dir: &str) -> Config {
    let mut markets = BTreeMap::new();
    markets.insert(
        "sg".to_string(),
        MarketConfig {
            kind: MarketKind::Shopee,
            host: base_url.to_string(),
            category_url: format!("{}{}", base_url, CATEGORY_PATH),
            item_list_url: format!(
                "{}{}?by=pop&order=desc&categoryids={{catid}}&newest={{offset}}&limit={{limit}}",
                base_url, LISTING_PATH
            ),
            item_info_url: format!("{}{}", base_url, DETAIL_PATH),
            sleep_interval: 0,
            detail_headers: BTreeMap::new(),
        },
    );

    Config {
        database_dir: db_dir.to_string(),
        regions: vec!["sg".to_string()],
        fetch: FetchConfig {
            request_timeout_ms: 2_000,
            ..FetchConfig::default()
        },
        crawl: CrawlConfig {
            page_limit,
            page_retries,
        },
        markets,
    }
}

fn listing_body(first_id: i64, count: usize) -> Value {
    let items: Vec<Value> = (0..count as i64)
        .map(|i| json!({"itemid": first_id + i, "shopid": 900, "adsid": 0}))
        .collect();
    json!({ "items": items })
}

fn leaf(cat_id: i64, parent_id: i64) -> CategoryNode {
    CategoryNode {
        display_name: format!("Category {}", cat_id),
        cat_id,
        parent_id,
    }
}

/// Answers a detail lookup with `{itemid, name}` for every requested item
struct EchoDetails;

impl Respond for EchoDetails {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let payload: Value = match serde_json::from_slice(&request.body) {
            Ok(payload) => payload,
            Err(_) => return ResponseTemplate::new(400),
        };
        let details: Vec<Value> = payload["item_shop_ids"]
            .as_array()
            .map(|refs| {
                refs.iter()
                    .map(|r| json!({"itemid": r["itemid"], "name": format!("item {}", r["itemid"])}))
                    .collect()
            })
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(details)
    }
}

async fn mount_echo_details(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .respond_with(EchoDetails)
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, cat_id: i64, offset: u32, body: Value, expected: u64) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("categoryids", cat_id.to_string().as_str()))
        .and(query_param("newest", offset.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_category_tree(server: &MockServer, tree: Value) {
    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(tree))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pagination_stops_after_short_page() {
    let server = MockServer::start().await;
    mount_listing(&server, 6, 0, listing_body(1, 100), 1).await;
    mount_listing(&server, 6, 100, listing_body(101, 100), 1).await;
    mount_listing(&server, 6, 200, listing_body(201, 30), 1).await;
    mount_listing(&server, 6, 300, listing_body(301, 0), 0).await;
    mount_echo_details(&server).await;

    let config = create_test_config(&server.uri(), 100, 0, "unused");
    let market = Market::resolve(&config, "sg").expect("Market should resolve");
    let fetcher = Fetcher::new(config.fetch.clone()).expect("Failed to build fetcher");
    let settings = WalkSettings::new(&config.crawl, &config.fetch, &market);
    let mut storage = SqliteStorage::new_in_memory().expect("Failed to open DB");

    let summary = ListingWalker::new(&fetcher, &market, settings)
        .walk(&leaf(6, 1), &mut storage)
        .await
        .expect("Walk failed");

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.items, 230);
    assert_eq!(summary.appended, 230);
    assert_eq!(storage.count_items().unwrap(), 230);

    let offsets: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == LISTING_PATH)
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "newest")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    assert_eq!(offsets, vec!["0", "100", "200"]);
}

#[tokio::test]
async fn test_failing_page_is_retried_then_abandoned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), 100, 2, "unused");
    let market = Market::resolve(&config, "sg").unwrap();
    let fetcher = Fetcher::new(config.fetch.clone()).unwrap();
    let settings = WalkSettings::new(&config.crawl, &config.fetch, &market);
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let result = ListingWalker::new(&fetcher, &market, settings)
        .walk(&leaf(6, 1), &mut storage)
        .await;

    match result {
        Err(CrawlError::PageRetriesExhausted {
            cat_id,
            offset,
            attempts,
            last,
        }) => {
            assert_eq!(cat_id, 6);
            assert_eq!(offset, 0);
            assert_eq!(attempts, 3);
            assert!(matches!(*last, CrawlError::HttpStatus { status: 500, .. }));
        }
        other => panic!("Expected PageRetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_flaky_page_recovers_within_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_listing(&server, 6, 0, listing_body(1, 3), 1).await;
    mount_echo_details(&server).await;

    let config = create_test_config(&server.uri(), 100, 1, "unused");
    let market = Market::resolve(&config, "sg").unwrap();
    let fetcher = Fetcher::new(config.fetch.clone()).unwrap();
    let settings = WalkSettings::new(&config.crawl, &config.fetch, &market);
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let summary = ListingWalker::new(&fetcher, &market, settings)
        .walk(&leaf(6, 1), &mut storage)
        .await
        .expect("Second attempt should succeed");

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.items, 3);
}

#[tokio::test]
async fn test_detail_batch_sends_references_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(header("x-csrftoken", "token123"))
        .and(body_json(json!({"item_shop_ids": [
            {"itemid": 11, "shopid": 85},
            {"itemid": 12, "shopid": 86}
        ]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"itemid": 11, "name": "kettle", "price": 1500},
            {"name": "orphan without id"},
            {"itemid": 12.0, "name": "toaster"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri(), 100, 0, "unused");
    if let Some(market) = config.markets.get_mut("sg") {
        market
            .detail_headers
            .insert("x-csrftoken".to_string(), "token123".to_string());
    }
    let market = Market::resolve(&config, "sg").unwrap();
    let fetcher = Fetcher::new(config.fetch.clone()).unwrap();
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let refs = [
        ItemRef { item_id: 11, shop_id: 85 },
        ItemRef { item_id: 12, shop_id: 86 },
    ];
    let outcome = DetailBatcher::new(&fetcher, &market)
        .resolve(&refs, &mut storage)
        .await
        .expect("Batch failed");

    assert_eq!(outcome.resolved, 3);
    assert_eq!(outcome.appended, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.failed, 0);

    let kettle = storage.get_item(11).unwrap().expect("Item 11 missing");
    assert_eq!(kettle.history.len(), 1);
    assert_eq!(kettle.history[0].attributes["price"], json!(1500));
}

#[tokio::test]
async fn test_detail_decode_failure_aborts_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"error\": 90309999}"))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), 100, 0, "unused");
    let market = Market::resolve(&config, "sg").unwrap();
    let fetcher = Fetcher::new(config.fetch.clone()).unwrap();
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let result = DetailBatcher::new(&fetcher, &market)
        .resolve(&[ItemRef { item_id: 1, shop_id: 2 }], &mut storage)
        .await;

    assert!(matches!(result, Err(CrawlError::Decode { .. })));
    assert_eq!(storage.count_items().unwrap(), 0);
}

#[tokio::test]
async fn test_empty_page_issues_no_detail_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), 100, 0, "unused");
    let market = Market::resolve(&config, "sg").unwrap();
    let fetcher = Fetcher::new(config.fetch.clone()).unwrap();
    let mut storage = SqliteStorage::new_in_memory().unwrap();

    let outcome = DetailBatcher::new(&fetcher, &market)
        .resolve(&[], &mut storage)
        .await
        .unwrap();
    assert_eq!(outcome.resolved, 0);
}

#[tokio::test]
async fn test_only_leaf_categories_are_walked() {
    let server = MockServer::start().await;
    mount_category_tree(
        &server,
        json!([
            {"main": {"display_name": "Women", "catid": 1, "parent_category": 0},
             "sub": [{"display_name": "Dresses", "catid": 6, "parent_category": 1},
                     {"display_name": "Tops", "catid": 7, "parent_category": 1}]},
            {"main": {"display_name": "Men", "catid": 2, "parent_category": 0}, "sub": []}
        ]),
    )
    .await;
    mount_listing(&server, 6, 0, listing_body(1, 0), 1).await;
    mount_listing(&server, 7, 0, listing_body(1, 0), 1).await;
    mount_listing(&server, 1, 0, listing_body(1, 0), 0).await;
    mount_listing(&server, 2, 0, listing_body(1, 0), 0).await;

    let config = create_test_config(&server.uri(), 100, 0, "unused");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut orchestrator = CrawlOrchestrator::new(&config, "sg", storage, "hash").unwrap();

    let summary = orchestrator.run().await.expect("Crawl failed");

    assert_eq!(summary.categories, 4);
    assert_eq!(summary.leaf_categories, 2);
    assert_eq!(summary.walks_failed, 0);
    assert_eq!(orchestrator.storage().count_categories().unwrap(), 4);
}

#[tokio::test]
async fn test_failed_walk_does_not_stop_siblings() {
    let server = MockServer::start().await;
    mount_category_tree(
        &server,
        json!([
            {"main": {"display_name": "Home", "catid": 1, "parent_category": 0},
             "sub": [{"display_name": "Kitchen", "catid": 6, "parent_category": 1},
                     {"display_name": "Garden", "catid": 7, "parent_category": 1}]}
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("categoryids", "6"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    mount_listing(&server, 7, 0, listing_body(70, 2), 1).await;
    mount_echo_details(&server).await;

    let config = create_test_config(&server.uri(), 100, 0, "unused");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut orchestrator = CrawlOrchestrator::new(&config, "sg", storage, "hash").unwrap();

    let summary = orchestrator.run().await.expect("Run should survive one failed category");

    assert_eq!(summary.walks_failed, 1);
    assert_eq!(summary.leaf_categories, 1);
    assert_eq!(summary.items, 2);
    assert_eq!(orchestrator.storage().count_items().unwrap(), 2);
}

#[tokio::test]
async fn test_category_decode_failure_aborts_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(1, 0)))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), 100, 0, "unused");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut orchestrator = CrawlOrchestrator::new(&config, "sg", storage, "hash").unwrap();

    let result = orchestrator.run().await;
    assert!(matches!(result, Err(CrawlError::Decode { .. })));

    let run = orchestrator.storage().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_end_to_end_run_records_daily_snapshots() {
    let server = MockServer::start().await;
    mount_category_tree(
        &server,
        json!([
            {"main": {"display_name": "Women", "catid": 1, "parent_category": 0},
             "sub": [{"display_name": "Dresses", "catid": 6, "parent_category": 1}]}
        ]),
    )
    .await;
    mount_listing(&server, 6, 0, listing_body(501, 2), 2).await;
    mount_listing(&server, 6, 2, listing_body(1, 0), 2).await;
    mount_echo_details(&server).await;

    let config = create_test_config(&server.uri(), 2, 0, "unused");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut orchestrator = CrawlOrchestrator::new(&config, "sg", storage, "cfg-hash").unwrap();

    let summary = orchestrator.run().await.expect("Crawl failed");
    assert_eq!(orchestrator.phase(), CrawlPhase::Idle);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.items, 2);
    assert_eq!(summary.appended, 2);

    let today = ingestion_date(Utc::now());
    {
        let storage = orchestrator.storage();
        assert_eq!(storage.list_item_ids().unwrap(), vec![501, 502]);
        for item_id in [501, 502] {
            let item = storage.get_item(item_id).unwrap().expect("Item missing");
            assert_eq!(item.history.len(), 1);
            assert_eq!(item.history[0].ingestion_date, today);
            assert_eq!(item.history[0].attributes["itemid"], json!(item_id));
            assert_eq!(
                item.history[0].attributes["name"],
                json!(format!("item {}", item_id))
            );
        }

        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.config_hash, "cfg-hash");
    }

    // A second run on the same day refreshes items without new history
    let again = orchestrator.run().await.expect("Second crawl failed");
    assert_eq!(again.items, 2);
    assert_eq!(again.appended, 0);
    assert_eq!(orchestrator.storage().count_snapshots().unwrap(), 2);
}

#[tokio::test]
async fn test_run_crawl_writes_market_database() {
    let server = MockServer::start().await;
    mount_category_tree(
        &server,
        json!([
            {"main": {"display_name": "Women", "catid": 1, "parent_category": 0},
             "sub": [{"display_name": "Dresses", "catid": 6, "parent_category": 1}]}
        ]),
    )
    .await;
    mount_listing(&server, 6, 0, listing_body(10, 1), 1).await;
    mount_echo_details(&server).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_dir = dir.path().join("stores");
    let config = create_test_config(&server.uri(), 100, 0, &db_dir.to_string_lossy());

    let summaries = run_crawl(&config, "hash", &config.regions)
        .await
        .expect("Crawl failed");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].0, "sg");

    let storage =
        SqliteStorage::new(&db_dir.join("shopee_sg.db")).expect("Market database missing");
    assert_eq!(storage.count_items().unwrap(), 1);
    assert_eq!(storage.count_categories().unwrap(), 2);
}

#[tokio::test]
async fn test_run_crawl_rejects_unknown_region() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config("http://127.0.0.1:1", 100, 0, &dir.path().to_string_lossy());

    let result = run_crawl(&config, "hash", &["xx".to_string()]).await;
    assert!(matches!(result, Err(CrawlError::UnknownMarket(key)) if key == "xx"));
}
