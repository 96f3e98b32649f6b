//! End-to-end tracking sessions against a mock marketplace
//!
//! Each test runs one or more full sessions through `run_session` and then
//! inspects the database the sessions wrote.

use crate::support::*;
use listing_tracker::crawler::run_session;
use listing_tracker::model::{FieldValue, TrackedField};
use listing_tracker::storage::{DataType, DatasetStore, RunStatus, SqliteStore, ALL_CATEGORIES};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn open_store(db_path: &Path) -> SqliteStore {
    SqliteStore::new(db_path).expect("Failed to open DB")
}

/// Two fresh listings on one index page
async fn mount_first_session(server: &MockServer) {
    mount_index(server, &[1001, 1002]).await;
    mount_listing(
        server,
        1001,
        detail_html("Norco Range", "$1,000 CAD", "Yes", now_repost()),
    )
    .await;
    mount_listing(
        server,
        1002,
        detail_html("Rocky Mountain Altitude", "$2,000 CAD", "Yes", now_repost()),
    )
    .await;
}

#[tokio::test]
async fn test_first_session_stores_new_listings() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("listings.db");

    mount_first_session(&server).await;

    let stats = run_session(test_config(&server.uri(), &db_path, ""), "hash-1".to_string())
        .await
        .expect("Session failed");

    assert_eq!(stats.categories_processed, 1);
    assert_eq!(stats.new_listings, 2);
    assert_eq!(stats.changes, 0);

    let store = open_store(&db_path);
    let base = store.get_dataset(2, DataType::Base).expect("Failed to read base");
    let mut urls: Vec<&str> = base.iter().map(|l| l.url.as_str()).collect();
    urls.sort_unstable();
    assert_eq!(
        urls,
        vec![listing_url(&server, 1001), listing_url(&server, 1002)]
    );

    let norco = base
        .iter()
        .find(|l| l.ad_title == "Norco Range")
        .expect("Norco missing");
    assert_eq!(norco.price, Some(1000.0));
    assert_eq!(norco.currency.as_deref(), Some("CAD"));
    assert_eq!(norco.view_count, Some(310.0));

    let run = store
        .get_latest_run()
        .expect("Failed to read run")
        .expect("No run recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "hash-1");
}

#[tokio::test]
async fn test_price_change_and_sale_are_tracked() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("listings.db");

    mount_first_session(&server).await;
    run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("First session failed");

    // 1001 dropped its price; 1002 left the index because it sold
    server.reset().await;
    mount_index(&server, &[1001]).await;
    mount_listing(
        &server,
        1001,
        detail_html("Norco Range", "$900 CAD", "Yes", now_repost()),
    )
    .await;
    mount_listing(
        &server,
        1002,
        detail_html("Rocky Mountain Altitude", "$2,000 CAD", "Sold", now_repost()),
    )
    .await;

    let stats = run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("Second session failed");

    assert_eq!(stats.new_listings, 0);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.sold, 1);
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.changes, 1);

    let store = open_store(&db_path);
    let base = store.get_dataset(2, DataType::Base).expect("Failed to read base");
    assert_eq!(base.len(), 1);
    assert_eq!(base[0].url, listing_url(&server, 1001));
    assert_eq!(base[0].price, Some(900.0));

    let sold = store.get_dataset(2, DataType::Sold).expect("Failed to read sold");
    assert_eq!(sold.len(), 1);
    assert_eq!(sold[0].url, listing_url(&server, 1002));

    let changes = store.get_changes(ALL_CATEGORIES).expect("Failed to read changes");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].url, listing_url(&server, 1001));
    assert_eq!(changes[0].field, TrackedField::Price);
    assert_eq!(changes[0].old_value, FieldValue::Number(1000.0));
    assert_eq!(changes[0].new_value, FieldValue::Number(900.0));
}

#[tokio::test]
async fn test_vanished_listing_without_sale_is_removed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("listings.db");

    mount_first_session(&server).await;
    run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("First session failed");

    // 1002 is gone from the index and its page now 404s
    server.reset().await;
    mount_index(&server, &[1001]).await;
    mount_listing(
        &server,
        1001,
        detail_html("Norco Range", "$1,000 CAD", "Yes", now_repost()),
    )
    .await;

    let stats = run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("Second session failed");

    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.removed, 1);
    assert_eq!(stats.sold, 0);

    let store = open_store(&db_path);
    assert_eq!(
        store.get_dataset(2, DataType::Base).expect("Failed to read base").len(),
        1
    );
    assert!(store
        .get_dataset(2, DataType::Sold)
        .expect("Failed to read sold")
        .is_empty());
}

#[tokio::test]
async fn test_scan_stops_at_last_scrape_until_full_refresh() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("listings.db");

    mount_index(&server, &[1001, 1002, 1003]).await;
    mount_listing(
        &server,
        1001,
        detail_html("Fresh", "$1,000 CAD", "Yes", now_repost()),
    )
    .await;
    mount_listing(
        &server,
        1002,
        detail_html("Older", "$800 CAD", "Yes", old_repost()),
    )
    .await;
    mount_listing(
        &server,
        1003,
        detail_html("Oldest", "$600 CAD", "Yes", old_repost()),
    )
    .await;

    let first = run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("First session failed");
    assert_eq!(first.new_listings, 3);

    let second = run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("Second session failed");
    assert_eq!(second.new_listings, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.removed, 0);

    // 1002 stopped the second scan, so 1003 was only fetched once
    assert_eq!(requests_to(&server, "/buysell/1002/").await, 2);
    assert_eq!(requests_to(&server, "/buysell/1003/").await, 1);

    run_session(
        test_config(&server.uri(), &db_path, "full-refresh = true"),
        "hash".to_string(),
    )
    .await
    .expect("Full refresh failed");
    assert_eq!(requests_to(&server, "/buysell/1003/").await, 2);

    let store = open_store(&db_path);
    assert_eq!(
        store.get_dataset(2, DataType::Base).expect("Failed to read base").len(),
        3
    );
}

#[tokio::test]
async fn test_failed_index_keeps_stored_listings() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("listings.db");

    mount_first_session(&server).await;
    run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("First session failed");

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/buysell/list/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let stats = run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("Session should survive a failing category");

    assert_eq!(stats.categories_failed, 1);
    assert_eq!(stats.categories_processed, 0);
    assert_eq!(stats.removed, 0);

    let store = open_store(&db_path);
    assert_eq!(
        store.get_dataset(2, DataType::Base).expect("Failed to read base").len(),
        2
    );
    let run = store
        .get_latest_run()
        .expect("Failed to read run")
        .expect("No run recorded");
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_failed_index_page_keeps_its_listings() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("listings.db");

    mount_index_page(&server, 1, 2, &[1001]).await;
    mount_index_page(&server, 2, 2, &[1002]).await;
    mount_listing(
        &server,
        1001,
        detail_html("Norco Range", "$1,000 CAD", "Yes", now_repost()),
    )
    .await;
    mount_listing(
        &server,
        1002,
        detail_html("Rocky Mountain Altitude", "$2,000 CAD", "Yes", now_repost()),
    )
    .await;

    let first = run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("First session failed");
    assert_eq!(first.new_listings, 2);

    // Page 2 of the index now fails; 1002 is still listed there
    server.reset().await;
    mount_index_page(&server, 1, 2, &[1001]).await;
    Mock::given(method("GET"))
        .and(path("/buysell/list/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_listing(
        &server,
        1001,
        detail_html("Norco Range", "$1,000 CAD", "Yes", now_repost()),
    )
    .await;

    let stats = run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("Second session failed");

    assert_eq!(stats.categories_processed, 1);
    assert_eq!(stats.partial_indexes, 1);
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.sold, 0);
    assert_eq!(requests_to(&server, "/buysell/1002/").await, 0);

    let store = open_store(&db_path);
    assert_eq!(
        store.get_dataset(2, DataType::Base).expect("Failed to read base").len(),
        2
    );
}

#[tokio::test]
async fn test_robots_disallowed_listing_is_never_fetched() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("listings.db");

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /buysell/1002/"),
        )
        .mount(&server)
        .await;
    mount_index(&server, &[1001, 1002]).await;
    mount_listing(
        &server,
        1001,
        detail_html("Norco Range", "$1,000 CAD", "Yes", now_repost()),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/buysell/1002/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0) // Should never be called
        .mount(&server)
        .await;

    let stats = run_session(test_config(&server.uri(), &db_path, ""), "hash".to_string())
        .await
        .expect("Session failed");

    assert_eq!(stats.new_listings, 1);
    assert_eq!(stats.parse_skips, 1);
}
