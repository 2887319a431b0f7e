//! Integration tests for the change monitor
//!
//! Each scenario seeds the store with a record extracted from "old"
//! markup, serves "new" markup from a mock server, and checks what the
//! re-fetch-and-compare pass logs.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelfwatch::changes::ChangeMonitor;
use shelfwatch::config::CrawlerConfig;
use shelfwatch::crawler::{CatalogExtractor, Extractor, Fetch, HttpFetcher};
use shelfwatch::model::{Book, ChangeType};
use shelfwatch::storage::{SharedStore, SqliteStore, Store};

fn test_crawler_config(base: &str) -> CrawlerConfig {
    CrawlerConfig {
        start_url: format!("{}/catalogue/page-1.html", base),
        concurrency: 5,
        max_retries: 0,
        retry_base_ms: 10,
        request_timeout_secs: 5,
        batch_size: 50,
        user_agent: "shelfwatch-test/1.0".to_string(),
    }
}

fn detail_page(name: &str, price_incl: &str, price_excl: &str, availability: &str) -> String {
    format!(
        r#"<html><body>
        <h1>{name}</h1>
        <p class="star-rating Three"></p>
        <p class="instock availability">{availability}</p>
        <div id="product_description" class="sub-header"></div><p>A steady description.</p>
        <table class="table-striped">
            <tr><th>Price (excl. tax)</th><td>&pound;{price_excl}</td></tr>
            <tr><th>Price (incl. tax)</th><td>&pound;{price_incl}</td></tr>
            <tr><th>Number of reviews</th><td>2</td></tr>
        </table>
        </body></html>"#
    )
}

fn listing_page(hrefs: &[&str]) -> String {
    let mut html = String::from("<html><body>");
    for href in hrefs {
        html.push_str(&format!(
            r#"<article class="product_pod"><h3><a href="{}">title</a></h3></article>"#,
            href
        ));
    }
    html.push_str("</body></html>");
    html
}

/// Builds the record the extractor would produce for the given markup, so
/// stored fingerprints match what a re-fetch computes
fn book_from_markup(html: &str, url: &str) -> Book {
    let extractor = CatalogExtractor::new();
    let fields = extractor.extract_item(html, url).expect("parsable markup");
    Book::from_fields(fields, Utc::now()).expect("valid record")
}

fn build_monitor(config: &CrawlerConfig) -> (ChangeMonitor, SharedStore) {
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(config).expect("fetcher"));
    let extractor: Arc<dyn Extractor> = Arc::new(CatalogExtractor::new());
    let store: SharedStore = Arc::new(Mutex::new(SqliteStore::open_in_memory().expect("store")));

    let monitor = ChangeMonitor::new(
        fetcher,
        extractor,
        store.clone(),
        config.start_url.clone(),
    );
    (monitor, store)
}

#[tokio::test]
async fn test_price_change_is_detected_and_logged() {
    let server = MockServer::start().await;
    let base = server.uri();
    let book_url = format!("{}/catalogue/book-1.html", base);

    // The store holds the record extracted from the old markup
    let old_markup = detail_page("Watched Book", "10.99", "9.99", "In stock");
    let new_markup = detail_page("Watched Book", "12.99", "11.99", "In stock");

    Mock::given(method("GET"))
        .and(path("/catalogue/book-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(new_markup))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["book-1.html"])))
        .mount(&server)
        .await;

    let config = test_crawler_config(&base);
    let (monitor, store) = build_monitor(&config);
    store
        .lock()
        .unwrap()
        .upsert_book(&book_from_markup(&old_markup, &book_url))
        .unwrap();

    let summary = monitor.run().await.expect("detection pass");

    assert_eq!(summary.checked, 1);
    assert_eq!(summary.unchanged, 0);
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.events_logged, 1);
    assert!(summary.new_books.is_empty());
    assert!(summary.failed.is_empty());

    let guard = store.lock().unwrap();
    let changes = guard.list_changes().unwrap();
    assert_eq!(changes.len(), 1);

    let event = &changes[0];
    assert_eq!(event.change_type, ChangeType::PriceChange);
    assert_eq!(event.book_id, book_url);
    assert_eq!(event.book_name, "Watched Book");
    assert_eq!(
        event.old_value,
        Some(serde_json::json!({"price_incl_tax": 10.99, "price_excl_tax": 9.99}))
    );
    assert_eq!(
        event.new_value,
        serde_json::json!({"price_incl_tax": 12.99, "price_excl_tax": 11.99})
    );

    // The stored record was refreshed with the new prices
    let refreshed = guard.get_book(&book_url).unwrap().unwrap();
    assert_eq!(refreshed.price_incl_tax, 12.99);
    assert_eq!(refreshed.price_excl_tax, 11.99);
}

#[tokio::test]
async fn test_unchanged_catalog_logs_nothing() {
    let server = MockServer::start().await;
    let base = server.uri();
    let book_url = format!("{}/catalogue/book-1.html", base);

    let markup = detail_page("Stable Book", "10.99", "9.99", "In stock");

    Mock::given(method("GET"))
        .and(path("/catalogue/book-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(markup.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["book-1.html"])))
        .mount(&server)
        .await;

    let config = test_crawler_config(&base);
    let (monitor, store) = build_monitor(&config);
    store
        .lock()
        .unwrap()
        .upsert_book(&book_from_markup(&markup, &book_url))
        .unwrap();

    let summary = monitor.run().await.expect("detection pass");

    assert_eq!(summary.checked, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.events_logged, 0);
    assert_eq!(store.lock().unwrap().count_changes().unwrap(), 0);
}

#[tokio::test]
async fn test_multiple_field_groups_produce_separate_events() {
    let server = MockServer::start().await;
    let base = server.uri();
    let book_url = format!("{}/catalogue/book-1.html", base);

    let old_markup = detail_page("Busy Book", "10.99", "9.99", "In stock");
    let new_markup = detail_page("Busy Book", "12.99", "11.99", "Out of stock");

    Mock::given(method("GET"))
        .and(path("/catalogue/book-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(new_markup))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["book-1.html"])))
        .mount(&server)
        .await;

    let config = test_crawler_config(&base);
    let (monitor, store) = build_monitor(&config);
    store
        .lock()
        .unwrap()
        .upsert_book(&book_from_markup(&old_markup, &book_url))
        .unwrap();

    let summary = monitor.run().await.expect("detection pass");

    assert_eq!(summary.changed, 1);
    assert_eq!(summary.events_logged, 2);

    let changes = store.lock().unwrap().list_changes().unwrap();
    let types: Vec<ChangeType> = changes.iter().map(|c| c.change_type).collect();
    assert_eq!(
        types,
        vec![ChangeType::PriceChange, ChangeType::AvailabilityChange]
    );
}

#[tokio::test]
async fn test_new_catalog_entries_are_reported_not_logged() {
    let server = MockServer::start().await;
    let base = server.uri();
    let stored_url = format!("{}/catalogue/book-1.html", base);

    let markup = detail_page("Stable Book", "10.99", "9.99", "In stock");

    Mock::given(method("GET"))
        .and(path("/catalogue/book-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(markup.clone()))
        .mount(&server)
        .await;
    // The catalog now lists a second, unstored book
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&["book-1.html", "book-2.html"])),
        )
        .mount(&server)
        .await;

    let config = test_crawler_config(&base);
    let (monitor, store) = build_monitor(&config);
    store
        .lock()
        .unwrap()
        .upsert_book(&book_from_markup(&markup, &stored_url))
        .unwrap();

    let summary = monitor.run().await.expect("detection pass");

    assert_eq!(
        summary.new_books,
        vec![format!("{}/catalogue/book-2.html", base)]
    );
    // New entries are a report, not change-log entries, and nothing was
    // upserted for them
    assert_eq!(store.lock().unwrap().count_changes().unwrap(), 0);
    assert_eq!(store.lock().unwrap().count_books().unwrap(), 1);
}

#[tokio::test]
async fn test_recheck_failure_is_counted_and_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();
    let gone_url = format!("{}/catalogue/gone.html", base);
    let stable_url = format!("{}/catalogue/book-1.html", base);

    let markup = detail_page("Stable Book", "10.99", "9.99", "In stock");

    Mock::given(method("GET"))
        .and(path("/catalogue/gone.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/book-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(markup.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["book-1.html"])))
        .mount(&server)
        .await;

    let config = test_crawler_config(&base);
    let (monitor, store) = build_monitor(&config);
    {
        let mut guard = store.lock().unwrap();
        guard
            .upsert_book(&book_from_markup(&markup, &stable_url))
            .unwrap();
        guard
            .upsert_book(&book_from_markup(&markup, &gone_url))
            .unwrap();
    }

    let summary = monitor.run().await.expect("detection pass");

    assert_eq!(summary.checked, 2);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.failed, vec![gone_url]);
    assert_eq!(summary.events_logged, 0);
}
