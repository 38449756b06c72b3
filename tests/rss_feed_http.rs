// tests/rss_feed_http.rs
//
// RSS providers fetched over HTTP from a local server, then collected.

mod common;

use axum::{http::StatusCode, routing::get, Router};
use content_bot::ingest::{self, providers::rss::RssProvider, types::HeadlineSource};

const NEWS_XML: &str = include_str!("fixtures/news_rss.xml");

async fn start() -> String {
    let router = Router::new()
        .route("/rss.xml", get(|| async { NEWS_XML }))
        .route("/down.xml", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    common::spawn_server(router).await
}

#[tokio::test]
async fn collect_keeps_working_feeds_and_skips_failed_ones() {
    let base = start().await;
    let client = reqwest::Client::new();
    let providers: Vec<Box<dyn HeadlineSource>> = vec![
        Box::new(RssProvider::from_url("Down", format!("{base}/down.xml"), client.clone(), 3, 100)),
        Box::new(RssProvider::from_url("Wire", format!("{base}/rss.xml"), client.clone(), 3, 100)),
        Box::new(RssProvider::from_url("Missing", format!("{base}/nope.xml"), client, 3, 100)),
    ];

    let items = ingest::collect(&providers).await;
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|h| h.source == "Wire"));
    assert_eq!(items[0].title, "Fed holds rates steady as inflation cools");
    assert_eq!(items[1].title, "Bitcoin tops $100k & then slips");
    assert_eq!(items[2].title, "Chipmakers rally on AI demand - analysts stay cautious");
    assert!(items[2].url.is_some());
}

#[tokio::test]
async fn title_cap_applies_to_fetched_items() {
    let base = start().await;
    let p = RssProvider::from_url("Wire", format!("{base}/rss.xml"), reqwest::Client::new(), 1, 10);
    let items = p.fetch_latest().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Fed holds ...");
}
