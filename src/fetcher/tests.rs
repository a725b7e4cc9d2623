use super::*;
use crate::config::FetcherConfig;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TAG_BODY: &str = r#"{
    "error": false,
    "body": {
        "tag": "猫耳",
        "pixpedia": {
            "abstract": "Cat ears worn by characters.",
            "image": "https://i.example.net/c/384x384/img-master/img/1_p0.jpg"
        },
        "tagTranslation": {
            "猫耳": { "en": "cat ears", "zh": "猫耳" }
        }
    }
}"#;

const ARTWORK_BODY: &str = r#"{
    "error": false,
    "message": "",
    "body": {
        "title": "Evening",
        "userName": "someone",
        "tags": { "tags": [ { "tag": "sky" }, { "tag": "sunset" } ] },
        "urls": { "original": "https://i.example.net/img-original/img/98765_p0.png" }
    }
}"#;

fn fetcher_config(server: &MockServer, kind: ItemKind) -> FetcherConfig {
    FetcherConfig {
        base_url: server.uri(),
        kind,
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

#[test]
fn test_429_is_rate_limited_regardless_of_body() {
    let key = ItemKey::from("cat");
    assert_eq!(
        classify_response(ItemKind::Tag, &key, 429, TAG_BODY, "en"),
        FetchOutcome::RateLimited
    );
    assert_eq!(
        classify_response(ItemKind::Tag, &key, 429, "", "en"),
        FetchOutcome::RateLimited
    );
}

#[test]
fn test_non_success_status_is_item_error() {
    let key = ItemKey::from("cat");
    assert_eq!(
        classify_response(ItemKind::Tag, &key, 500, "oops", "en"),
        FetchOutcome::ItemError("HTTP 500".to_string())
    );
    assert_eq!(
        classify_response(ItemKind::Artwork, &key, 404, "", "en"),
        FetchOutcome::ItemError("HTTP 404".to_string())
    );
}

#[test]
fn test_application_error_body() {
    let key = ItemKey::from("1");
    let outcome = classify_response(
        ItemKind::Artwork,
        &key,
        200,
        r#"{"error":true,"message":"This work has been deleted","body":[]}"#,
        "en",
    );
    assert_eq!(
        outcome,
        FetchOutcome::ItemError("This work has been deleted".to_string())
    );

    let outcome = classify_response(ItemKind::Artwork, &key, 200, r#"{"error":true}"#, "en");
    assert_eq!(
        outcome,
        FetchOutcome::ItemError("API reported an error".to_string())
    );
}

#[test]
fn test_malformed_body_is_item_error() {
    let key = ItemKey::from("cat");
    match classify_response(ItemKind::Tag, &key, 200, "<html>", "en") {
        FetchOutcome::ItemError(msg) => assert!(msg.starts_with("invalid response body")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(
        classify_response(ItemKind::Tag, &key, 200, r#"{"error":false,"body":[]}"#, "en"),
        FetchOutcome::ItemError(_)
    ));
}

#[test]
fn test_tag_payload_extraction() {
    let key = ItemKey::from("猫耳");
    let outcome = classify_response(ItemKind::Tag, &key, 200, TAG_BODY, "en");
    let FetchOutcome::Success(Payload::Tag(tag)) = outcome else {
        panic!("expected tag payload");
    };
    assert_eq!(tag.translation.as_deref(), Some("cat ears"));
    assert_eq!(
        tag.abstract_text.as_deref(),
        Some("Cat ears worn by characters.")
    );
    assert!(tag.image.unwrap().ends_with("1_p0.jpg"));
}

#[test]
fn test_tag_without_translation_table() {
    let key = ItemKey::from("rare");
    let body = r#"{"error":false,"body":{"tag":"rare","pixpedia":{},"tagTranslation":[]}}"#;
    let outcome = classify_response(ItemKind::Tag, &key, 200, body, "en");
    assert_eq!(outcome, FetchOutcome::Success(Payload::Tag(TagMetadata::default())));
}

#[tokio::test]
async fn test_http_fetcher_tag_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ajax/search/tags/%E7%8C%AB%E8%80%B3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TAG_BODY))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fetcher_config(&server, ItemKind::Tag)).unwrap();
    let outcome = fetcher
        .fetch(&ItemKey::from("猫耳"), &CancellationToken::new())
        .await;

    match outcome {
        FetchOutcome::Success(Payload::Tag(tag)) => {
            assert_eq!(tag.translation.as_deref(), Some("cat ears"))
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_fetcher_artwork_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ajax/illust/98765"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTWORK_BODY))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fetcher_config(&server, ItemKind::Artwork)).unwrap();
    let outcome = fetcher
        .fetch(&ItemKey::from("98765"), &CancellationToken::new())
        .await;

    let FetchOutcome::Success(Payload::Artwork(art)) = outcome else {
        panic!("expected artwork payload");
    };
    assert_eq!(art.title.as_deref(), Some("Evening"));
    assert_eq!(art.artist.as_deref(), Some("someone"));
    assert_eq!(art.tags, vec!["sky".to_string(), "sunset".to_string()]);
    assert!(art.image_url.unwrap().ends_with("98765_p0.png"));
}

#[tokio::test]
async fn test_http_fetcher_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string(TAG_BODY))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fetcher_config(&server, ItemKind::Tag)).unwrap();
    let outcome = fetcher
        .fetch(&ItemKey::from("cat"), &CancellationToken::new())
        .await;
    assert_eq!(outcome, FetchOutcome::RateLimited);
}

#[tokio::test]
async fn test_http_fetcher_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fetcher_config(&server, ItemKind::Tag)).unwrap();
    let outcome = fetcher
        .fetch(&ItemKey::from("cat"), &CancellationToken::new())
        .await;
    assert_eq!(outcome, FetchOutcome::ItemError("HTTP 503".to_string()));
}

#[tokio::test]
async fn test_http_fetcher_sends_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("cookie", "PHPSESSID=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TAG_BODY))
        .mount(&server)
        .await;

    let mut config = fetcher_config(&server, ItemKind::Tag);
    config.cookie = Some("PHPSESSID=abc".to_string());
    let fetcher = HttpFetcher::new(&config).unwrap();

    let outcome = fetcher
        .fetch(&ItemKey::from("猫耳"), &CancellationToken::new())
        .await;
    assert!(matches!(outcome, FetchOutcome::Success(_)));
}

#[tokio::test]
async fn test_http_fetcher_honors_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(TAG_BODY)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fetcher_config(&server, ItemKind::Tag)).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let start = std::time::Instant::now();
    let outcome = fetcher.fetch(&ItemKey::from("cat"), &cancel).await;

    assert_eq!(outcome, FetchOutcome::Cancelled);
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "cancel should abort the in-flight request, took {:?}",
        start.elapsed()
    );
}

#[test]
fn test_endpoint_keeps_base_path() {
    let config = FetcherConfig {
        base_url: "https://api.example.net/proxy".to_string(),
        ..Default::default()
    };
    let fetcher = HttpFetcher::new(&config).unwrap();
    let url = fetcher.endpoint(&ItemKey::from("a/b c")).unwrap();
    assert_eq!(
        url.as_str(),
        "https://api.example.net/proxy/ajax/search/tags/a%2Fb%20c"
    );
}
