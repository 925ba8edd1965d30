//! Integration tests for `DiceClient::fetch_page`.
//!
//! Uses `wiremock` so no real network traffic is made.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jobsdb_core::SourceQuery;
use jobsdb_dice::{DiceClient, FetchError};

fn test_client(server: &MockServer) -> DiceClient {
    DiceClient::new(&format!("{}/simple.json", server.uri()), 5, "jobsdb-test/0.1")
        .expect("failed to build test DiceClient")
}

#[tokio::test]
async fn fetch_page_decodes_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple.json"))
        .and(query_param("text", "python"))
        .and(query_param("city", "07059"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "count": 1,
            "firstDocument": 1,
            "lastDocument": 1,
            "resultItemList": [{
                "detailUrl": "http://www.dice.com/job/result/acme/1",
                "jobTitle": "Python Developer",
                "company": "Acme",
                "location": "Warren, NJ",
                "date": "2017-03-20"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let url = client.first_page_url(&SourceQuery::new("python", "07059"));
    let envelope = client.fetch_page(&url).await.expect("fetch should succeed");

    assert_eq!(envelope.count, 1);
    assert_eq!(envelope.last_document, 1);
    assert!(envelope.next_url().is_none());
    assert_eq!(envelope.result_item_list.len(), 1);
    assert_eq!(envelope.result_item_list[0]["jobTitle"], "Python Developer");
}

#[tokio::test]
async fn fetch_page_sends_configured_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "jobsdb-test/0.1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(&json!({"count": 0, "resultItemList": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let url = client.first_page_url(&SourceQuery::new("rust", "10001"));
    client.fetch_page(&url).await.expect("fetch should succeed");
}

#[tokio::test]
async fn fetch_page_returns_http_status_on_non_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let url = client.first_page_url(&SourceQuery::new("python", "07059"));
    let err = client.fetch_page(&url).await.unwrap_err();

    match err {
        FetchError::HttpStatus { status, url } => {
            assert_eq!(status, 502);
            assert!(url.contains("text=python"), "url should be reported: {url}");
        }
        other => panic!("expected HttpStatus, got: {other:?}"),
    }
}

#[tokio::test]
async fn fetch_page_returns_decode_error_on_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"count\": "))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let url = client.first_page_url(&SourceQuery::new("python", "07059"));
    let err = client.fetch_page(&url).await.unwrap_err();

    assert!(matches!(err, FetchError::Decode { .. }), "got: {err:?}");
}

#[tokio::test]
async fn fetch_page_rejects_envelope_without_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"resultItemList": []})))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let url = client.first_page_url(&SourceQuery::new("python", "07059"));
    let err = client.fetch_page(&url).await.unwrap_err();

    assert!(matches!(err, FetchError::Decode { .. }), "got: {err:?}");
}

#[tokio::test]
async fn fetch_page_returns_transport_error_when_nothing_is_listening() {
    // Bind an ephemeral port, then release it so connections are refused.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("failed to reserve a local port");
    let client = DiceClient::new(&format!("http://{addr}/simple.json"), 5, "jobsdb-test/0.1")
        .expect("failed to build test DiceClient");
    let url = client.first_page_url(&SourceQuery::new("python", "07059"));

    let err = client.fetch_page(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "got: {err:?}");
}
