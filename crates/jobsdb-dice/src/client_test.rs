use super::*;

const BASE: &str = "http://service.dice.com/api/rest/jobsearch/v1/simple.json";

fn test_client(base_url: &str) -> DiceClient {
    DiceClient::new(base_url, 30, "jobsdb-test/0.1").expect("client construction should not fail")
}

#[test]
fn first_page_url_appends_text_and_city() {
    let client = test_client(BASE);
    let url = client.first_page_url(&SourceQuery::new("python", "07059"));
    assert_eq!(
        url.as_str(),
        "http://service.dice.com/api/rest/jobsearch/v1/simple.json?text=python&city=07059"
    );
}

#[test]
fn first_page_url_encodes_special_characters() {
    let client = test_client(BASE);
    let url = client.first_page_url(&SourceQuery::new("c++ & rust", "07059"));
    assert!(
        url.as_str().contains("text=c%2B%2B+%26+rust"),
        "text param should be percent-encoded: {url}"
    );
}

#[test]
fn resolve_joins_relative_next_url_onto_origin() {
    let client = test_client(BASE);
    let url = client
        .resolve("/api/rest/jobsearch/v1/simple.json?text=python&city=07059&page=2")
        .unwrap();
    assert_eq!(
        url.as_str(),
        "http://service.dice.com/api/rest/jobsearch/v1/simple.json?text=python&city=07059&page=2"
    );
}

#[test]
fn resolve_accepts_absolute_next_url() {
    let client = test_client(BASE);
    let url = client.resolve("https://other.example.com/page?p=3").unwrap();
    assert_eq!(url.as_str(), "https://other.example.com/page?p=3");
}

#[test]
fn new_rejects_unparseable_base_url() {
    let result = DiceClient::new("not a url", 30, "ua");
    assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
}
