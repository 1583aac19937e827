use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use tech_radar::adapters::{GleifClient, OpenAireClient, SemanticScholarClient};
use tech_radar::domain::model::YearRange;
use tech_radar::domain::ports::{CitationSource, EntityResolver, PublicationSource, YearCount};
use tech_radar::RadarError;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(2);

fn openaire_total(total: u64) -> serde_json::Value {
    json!({"response": {"header": {"total": {"$": total}}, "results": null}})
}

#[tokio::test]
async fn test_openaire_counts_one_request_per_year() {
    let server = MockServer::start_async().await;
    let y2021 = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search/publications")
                .query_param("keywords", "quantum computing")
                .query_param("fromDateAccepted", "2021-01-01")
                .query_param("toDateAccepted", "2021-12-31")
                .query_param("size", "1")
                .header("authorization", "Bearer token-123");
            then.status(200).json_body(openaire_total(40));
        })
        .await;
    let y2022 = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search/publications")
                .query_param("fromDateAccepted", "2022-01-01");
            then.status(200).json_body(json!({"response": {"header": {"total": {"$": "55"}}}}));
        })
        .await;
    let y2023 = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search/publications")
                .query_param("fromDateAccepted", "2023-01-01");
            then.status(200).json_body(openaire_total(0));
        })
        .await;

    let client = OpenAireClient::new(
        server.url("/search/publications"),
        Some("token-123".to_string()),
        TIMEOUT,
    )
    .unwrap();
    let rows = client
        .count_by_year("quantum computing", YearRange::new(2021, 2023))
        .await
        .unwrap();

    assert_eq!(
        rows,
        vec![
            YearCount { year: 2021, count: 40 },
            YearCount { year: 2022, count: 55 },
        ]
    );
    y2021.assert_hits_async(1).await;
    y2022.assert_hits_async(1).await;
    y2023.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_openaire_server_error_is_external_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/search/publications");
            then.status(500);
        })
        .await;

    let client = OpenAireClient::new(server.url("/search/publications"), None, TIMEOUT).unwrap();
    let err = client.count_for_year("graphene", 2020).await.unwrap_err();
    assert!(matches!(err, RadarError::ExternalService { ref message, .. } if message == "HTTP 500"));
    assert!(err.is_transient());
}

fn papers(prefix: &str, n: usize) -> Vec<serde_json::Value> {
    (0..n)
        .map(|i| {
            json!({
                "title": format!("{} {}", prefix, i),
                "year": 2020,
                "citationCount": i,
                "influentialCitationCount": 0,
                "venue": "Nature",
                "authors": [{"name": "A. Author"}],
                "publicationTypes": ["JournalArticle"],
            })
        })
        .collect()
}

#[tokio::test]
async fn test_semantic_scholar_pages_until_limit() {
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/paper/search")
                .query_param("query", "quantum computing")
                .query_param("year", "2015-2025")
                .query_param("offset", "0")
                .query_param("limit", "100")
                .header("x-api-key", "s2-key");
            then.status(200)
                .json_body(json!({"total": 500, "offset": 0, "next": 100, "data": papers("first", 100)}));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/paper/search")
                .query_param("offset", "100")
                .query_param("limit", "50");
            then.status(200)
                .json_body(json!({"total": 500, "offset": 100, "next": 150, "data": papers("second", 50)}));
        })
        .await;

    let client = SemanticScholarClient::new(
        server.url("/paper/search"),
        Some("s2-key".to_string()),
        TIMEOUT,
    )
    .unwrap();
    let result = client
        .search("quantum computing", YearRange::new(2015, 2025), 150)
        .await
        .unwrap();

    assert_eq!(result.len(), 150);
    assert_eq!(result[0].title, "first 0");
    assert_eq!(result[149].title, "second 49");
    assert_eq!(result[1].authors, vec!["A. Author".to_string()]);
    first.assert_hits_async(1).await;
    second.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_semantic_scholar_stops_without_next_page() {
    let server = MockServer::start_async().await;
    let search = server
        .mock_async(|when, then| {
            when.method(GET).path("/paper/search");
            then.status(200).json_body(json!({
                "total": 2,
                "offset": 0,
                "data": [
                    {"title": "Sparse record", "year": null, "citationCount": null},
                    {"title": "Second", "year": 2021, "citationCount": 7, "authors": []}
                ]
            }));
        })
        .await;

    let client = SemanticScholarClient::new(server.url("/paper/search"), None, TIMEOUT).unwrap();
    let result = client
        .search("perovskite", YearRange::new(2020, 2024), 200)
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result[0].year, None);
    assert_eq!(result[0].citation_count, 0);
    assert_eq!(result[1].citation_count, 7);
    search.assert_hits_async(1).await;
}

fn lei_body(name: &str, city: &str, country: &str) -> serde_json::Value {
    json!({
        "data": [{
            "type": "lei-records",
            "attributes": {
                "lei": "7LTWFZYICNSX8D621K86",
                "entity": {
                    "legalName": {"name": name, "language": "de"},
                    "legalAddress": {"city": city, "country": country}
                }
            }
        }]
    })
}

#[tokio::test]
async fn test_gleif_caches_hits_and_persists_them() {
    let temp_dir = TempDir::new().unwrap();
    let cache_path = temp_dir.path().join("gleif-cache.json");
    let server = MockServer::start_async().await;
    let lookup = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/lei-records")
                .query_param("filter[entity.legalName]", "Siemens")
                .query_param("page[size]", "1");
            then.status(200).json_body(lei_body("Siemens Aktiengesellschaft", "Muenchen", "DE"));
        })
        .await;

    let client = GleifClient::new(server.url("/lei-records"), TIMEOUT, Duration::ZERO)
        .unwrap()
        .with_cache_file(&cache_path)
        .await;

    let first = client.resolve("Siemens").await.unwrap().unwrap();
    let second = client.resolve("SIEMENS").await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.legal_name, "Siemens Aktiengesellschaft");
    assert_eq!(first.country, "DE");
    assert_eq!(first.city, "Muenchen");
    lookup.assert_hits_async(1).await;

    let reloaded = GleifClient::new(server.url("/lei-records"), TIMEOUT, Duration::ZERO)
        .unwrap()
        .with_cache_file(&cache_path)
        .await;
    assert_eq!(reloaded.cache_len(), 1);
    assert_eq!(reloaded.resolve("siemens").await.unwrap(), Some(first));
    lookup.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_gleif_caches_misses() {
    let server = MockServer::start_async().await;
    let lookup = server
        .mock_async(|when, then| {
            when.method(GET).path("/lei-records");
            then.status(200).json_body(json!({"data": []}));
        })
        .await;

    let client = GleifClient::new(server.url("/lei-records"), TIMEOUT, Duration::ZERO).unwrap();
    assert_eq!(client.resolve("Unknown Garage Lab").await.unwrap(), None);
    assert_eq!(client.resolve("Unknown Garage Lab").await.unwrap(), None);
    lookup.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_gleif_rate_limit_is_not_cached() {
    let server = MockServer::start_async().await;
    let lookup = server
        .mock_async(|when, then| {
            when.method(GET).path("/lei-records");
            then.status(429);
        })
        .await;

    let client = GleifClient::new(server.url("/lei-records"), TIMEOUT, Duration::ZERO).unwrap();
    let err = client.resolve("IBM").await.unwrap_err();
    assert!(matches!(err, RadarError::RateLimited { ref service } if service == "GLEIF"));
    assert!(client.resolve("IBM").await.is_err());
    assert_eq!(client.cache_len(), 0);
    lookup.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_gleif_spaces_consecutive_calls() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/lei-records");
            then.status(200).json_body(json!({"data": []}));
        })
        .await;

    let client = GleifClient::new(
        server.url("/lei-records"),
        TIMEOUT,
        Duration::from_millis(200),
    )
    .unwrap();
    let started = std::time::Instant::now();
    client.resolve("Alpha").await.unwrap();
    client.resolve("Beta").await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
}
