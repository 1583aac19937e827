mod common;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use httpmock::prelude::*;
use serde_json::json;
use std::io::Write;
use tech_radar::domain::model::{AlertSeverity, PanelStatus};
use tech_radar::utils::validation::Validate;
use tech_radar::{build_app, RadarConfig};
use tempfile::{NamedTempFile, TempDir};
use tokio_test::assert_ok;

fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({"sub": "radar", "exp": exp}).to_string());
    format!("{}.{}.signature", header, payload)
}

#[tokio::test]
async fn test_config_file_wires_all_reference_services() {
    let temp_dir = TempDir::new().unwrap();
    let snapshot = common::write_snapshot(temp_dir.path());
    let cache_path = temp_dir.path().join("gleif.json");

    let server = MockServer::start_async().await;
    let publications = server
        .mock_async(|when, then| {
            when.method(GET).path("/openaire/publications");
            then.status(200)
                .json_body(json!({"response": {"header": {"total": {"$": 12}}}}));
        })
        .await;
    let registry = server
        .mock_async(|when, then| {
            when.method(GET).path("/gleif/lei-records");
            then.status(200).json_body(json!({
                "data": [{
                    "attributes": {
                        "lei": "LEI0000000000000001",
                        "entity": {
                            "legalName": {"name": "Registered Holding AG"},
                            "headquartersAddress": {"city": "Zug", "country": "CH"}
                        }
                    }
                }]
            }));
        })
        .await;

    // Expired in September 2020.
    std::env::set_var("RADAR_IT_OPENAIRE_TOKEN", jwt_with_exp(1_600_000_000));
    let toml = format!(
        r#"
[radar]
timeout_seconds = 20
reference_year = 2025

[data]
snapshot_path = "{snapshot}"

[openaire]
enabled = true
endpoint = "{openaire}"
access_token = "${{RADAR_IT_OPENAIRE_TOKEN}}"

[semantic_scholar]
enabled = false

[gleif]
enabled = true
endpoint = "{gleif}"
min_interval_ms = 0
max_lookups = 3
cache_path = "{cache}"
"#,
        snapshot = snapshot.display(),
        openaire = server.url("/openaire/publications"),
        gleif = server.url("/gleif/lei-records"),
        cache = cache_path.display(),
    );
    let mut config_file = NamedTempFile::new().unwrap();
    config_file.write_all(toml.as_bytes()).unwrap();

    let config = RadarConfig::from_file(config_file.path()).unwrap();
    std::env::remove_var("RADAR_IT_OPENAIRE_TOKEN");
    assert_ok!(config.validate());
    assert!(config.openaire.access_token.as_deref().unwrap().contains('.'));

    let app = build_app(&config).await.unwrap();
    let response = app
        .engine
        .analyze_request("quantum computing", None)
        .await
        .unwrap();

    // One request per year of 2015-2025.
    publications.assert_hits_async(11).await;
    assert_eq!(response.landscape.total_publications, 132);

    let openaire_alerts: Vec<_> = response
        .transparency
        .alerts
        .iter()
        .filter(|a| a.source == "OpenAIRE")
        .collect();
    assert_eq!(openaire_alerts.len(), 1);
    assert_eq!(openaire_alerts[0].severity, AlertSeverity::Error);
    assert!(openaire_alerts[0].message.contains("expired"));

    assert_eq!(response.research_impact.status, PanelStatus::SourceUnavailable);
    assert!(!response.geographic.headquarters.is_empty());
    assert_eq!(response.geographic.headquarters[0].entity.city, "Zug");
    assert!(response
        .transparency
        .sources_used
        .iter()
        .any(|s| s == "GLEIF"));
    assert!(registry.hits_async().await >= 1);
    assert!(cache_path.exists());
}

#[tokio::test]
async fn test_defaults_validate_and_disable_optional_services() {
    let config = RadarConfig::default();
    assert_ok!(config.validate());
    assert!(!config.openaire.enabled);
    assert!(!config.gleif.enabled);
    assert_eq!(config.routine_settings().max_papers, 200);
}
