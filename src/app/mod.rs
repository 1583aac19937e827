pub mod routines;

use crate::adapters::{GleifClient, OpenAireClient, SemanticScholarClient, SnapshotDataset};
use crate::app::routines::{standard_routines, OPENAIRE_SOURCE};
use crate::config::RadarConfig;
use crate::core::{CredentialCheck, RadarEngine};
use crate::domain::ports::DataSources;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A ready engine plus the size of the dataset it was built on.
pub struct RadarApp {
    pub engine: RadarEngine,
    pub patent_records: usize,
    pub project_records: usize,
}

/// Loads the snapshot, builds the enabled reference-data clients and wires
/// the standard routines into one engine.
pub async fn build_app(config: &RadarConfig) -> Result<RadarApp> {
    let dataset = Arc::new(SnapshotDataset::load(&config.data.snapshot_path).await?);
    let patent_records = dataset.patent_count();
    let project_records = dataset.project_count();

    let mut sources = DataSources::new(dataset.clone(), dataset);
    let mut credentials = Vec::new();

    if config.openaire.enabled {
        let section = &config.openaire;
        let client = OpenAireClient::new(
            section.endpoint.clone(),
            section.access_token.clone(),
            Duration::from_secs(section.timeout_seconds),
        )?;
        sources = sources.with_publications(Arc::new(client));
        if let Some(token) = section.access_token.as_ref().filter(|t| !t.trim().is_empty()) {
            credentials.push(CredentialCheck {
                source: OPENAIRE_SOURCE.to_string(),
                token: token.clone(),
                has_refresh_token: section
                    .refresh_token
                    .as_ref()
                    .is_some_and(|t| !t.trim().is_empty()),
            });
        }
        debug!("OpenAIRE client enabled ({})", section.endpoint);
    }

    if config.semantic_scholar.enabled {
        let section = &config.semantic_scholar;
        let client = SemanticScholarClient::new(
            section.endpoint.clone(),
            section.api_key.clone(),
            Duration::from_secs(section.timeout_seconds),
        )?;
        sources = sources.with_citations(Arc::new(client));
        debug!("Semantic Scholar client enabled ({})", section.endpoint);
    }

    if config.gleif.enabled {
        let section = &config.gleif;
        let mut client = GleifClient::new(
            section.endpoint.clone(),
            Duration::from_secs(section.timeout_seconds),
            Duration::from_millis(section.min_interval_ms),
        )?
        .with_cache_ttl(section.cache_ttl_days);
        if let Some(path) = &section.cache_path {
            client = client.with_cache_file(path).await;
        }
        debug!("GLEIF client enabled ({} cached entries)", client.cache_len());
        sources = sources.with_entities(Arc::new(client));
    }

    let mut engine = RadarEngine::new(sources, standard_routines(&config.routine_settings()))
        .with_timeout(config.timeout());
    if let Some(year) = config.radar.reference_year {
        engine = engine.with_reference_year(year);
    }
    for check in credentials {
        engine = engine.with_credential_check(check);
    }

    info!(
        "🔧 Radar ready: {} routines, {} patents, {} projects",
        engine.routine_names().len(),
        patent_records,
        project_records
    );
    Ok(RadarApp {
        engine,
        patent_records,
        project_records,
    })
}
