use crate::app::routines::{RoutineOutput, ENTITY_SOURCE};
use crate::domain::model::{ApiAlert, LegalEntity};
use crate::domain::ports::EntityResolver;
use crate::utils::error::{RadarError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of an optional registry lookup over a list of organization names.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Enrichment {
    /// No resolver configured or nothing to look up.
    #[default]
    Skipped,
    Resolved(BTreeMap<String, LegalEntity>),
    /// The lookup failed; callers continue with the unenriched data.
    Failed(String),
}

impl Enrichment {
    /// Resolved entities, or nothing when enrichment did not happen.
    pub fn entities(&self) -> BTreeMap<String, LegalEntity> {
        match self {
            Enrichment::Resolved(map) => map.clone(),
            _ => BTreeMap::new(),
        }
    }

    /// Records the enrichment's provenance on a routine output.
    pub fn annotate(&self, output: &mut RoutineOutput, method: &str) {
        match self {
            Enrichment::Skipped => {}
            Enrichment::Resolved(map) => {
                if !map.is_empty() {
                    output.source(ENTITY_SOURCE);
                    output.method(method);
                }
            }
            Enrichment::Failed(reason) => {
                output.warn(format!("{} enrichment skipped: {}", ENTITY_SOURCE, reason));
                output.alert(ApiAlert::warning(
                    ENTITY_SOURCE,
                    format!("{} entity resolution unavailable; results are not enriched", ENTITY_SOURCE),
                ));
            }
        }
    }
}

/// Resolves up to `max_lookups` names within `budget`. Any failure, including
/// running out of budget, discards the partial result so the caller falls
/// back to the plain names.
pub async fn enrich_names(
    resolver: Option<&Arc<dyn EntityResolver>>,
    names: &[String],
    max_lookups: usize,
    budget: Duration,
) -> Enrichment {
    let Some(resolver) = resolver else {
        return Enrichment::Skipped;
    };
    if names.is_empty() || max_lookups == 0 {
        return Enrichment::Skipped;
    }

    let lookups = resolve_all(resolver.as_ref(), &names[..names.len().min(max_lookups)]);
    match tokio::time::timeout(budget, lookups).await {
        Ok(Ok(resolved)) => {
            debug!("Resolved {} of {} organizations", resolved.len(), names.len().min(max_lookups));
            Enrichment::Resolved(resolved)
        }
        Ok(Err(e)) => {
            warn!("⚠️ Entity resolution failed: {}", e);
            Enrichment::Failed(e.to_string())
        }
        Err(_) => {
            let e = RadarError::Timeout {
                operation: format!("{} enrichment", resolver.name()),
                timeout_ms: budget.as_millis() as u64,
            };
            warn!("⚠️ {}", e);
            Enrichment::Failed(e.to_string())
        }
    }
}

async fn resolve_all(
    resolver: &dyn EntityResolver,
    names: &[String],
) -> Result<BTreeMap<String, LegalEntity>> {
    let mut resolved = BTreeMap::new();
    for name in names {
        if let Some(entity) = resolver.resolve(name).await? {
            resolved.insert(name.clone(), entity);
        }
    }
    Ok(resolved)
}
