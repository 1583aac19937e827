use crate::app::routines::{AnalysisRoutine, RoutineContext, RoutineOutput};
use crate::core::transparency::TransparencyAssembler;
use crate::domain::api_health::check_token_expiry;
use crate::domain::model::{ApiAlert, Query, RadarResponse};
use crate::domain::ports::DataSources;
use crate::utils::error::Result;
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bearer token whose expiry is reported as an alert on every run.
#[derive(Debug, Clone)]
pub struct CredentialCheck {
    pub source: String,
    pub token: String,
    pub has_refresh_token: bool,
}

/// Availability of the configured data sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub patents_complete_until: Option<i32>,
    pub projects_complete_until: Option<i32>,
    pub publications_enabled: bool,
    pub citations_enabled: bool,
    pub entity_resolution_enabled: bool,
}

/// Runs every analysis routine for one query and assembles the response.
/// Routines run as independent tasks under one shared deadline; a failing,
/// panicking or late routine only empties its own panel.
pub struct RadarEngine {
    sources: DataSources,
    routines: Vec<Arc<dyn AnalysisRoutine>>,
    timeout: Duration,
    reference_year: Option<i32>,
    credentials: Vec<CredentialCheck>,
}

impl RadarEngine {
    pub fn new(sources: DataSources, routines: Vec<Arc<dyn AnalysisRoutine>>) -> Self {
        Self {
            sources,
            routines,
            timeout: DEFAULT_TIMEOUT,
            reference_year: None,
            credentials: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pins the last year of the analysis window instead of the current year.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn with_credential_check(mut self, check: CredentialCheck) -> Self {
        self.credentials.push(check);
        self
    }

    pub fn routine_names(&self) -> Vec<&str> {
        self.routines.iter().map(|r| r.get_name()).collect()
    }

    /// Validates the raw request and runs the analysis. Invalid input is
    /// rejected before any routine starts.
    pub async fn analyze_request(&self, term: &str, horizon_years: Option<i32>) -> Result<RadarResponse> {
        let query = match horizon_years {
            Some(years) => Query::new(term, years)?,
            None => Query::with_default_horizon(term)?,
        };
        Ok(self.analyze(&query).await)
    }

    pub async fn analyze(&self, query: &Query) -> RadarResponse {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let reference_year = self.reference_year.unwrap_or_else(|| Utc::now().year());
        let range = query.year_range(reference_year);
        info!(
            "🚀 Starting analysis for '{}' ({}, {} routines)",
            query.term(),
            range.label(),
            self.routines.len()
        );

        let mut assembler = TransparencyAssembler::new();
        let now = Utc::now();
        for check in &self.credentials {
            if let Some(alert) = check_token_expiry(&check.token, &check.source, now, check.has_refresh_token) {
                warn!("🔑 {}", alert.message);
                assembler.alert(alert);
            }
        }

        let data_complete_until =
            match tokio::time::timeout_at(deadline, self.sources.patents.last_full_year()).await {
                Ok(Ok(year)) => year,
                Ok(Err(e)) => {
                    warn!("⚠️ Could not determine patent data completeness: {}", e);
                    assembler.warn(format!("Patent data completeness unknown: {}", e));
                    None
                }
                Err(_) => {
                    warn!("⏰ Completeness check ran into the deadline");
                    None
                }
            };
        debug!("Patent data complete until {:?}", data_complete_until);

        let context = Arc::new(RoutineContext {
            query: query.clone(),
            range,
            data_complete_until,
            sources: self.sources.clone(),
        });

        let handles: Vec<(Arc<dyn AnalysisRoutine>, JoinHandle<Result<RoutineOutput>>)> = self
            .routines
            .iter()
            .map(|routine| {
                let task_routine = Arc::clone(routine);
                let task_context = Arc::clone(&context);
                let handle = tokio::spawn(async move { task_routine.execute(&task_context).await });
                (Arc::clone(routine), handle)
            })
            .collect();

        let mut response = RadarResponse::empty(query, range);
        for (routine, mut handle) in handles {
            let name = routine.get_name().to_string();
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(Ok(output))) => {
                    if output.panel.kind() == routine.panel_kind() {
                        assembler.absorb(&output);
                        response.set_panel(output.panel);
                    } else {
                        error!("❌ Routine '{}' returned a {} panel", name, output.panel.kind());
                        assembler.warn(format!("{} returned an unexpected panel and was discarded", name));
                        assembler.alert(ApiAlert::error(name.clone(), "Routine returned the wrong panel"));
                    }
                }
                Ok(Ok(Err(e))) => {
                    error!("❌ Routine '{}' failed: {}", name, e);
                    assembler.warn(format!("{} analysis failed: {}", name, e));
                    assembler.alert(ApiAlert::error(name.clone(), e.user_friendly_message()));
                }
                Ok(Err(join_error)) => {
                    error!("❌ Routine '{}' aborted: {}", name, join_error);
                    assembler.warn(format!("{} analysis aborted unexpectedly", name));
                    assembler.alert(ApiAlert::error(name.clone(), "Routine aborted unexpectedly"));
                }
                Err(_) => {
                    handle.abort();
                    warn!("⏰ Routine '{}' abandoned at the deadline", name);
                    assembler.warn(format!(
                        "{} timeout: not finished within {}s",
                        name,
                        self.timeout.as_secs_f64()
                    ));
                    assembler.alert(ApiAlert::error(
                        name.clone(),
                        format!("{} analysis timed out", name),
                    ));
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        response.transparency = assembler.finish(elapsed_ms, data_complete_until);
        info!(
            "✅ Analysis for '{}' finished in {}ms ({} warnings, {} alerts)",
            query.term(),
            elapsed_ms,
            response.transparency.warnings.len(),
            response.transparency.alerts.len()
        );
        response
    }

    /// Title completions from both datasets, alphabetical and de-duplicated
    /// ignoring case.
    pub async fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let (patents, projects) = tokio::join!(
            self.sources.patents.suggest_titles(prefix, limit),
            self.sources.projects.suggest_titles(prefix, limit),
        );
        let mut titles: Vec<String> = patents?.into_iter().chain(projects?).collect();
        titles.sort_by_key(|t| t.to_lowercase());
        titles.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        titles.truncate(limit);
        Ok(titles)
    }

    pub async fn status(&self) -> Result<SourceStatus> {
        let (patents, projects) = tokio::join!(
            self.sources.patents.last_full_year(),
            self.sources.projects.last_full_year(),
        );
        Ok(SourceStatus {
            patents_complete_until: patents?,
            projects_complete_until: projects?,
            publications_enabled: self.sources.publications.is_some(),
            citations_enabled: self.sources.citations.is_some(),
            entity_resolution_enabled: self.sources.entities.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::snapshot::SnapshotDataset;
    use crate::app::routines::test_support::{sample_dataset, UnreachableStore};
    use crate::app::routines::{standard_routines, RoutineSettings, PATENT_SOURCE, PROJECT_SOURCE};
    use crate::domain::model::{
        AlertSeverity, FundingPanel, LandscapePanel, Panel, PanelKind, PanelStatus,
    };
    use crate::utils::error::RadarError;
    use async_trait::async_trait;

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
        Stall,
    }

    struct StubRoutine {
        name: &'static str,
        kind: PanelKind,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl AnalysisRoutine for StubRoutine {
        fn get_name(&self) -> &str {
            self.name
        }

        fn panel_kind(&self) -> PanelKind {
            self.kind
        }

        async fn run(&self, _context: &RoutineContext) -> Result<RoutineOutput> {
            match self.behaviour {
                Behaviour::Succeed => {
                    let mut output = RoutineOutput::new(Panel::Landscape(LandscapePanel {
                        status: PanelStatus::Complete,
                        total_patents: 7,
                        ..LandscapePanel::default()
                    }));
                    output.source("stub source");
                    output.warn("stub warning");
                    Ok(output)
                }
                Behaviour::Fail => Err(RadarError::store("projects", "disk gone")),
                Behaviour::Panic => panic!("routine bug"),
                Behaviour::Stall => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(RoutineOutput::new(Panel::Funding(FundingPanel::default())))
                }
            }
        }
    }

    fn stub(name: &'static str, kind: PanelKind, behaviour: Behaviour) -> Arc<dyn AnalysisRoutine> {
        Arc::new(StubRoutine { name, kind, behaviour })
    }

    fn sources(dataset: SnapshotDataset) -> DataSources {
        let dataset = Arc::new(dataset);
        DataSources::new(dataset.clone(), dataset)
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let engine = RadarEngine::new(
            sources(sample_dataset()),
            vec![
                stub("landscape", PanelKind::Landscape, Behaviour::Succeed),
                stub("maturity", PanelKind::Maturity, Behaviour::Fail),
                stub("competitive", PanelKind::Competitive, Behaviour::Panic),
            ],
        )
        .with_reference_year(2025);

        let response = engine.analyze(&Query::new("quantum computing", 10).unwrap()).await;

        assert_eq!(response.landscape.total_patents, 7);
        assert_eq!(response.panel_status(PanelKind::Landscape), PanelStatus::Complete);
        assert_eq!(response.panel_status(PanelKind::Maturity), PanelStatus::NotComputed);
        assert_eq!(response.panel_status(PanelKind::Competitive), PanelStatus::NotComputed);

        let record = &response.transparency;
        assert_eq!(record.sources_used, vec!["stub source"]);
        assert_eq!(record.warnings[0], "stub warning");
        assert!(record.warnings[1].starts_with("maturity analysis failed"));
        assert!(record.warnings[2].starts_with("competitive analysis aborted"));
        let alert_sources: Vec<&str> = record.alerts.iter().map(|a| a.source.as_str()).collect();
        assert_eq!(alert_sources, vec!["maturity", "competitive"]);
        assert!(record.alerts.iter().all(|a| a.severity == AlertSeverity::Error));
        assert_eq!(record.data_complete_until, Some(2023));
    }

    #[tokio::test]
    async fn test_slow_routine_is_abandoned_at_deadline() {
        let engine = RadarEngine::new(
            sources(sample_dataset()),
            vec![
                stub("funding", PanelKind::Funding, Behaviour::Stall),
                stub("landscape", PanelKind::Landscape, Behaviour::Succeed),
            ],
        )
        .with_timeout(Duration::from_millis(200))
        .with_reference_year(2025);

        let started = Instant::now();
        let response = engine.analyze(&Query::new("quantum computing", 10).unwrap()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(response.panel_status(PanelKind::Funding), PanelStatus::NotComputed);
        assert_eq!(response.landscape.total_patents, 7);
        assert!(response
            .transparency
            .warnings
            .iter()
            .any(|w| w.contains("funding") && w.contains("timeout")));
    }

    #[tokio::test]
    async fn test_mismatched_panel_is_discarded() {
        let engine = RadarEngine::new(
            sources(sample_dataset()),
            vec![stub("temporal", PanelKind::Temporal, Behaviour::Succeed)],
        )
        .with_reference_year(2025);
        let response = engine.analyze(&Query::new("quantum computing", 10).unwrap()).await;
        assert_eq!(response.landscape, LandscapePanel::default());
        assert_eq!(response.transparency.alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_dispatch() {
        let engine = RadarEngine::new(
            sources(sample_dataset()),
            vec![stub("landscape", PanelKind::Landscape, Behaviour::Panic)],
        );
        let err = engine.analyze_request("", Some(10)).await.unwrap_err();
        assert!(matches!(err, RadarError::InvalidQuery { .. }));
        let err = engine.analyze_request("quantum", Some(2)).await.unwrap_err();
        assert!(matches!(err, RadarError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_standard_routines_fill_every_panel() {
        let engine = RadarEngine::new(
            sources(sample_dataset()),
            standard_routines(&RoutineSettings::default()),
        )
        .with_reference_year(2025);
        let response = engine
            .analyze_request("quantum computing", None)
            .await
            .unwrap();

        assert_eq!(response.analysis_period, "2015-2025");
        for kind in PanelKind::ALL {
            assert_ne!(response.panel_status(kind), PanelStatus::NotComputed, "{}", kind);
        }
        assert!(response.transparency.deterministic);
        assert!(response.transparency.sources_used.len() >= 2);
    }

    #[tokio::test]
    async fn test_unreachable_stores_surface_as_source_alerts() {
        let store = Arc::new(UnreachableStore);
        let engine = RadarEngine::new(
            DataSources::new(store.clone(), store),
            standard_routines(&RoutineSettings::default()),
        )
        .with_reference_year(2025);
        let response = engine.analyze(&Query::new("quantum computing", 10).unwrap()).await;

        for kind in PanelKind::ALL {
            assert_eq!(response.panel_status(kind), PanelStatus::SourceUnavailable, "{}", kind);
        }
        let alert_sources: Vec<&str> = response
            .transparency
            .alerts
            .iter()
            .map(|a| a.source.as_str())
            .collect();
        assert_eq!(alert_sources, vec![PATENT_SOURCE, PROJECT_SOURCE]);
        assert!(response
            .transparency
            .alerts
            .iter()
            .all(|a| a.severity == AlertSeverity::Error));
        assert_eq!(response.transparency.data_complete_until, None);
    }

    #[tokio::test]
    async fn test_expired_credential_raises_alert() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;

        let payload = URL_SAFE_NO_PAD.encode(r#"{"exp": 1000}"#);
        let token = format!("header.{}.signature", payload);
        let engine = RadarEngine::new(sources(SnapshotDataset::default()), Vec::new())
            .with_reference_year(2025)
            .with_credential_check(CredentialCheck {
                source: "OpenAIRE".to_string(),
                token,
                has_refresh_token: false,
            });
        let response = engine.analyze(&Query::new("quantum computing", 10).unwrap()).await;
        assert_eq!(response.transparency.alerts.len(), 1);
        assert_eq!(response.transparency.alerts[0].source, "OpenAIRE");
        assert_eq!(response.transparency.alerts[0].severity, AlertSeverity::Error);
    }

    #[tokio::test]
    async fn test_suggest_and_status() {
        let engine = RadarEngine::new(sources(sample_dataset()), Vec::new());
        let titles = engine.suggest("quantum", 3).await.unwrap();
        assert!(titles.len() <= 3);
        assert!(titles.iter().all(|t| t.to_lowercase().contains("quantum")));

        let status = engine.status().await.unwrap();
        assert_eq!(status.patents_complete_until, Some(2023));
        assert_eq!(status.projects_complete_until, Some(2021));
        assert!(!status.citations_enabled);
    }
}
