pub mod competitive;
pub mod cpc_flow;
pub mod enrichment;
pub mod funding;
pub mod geographic;
pub mod landscape;
pub mod maturity;
pub mod research_impact;
pub mod temporal;

use crate::domain::model::{ApiAlert, Panel, PanelKind, PanelStatus, Query, YearRange};
use crate::domain::ports::{DataSources, YearCount};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const PATENT_SOURCE: &str = "EPO DOCDB (local snapshot)";
pub const PROJECT_SOURCE: &str = "CORDIS (local snapshot)";
pub const OPENAIRE_SOURCE: &str = "OpenAIRE";
pub const CITATION_SOURCE: &str = "Semantic Scholar";
pub const ENTITY_SOURCE: &str = "GLEIF";

/// Everything one routine may read during a single analysis run. Shared
/// read-only between all routines of that run.
pub struct RoutineContext {
    pub query: Query,
    pub range: YearRange,
    /// Last fully ingested patent year, computed once per run.
    pub data_complete_until: Option<i32>,
    pub sources: DataSources,
}

impl RoutineContext {
    pub fn term(&self) -> &str {
        self.query.term()
    }

    /// Range for patent queries, clipped to the last complete year. Returns
    /// the warning to surface when clipping happened.
    pub fn patent_range(&self) -> (YearRange, Option<String>) {
        match self.data_complete_until {
            Some(last) if last < self.range.end => (
                self.range.clipped_to(last),
                Some(format!(
                    "Patent data complete through {} (incomplete from {})",
                    last,
                    last + 1
                )),
            ),
            _ => (self.range, None),
        }
    }
}

/// One panel plus the provenance the routine collected while building it.
#[derive(Debug, Clone)]
pub struct RoutineOutput {
    pub panel: Panel,
    pub sources: Vec<String>,
    pub methods: Vec<String>,
    pub warnings: Vec<String>,
    pub alerts: Vec<ApiAlert>,
    pub deterministic: bool,
    queries: usize,
    failed_queries: usize,
    failed_sources: Vec<String>,
}

impl RoutineOutput {
    pub fn new(panel: Panel) -> Self {
        Self {
            panel,
            sources: Vec::new(),
            methods: Vec::new(),
            warnings: Vec::new(),
            alerts: Vec::new(),
            deterministic: true,
            queries: 0,
            failed_queries: 0,
            failed_sources: Vec::new(),
        }
    }

    pub fn source(&mut self, source: impl Into<String>) {
        push_unique(&mut self.sources, source.into());
    }

    pub fn method(&mut self, method: impl Into<String>) {
        push_unique(&mut self.methods, method.into());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn alert(&mut self, alert: ApiAlert) {
        self.alerts.push(alert);
    }

    /// Unwraps one sub-query against `source`, downgrading a failure to a
    /// warning and an empty value.
    pub fn settle<T: Default>(&mut self, source: &str, query: &str, result: Result<T>) -> T {
        self.queries += 1;
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!("⚠️ Query '{}' failed: {}", query, e);
                self.warn(format!("Query '{}' failed: {}", query, e));
                self.failed_queries += 1;
                push_unique(&mut self.failed_sources, source.to_string());
                T::default()
            }
        }
    }

    /// At least one query was settled and none of them succeeded.
    pub fn all_queries_failed(&self) -> bool {
        self.queries > 0 && self.failed_queries == self.queries
    }

    /// Marks the panel `SourceUnavailable` when every settled query failed,
    /// with one error alert per failing source.
    pub fn mark_unavailable_if_all_failed(&mut self) {
        if !self.all_queries_failed() {
            return;
        }
        self.panel.set_status(PanelStatus::SourceUnavailable);
        let kind = self.panel.kind();
        for source in self.failed_sources.clone() {
            if !self.alerts.iter().any(|a| a.source == source) {
                let message = format!("{} unreachable; {} panel has no data", source, kind);
                self.alerts.push(ApiAlert::error(source, message));
            }
        }
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// One independent analysis producing one panel.
#[async_trait]
pub trait AnalysisRoutine: Send + Sync {
    fn get_name(&self) -> &str;

    fn panel_kind(&self) -> PanelKind;

    async fn run(&self, context: &RoutineContext) -> Result<RoutineOutput>;

    /// `run`, then the store-outage check over the settled queries.
    async fn execute(&self, context: &RoutineContext) -> Result<RoutineOutput> {
        let mut output = self.run(context).await?;
        output.mark_unavailable_if_all_failed();
        Ok(output)
    }
}

/// Limits for the optional enrichment and citation lookups.
#[derive(Debug, Clone)]
pub struct RoutineSettings {
    pub enrichment_lookups: usize,
    pub enrichment_budget: Duration,
    pub max_papers: usize,
}

impl Default for RoutineSettings {
    fn default() -> Self {
        Self {
            enrichment_lookups: 5,
            enrichment_budget: Duration::from_secs(8),
            max_papers: 200,
        }
    }
}

/// The eight routines in panel declaration order.
pub fn standard_routines(settings: &RoutineSettings) -> Vec<Arc<dyn AnalysisRoutine>> {
    vec![
        Arc::new(landscape::LandscapeRoutine::new()),
        Arc::new(maturity::MaturityRoutine::new()),
        Arc::new(competitive::CompetitiveRoutine::new(
            settings.enrichment_lookups,
            settings.enrichment_budget,
        )),
        Arc::new(funding::FundingRoutine::new()),
        Arc::new(cpc_flow::CpcFlowRoutine::new()),
        Arc::new(geographic::GeographicRoutine::new(
            settings.enrichment_lookups,
            settings.enrichment_budget,
        )),
        Arc::new(research_impact::ResearchImpactRoutine::new(settings.max_papers)),
        Arc::new(temporal::TemporalRoutine::new()),
    ]
}

/// One value per year of `range`, zero where `rows` has no entry.
pub fn dense_series(range: YearRange, rows: &[YearCount]) -> Vec<(i32, u64)> {
    let by_year: BTreeMap<i32, u64> = rows.iter().map(|r| (r.year, r.count)).collect();
    range
        .years()
        .map(|year| (year, by_year.get(&year).copied().unwrap_or(0)))
        .collect()
}

/// Sorts `(name, count)` entries by count descending, then name ascending.
pub fn rank_by_count<T>(entries: &mut [T], key: impl Fn(&T) -> (&str, u64)) {
    entries.sort_by(|a, b| {
        let (name_a, count_a) = key(a);
        let (name_b, count_b) = key(b);
        count_b.cmp(&count_a).then_with(|| name_a.cmp(name_b))
    });
}

/// Share of `part` in `total`, rounded to 4 places.
pub fn share(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        crate::domain::metrics::round_to(part as f64 / total as f64, 4)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::adapters::snapshot::{
        ApplicantRecord, OrganizationRecord, PatentRecord, ProjectRecord, SnapshotDataset,
    };
    use crate::domain::ports::{
        ActorCount, CityCount, CoActivity, CountryCount, CountryPair, CpcAssignment,
        CrossBorderStats, FundingYear, InstrumentCount, OrganizationActivity, PatentStore,
        ProgrammeFunding, ProjectStore, YearActorCount, YearProgrammeFunding,
    };
    use crate::utils::error::RadarError;
    use chrono::NaiveDate;

    pub fn patent(id: &str, date: (i32, u32, u32), applicants: &[(&str, &str)], cpc: &[&str]) -> PatentRecord {
        PatentRecord {
            id: id.to_string(),
            title: format!("Quantum computing device {}", id),
            abstract_text: "A qubit arrangement for quantum computing.".to_string(),
            publication_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            filing_country: applicants.first().map(|a| a.1.to_string()).unwrap_or_default(),
            applicants: applicants
                .iter()
                .map(|(name, country)| ApplicantRecord {
                    name: name.to_string(),
                    country: country.to_string(),
                })
                .collect(),
            cpc_codes: cpc.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn project(
        id: &str,
        start: (i32, u32, u32),
        programme: &str,
        scheme: &str,
        funding: f64,
        orgs: &[(&str, &str, &str, bool, &str)],
    ) -> ProjectRecord {
        ProjectRecord {
            id: id.to_string(),
            title: format!("Scalable quantum computing {}", id),
            objective: "Advance quantum computing hardware.".to_string(),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            programme: programme.to_string(),
            funding_scheme: scheme.to_string(),
            ec_contribution: funding,
            organizations: orgs
                .iter()
                .map(|(name, country, city, is_sme, role)| OrganizationRecord {
                    name: name.to_string(),
                    country: country.to_string(),
                    city: city.to_string(),
                    is_sme: *is_sme,
                    role: role.to_string(),
                })
                .collect(),
        }
    }

    pub fn sample_dataset() -> SnapshotDataset {
        SnapshotDataset::new(
            vec![
                patent("EP1", (2019, 3, 1), &[("IBM", "US"), ("ETH Zurich", "CH")], &["G06N10/00", "H01L39/22"]),
                patent("EP2", (2020, 5, 1), &[("IBM", "US")], &["G06N10/40", "B82Y10/00"]),
                patent("EP3", (2021, 6, 1), &[("Google", "US")], &["G06N10/00", "H01L39/22", "B82Y10/00"]),
                patent("EP4", (2022, 7, 1), &[("Siemens", "DE"), ("IBM", "US")], &["H04L9/08"]),
                patent("EP5", (2023, 12, 1), &[("Google", "US")], &["G06N10/20", "H04L9/08"]),
            ],
            vec![
                project("P1", (2019, 1, 1), "H2020", "RIA", 2_000_000.0, &[
                    ("Siemens", "DE", "Munich", false, "coordinator"),
                    ("ETH Zurich", "CH", "Zurich", false, "participant"),
                    ("Qubitech", "FR", "Paris", true, "participant"),
                ]),
                project("P2", (2021, 1, 1), "HORIZON", "RIA", 3_000_000.0, &[
                    ("Siemens", "DE", "Munich", false, "participant"),
                    ("Qubitech", "FR", "Paris", true, "coordinator"),
                ]),
                project("P3", (2022, 1, 1), "HORIZON", "CSA", 500_000.0, &[
                    ("ETH Zurich", "CH", "Zurich", false, "coordinator"),
                ]),
            ],
        )
    }

    pub fn context_for(dataset: SnapshotDataset, start: i32, end: i32) -> RoutineContext {
        let dataset = Arc::new(dataset);
        context_with(dataset.clone(), dataset, start, end)
    }

    pub fn context_with(
        patents: Arc<dyn PatentStore>,
        projects: Arc<dyn ProjectStore>,
        start: i32,
        end: i32,
    ) -> RoutineContext {
        RoutineContext {
            query: Query::new("quantum computing", end - start).unwrap(),
            range: YearRange::new(start, end),
            data_complete_until: Some(2023),
            sources: DataSources::new(patents, projects),
        }
    }

    /// Store whose every query fails as if the database were down.
    pub struct UnreachableStore;

    fn down<T>() -> Result<T> {
        Err(RadarError::store("snapshot", "connection refused"))
    }

    #[async_trait]
    impl PatentStore for UnreachableStore {
        async fn count_by_year(&self, _: &str, _: YearRange) -> Result<Vec<YearCount>> {
            down()
        }
        async fn count_by_country(&self, _: &str, _: YearRange) -> Result<Vec<CountryCount>> {
            down()
        }
        async fn count_by_applicant_country(&self, _: &str, _: YearRange) -> Result<Vec<CountryCount>> {
            down()
        }
        async fn top_applicants(&self, _: &str, _: YearRange, _: usize) -> Result<Vec<ActorCount>> {
            down()
        }
        async fn co_applicants(&self, _: &str, _: YearRange, _: usize) -> Result<Vec<CoActivity>> {
            down()
        }
        async fn cpc_assignments(&self, _: &str, _: YearRange) -> Result<Vec<CpcAssignment>> {
            down()
        }
        async fn applicants_by_year(&self, _: &str, _: YearRange) -> Result<Vec<YearActorCount>> {
            down()
        }
        async fn total_count(&self, _: &str, _: YearRange) -> Result<u64> {
            down()
        }
        async fn suggest_titles(&self, _: &str, _: usize) -> Result<Vec<String>> {
            down()
        }
        async fn last_full_year(&self) -> Result<Option<i32>> {
            down()
        }
    }

    #[async_trait]
    impl ProjectStore for UnreachableStore {
        async fn count_by_year(&self, _: &str, _: YearRange) -> Result<Vec<YearCount>> {
            down()
        }
        async fn count_by_country(&self, _: &str, _: YearRange) -> Result<Vec<CountryCount>> {
            down()
        }
        async fn top_organizations(&self, _: &str, _: YearRange, _: usize) -> Result<Vec<OrganizationActivity>> {
            down()
        }
        async fn co_participation(&self, _: &str, _: YearRange, _: usize) -> Result<Vec<CoActivity>> {
            down()
        }
        async fn funding_by_year(&self, _: &str, _: YearRange) -> Result<Vec<FundingYear>> {
            down()
        }
        async fn funding_by_programme(&self, _: &str, _: YearRange) -> Result<Vec<ProgrammeFunding>> {
            down()
        }
        async fn funding_by_year_and_programme(&self, _: &str, _: YearRange) -> Result<Vec<YearProgrammeFunding>> {
            down()
        }
        async fn funding_by_instrument(&self, _: &str, _: YearRange) -> Result<Vec<InstrumentCount>> {
            down()
        }
        async fn orgs_by_city(&self, _: &str, _: YearRange, _: usize) -> Result<Vec<CityCount>> {
            down()
        }
        async fn country_collaboration_pairs(&self, _: &str, _: YearRange, _: usize) -> Result<Vec<CountryPair>> {
            down()
        }
        async fn cross_border_projects(&self, _: &str, _: YearRange, _: usize) -> Result<CrossBorderStats> {
            down()
        }
        async fn organizations_by_year(&self, _: &str, _: YearRange) -> Result<Vec<YearActorCount>> {
            down()
        }
        async fn total_count(&self, _: &str, _: YearRange) -> Result<u64> {
            down()
        }
        async fn suggest_titles(&self, _: &str, _: usize) -> Result<Vec<String>> {
            down()
        }
        async fn last_full_year(&self) -> Result<Option<i32>> {
            down()
        }
    }
}
