use crate::utils::error::{RadarError, Result};
use crate::utils::validation::{validate_char_length, validate_non_empty_string, validate_range};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_TERM_CHARS: usize = 1;
pub const MAX_TERM_CHARS: usize = 200;
pub const MIN_HORIZON_YEARS: i32 = 3;
pub const MAX_HORIZON_YEARS: i32 = 30;
pub const DEFAULT_HORIZON_YEARS: i32 = 10;

/// One analysis request. Only constructible through [`Query::new`], so every
/// `Query` that reaches the engine has already been validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    term: String,
    horizon_years: i32,
}

impl Query {
    pub fn new(term: impl Into<String>, horizon_years: i32) -> Result<Self> {
        let term = term.into();
        validate_char_length("term", &term, MIN_TERM_CHARS, MAX_TERM_CHARS)
            .and_then(|_| validate_non_empty_string("term", &term))
            .map_err(|e| into_query_error("term", e))?;
        validate_range("horizon_years", horizon_years, MIN_HORIZON_YEARS, MAX_HORIZON_YEARS)
            .map_err(|e| into_query_error("horizon_years", e))?;
        Ok(Self {
            term,
            horizon_years,
        })
    }

    pub fn with_default_horizon(term: impl Into<String>) -> Result<Self> {
        Self::new(term, DEFAULT_HORIZON_YEARS)
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn horizon_years(&self) -> i32 {
        self.horizon_years
    }

    /// Analysis window ending at `reference_year`, inclusive on both ends.
    pub fn year_range(&self, reference_year: i32) -> YearRange {
        YearRange::new(reference_year - self.horizon_years, reference_year)
    }
}

fn into_query_error(field: &str, err: RadarError) -> RadarError {
    let reason = match err {
        RadarError::InvalidConfigValueError { reason, .. } => reason,
        other => other.to_string(),
    };
    RadarError::InvalidQuery {
        field: field.to_string(),
        reason,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    /// Same start, end clipped to `last_year` (never before `start`).
    pub fn clipped_to(&self, last_year: i32) -> YearRange {
        YearRange::new(self.start, last_year.clamp(self.start, self.end.max(self.start)))
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Which of the eight panels a routine fills. Declaration order is the order
/// warnings are merged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Landscape,
    Maturity,
    Competitive,
    Funding,
    CpcFlow,
    Geographic,
    ResearchImpact,
    Temporal,
}

impl PanelKind {
    pub const ALL: [PanelKind; 8] = [
        PanelKind::Landscape,
        PanelKind::Maturity,
        PanelKind::Competitive,
        PanelKind::Funding,
        PanelKind::CpcFlow,
        PanelKind::Geographic,
        PanelKind::ResearchImpact,
        PanelKind::Temporal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PanelKind::Landscape => "landscape",
            PanelKind::Maturity => "maturity",
            PanelKind::Competitive => "competitive",
            PanelKind::Funding => "funding",
            PanelKind::CpcFlow => "cpc_flow",
            PanelKind::Geographic => "geographic",
            PanelKind::ResearchImpact => "research_impact",
            PanelKind::Temporal => "temporal",
        }
    }
}

impl std::fmt::Display for PanelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a panel came to hold its values. The default marks a panel whose
/// routine failed or was abandoned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelStatus {
    #[default]
    NotComputed,
    Complete,
    NoData,
    SourceUnavailable,
}

// --- Landscape ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandscapePoint {
    pub year: i32,
    pub patents: u64,
    pub projects: u64,
    pub publications: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patents_growth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects_growth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publications_growth: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryActivity {
    pub country: String,
    pub patents: u64,
    pub projects: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandscapePanel {
    pub status: PanelStatus,
    pub total_patents: u64,
    pub total_projects: u64,
    pub total_publications: u64,
    pub time_series: Vec<LandscapePoint>,
    pub top_countries: Vec<CountryActivity>,
}

// --- Maturity ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitModel {
    Logistic,
    Gompertz,
    LinearTrend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaturityPhase {
    #[default]
    Unknown,
    Emerging,
    Growing,
    Mature,
    /// Declining or saturated.
    Declining,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaturityPoint {
    pub year: i32,
    pub patents: u64,
    pub cumulative: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedPoint {
    pub year: i32,
    pub fitted: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaturityPanel {
    pub status: PanelStatus,
    pub phase: MaturityPhase,
    pub confidence: f64,
    pub cagr: f64,
    pub maturity_percent: f64,
    pub saturation_level: f64,
    pub inflection_year: f64,
    pub fit_quality: f64,
    pub fit_model: Option<FitModel>,
    pub time_series: Vec<MaturityPoint>,
    pub fitted_curve: Vec<FittedPoint>,
}

// --- Competitive ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationBand {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Patent,
    Project,
    Both,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorShare {
    pub name: String,
    pub count: u64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    pub count: u64,
    pub actor_type: ActorType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

/// Registry record for an organization name, as returned by entity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalEntity {
    pub lei: String,
    pub legal_name: String,
    pub country: String,
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorRow {
    pub rank: usize,
    pub name: String,
    pub patents: u64,
    pub projects: u64,
    pub total: u64,
    pub share: f64,
    pub country: String,
    pub is_sme: bool,
    pub is_coordinator: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_entity: Option<LegalEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitivePanel {
    pub status: PanelStatus,
    pub concentration_index: f64,
    pub concentration_band: Option<ConcentrationBand>,
    pub top_3_share: f64,
    pub top_actors: Vec<ActorShare>,
    pub network_nodes: Vec<NetworkNode>,
    pub network_edges: Vec<NetworkEdge>,
    pub full_actors: Vec<ActorRow>,
}

// --- Funding ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingPoint {
    pub year: i32,
    pub funding: f64,
    pub projects: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgrammeFundingRow {
    pub programme: String,
    pub funding: f64,
    pub projects: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgrammeFundingPoint {
    pub year: i32,
    pub programme: String,
    pub funding: f64,
    pub projects: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRow {
    pub instrument: String,
    pub funding: f64,
    pub projects: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingPanel {
    pub status: PanelStatus,
    pub total_funding_eur: f64,
    pub funding_cagr: f64,
    pub funding_cagr_period: String,
    pub avg_project_size: f64,
    pub by_programme: Vec<ProgrammeFundingRow>,
    pub time_series: Vec<FundingPoint>,
    pub time_series_by_programme: Vec<ProgrammeFundingPoint>,
    pub instrument_breakdown: Vec<InstrumentRow>,
}

// --- CPC flow ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpcYearSlice {
    pub year: i32,
    pub code_counts: BTreeMap<String, u64>,
    /// Keyed `"A|B"` with `A < B`.
    pub pair_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpcFlowPanel {
    pub status: PanelStatus,
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    pub colors: Vec<String>,
    pub total_patents_analyzed: u64,
    pub total_connections: u64,
    pub cpc_level: usize,
    pub year_data: Vec<CpcYearSlice>,
    pub section_descriptions: BTreeMap<String, String>,
    /// Title of each label's subclass, falling back to its class or section.
    #[serde(default)]
    pub label_descriptions: BTreeMap<String, String>,
}

impl Default for CpcFlowPanel {
    fn default() -> Self {
        Self {
            status: PanelStatus::default(),
            labels: Vec::new(),
            matrix: Vec::new(),
            colors: Vec::new(),
            total_patents_analyzed: 0,
            total_connections: 0,
            cpc_level: 4,
            year_data: Vec::new(),
            section_descriptions: BTreeMap::new(),
            label_descriptions: BTreeMap::new(),
        }
    }
}

// --- Geographic ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityActivity {
    pub city: String,
    pub country: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryPairActivity {
    pub country_a: String,
    pub country_b: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headquarters {
    pub applicant: String,
    pub entity: LegalEntity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicPanel {
    pub status: PanelStatus,
    pub total_countries: usize,
    pub total_cities: usize,
    pub cross_border_share: f64,
    pub country_distribution: Vec<CountryActivity>,
    pub city_distribution: Vec<CityActivity>,
    pub collaboration_pairs: Vec<CountryPairActivity>,
    pub headquarters: Vec<Headquarters>,
}

// --- Research impact ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationYear {
    pub year: i32,
    pub citations: u64,
    pub paper_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopPaper {
    pub title: String,
    pub venue: String,
    pub year: Option<i32>,
    pub citations: u64,
    pub authors_short: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueShare {
    pub venue: String,
    pub count: u64,
    pub share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationTypeCount {
    pub publication_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchImpactPanel {
    pub status: PanelStatus,
    pub h_index: u64,
    pub avg_citations: f64,
    pub total_papers: u64,
    pub total_citations: u64,
    pub influential_ratio: f64,
    pub citation_trend: Vec<CitationYear>,
    pub top_papers: Vec<TopPaper>,
    pub top_venues: Vec<VenueShare>,
    pub publication_types: Vec<PublicationTypeCount>,
}

// --- Temporal ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorDynamicsPoint {
    pub year: i32,
    pub new_entrant_rate: f64,
    pub persistence_rate: f64,
    pub total_actors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorTimelineEntry {
    pub name: String,
    pub years_active: Vec<i32>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgrammeYear {
    pub year: i32,
    pub counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentYear {
    pub year: i32,
    pub instrument: String,
    pub count: u64,
    pub funding: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnologyBreadthPoint {
    pub year: i32,
    pub unique_cpc_sections: usize,
    pub unique_cpc_subclasses: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalPanel {
    pub status: PanelStatus,
    pub new_entrant_rate: f64,
    pub persistence_rate: f64,
    pub dominant_programme: String,
    pub actor_timeline: Vec<ActorTimelineEntry>,
    pub programme_evolution: Vec<ProgrammeYear>,
    pub entrant_persistence_trend: Vec<ActorDynamicsPoint>,
    pub instrument_evolution: Vec<InstrumentYear>,
    pub technology_breadth: Vec<TechnologyBreadthPoint>,
}

/// Output of one routine, tagged by the panel it fills.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Landscape(LandscapePanel),
    Maturity(MaturityPanel),
    Competitive(CompetitivePanel),
    Funding(FundingPanel),
    CpcFlow(CpcFlowPanel),
    Geographic(GeographicPanel),
    ResearchImpact(ResearchImpactPanel),
    Temporal(TemporalPanel),
}

impl Panel {
    pub fn kind(&self) -> PanelKind {
        match self {
            Panel::Landscape(_) => PanelKind::Landscape,
            Panel::Maturity(_) => PanelKind::Maturity,
            Panel::Competitive(_) => PanelKind::Competitive,
            Panel::Funding(_) => PanelKind::Funding,
            Panel::CpcFlow(_) => PanelKind::CpcFlow,
            Panel::Geographic(_) => PanelKind::Geographic,
            Panel::ResearchImpact(_) => PanelKind::ResearchImpact,
            Panel::Temporal(_) => PanelKind::Temporal,
        }
    }

    pub fn set_status(&mut self, status: PanelStatus) {
        match self {
            Panel::Landscape(p) => p.status = status,
            Panel::Maturity(p) => p.status = status,
            Panel::Competitive(p) => p.status = status,
            Panel::Funding(p) => p.status = status,
            Panel::CpcFlow(p) => p.status = status,
            Panel::Geographic(p) => p.status = status,
            Panel::ResearchImpact(p) => p.status = status,
            Panel::Temporal(p) => p.status = status,
        }
    }
}

// --- Transparency ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAlert {
    pub source: String,
    pub severity: AlertSeverity,
    pub message: String,
}

impl ApiAlert {
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            severity: AlertSeverity::Error,
            message: message.into(),
        }
    }

    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            severity: AlertSeverity::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparencyRecord {
    pub sources_used: Vec<String>,
    pub methods: Vec<String>,
    pub deterministic: bool,
    pub warnings: Vec<String>,
    pub alerts: Vec<ApiAlert>,
    pub elapsed_ms: u64,
    pub data_complete_until: Option<i32>,
}

impl Default for TransparencyRecord {
    fn default() -> Self {
        Self {
            sources_used: Vec::new(),
            methods: Vec::new(),
            deterministic: true,
            warnings: Vec::new(),
            alerts: Vec::new(),
            elapsed_ms: 0,
            data_complete_until: None,
        }
    }
}

/// The full answer to one [`Query`]. All eight panels are always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarResponse {
    pub technology: String,
    pub analysis_period: String,
    pub landscape: LandscapePanel,
    pub maturity: MaturityPanel,
    pub competitive: CompetitivePanel,
    pub funding: FundingPanel,
    pub cpc_flow: CpcFlowPanel,
    pub geographic: GeographicPanel,
    pub research_impact: ResearchImpactPanel,
    pub temporal: TemporalPanel,
    pub transparency: TransparencyRecord,
}

impl RadarResponse {
    pub fn empty(query: &Query, range: YearRange) -> Self {
        Self {
            technology: query.term().to_string(),
            analysis_period: range.label(),
            ..Self::default()
        }
    }

    pub fn set_panel(&mut self, panel: Panel) {
        match panel {
            Panel::Landscape(p) => self.landscape = p,
            Panel::Maturity(p) => self.maturity = p,
            Panel::Competitive(p) => self.competitive = p,
            Panel::Funding(p) => self.funding = p,
            Panel::CpcFlow(p) => self.cpc_flow = p,
            Panel::Geographic(p) => self.geographic = p,
            Panel::ResearchImpact(p) => self.research_impact = p,
            Panel::Temporal(p) => self.temporal = p,
        }
    }

    pub fn panel_status(&self, kind: PanelKind) -> PanelStatus {
        match kind {
            PanelKind::Landscape => self.landscape.status,
            PanelKind::Maturity => self.maturity.status,
            PanelKind::Competitive => self.competitive.status,
            PanelKind::Funding => self.funding.status,
            PanelKind::CpcFlow => self.cpc_flow.status,
            PanelKind::Geographic => self.geographic.status,
            PanelKind::ResearchImpact => self.research_impact.status,
            PanelKind::Temporal => self.temporal.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_validation() {
        assert!(Query::new("quantum computing", 10).is_ok());
        assert!(Query::with_default_horizon("solid-state battery").is_ok());

        let err = Query::new("", 10).unwrap_err();
        assert!(matches!(err, RadarError::InvalidQuery { ref field, .. } if field == "term"));

        assert!(Query::new("   ", 10).is_err());
        assert!(Query::new("x".repeat(201), 10).is_err());
        assert!(Query::new("x".repeat(200), 10).is_ok());

        let err = Query::new("lidar", 2).unwrap_err();
        assert!(matches!(err, RadarError::InvalidQuery { ref field, .. } if field == "horizon_years"));
        assert!(Query::new("lidar", 31).is_err());
        assert!(Query::new("lidar", 3).is_ok());
        assert!(Query::new("lidar", 30).is_ok());
    }

    #[test]
    fn test_year_range() {
        let query = Query::new("lidar", 10).unwrap();
        let range = query.year_range(2025);
        assert_eq!(range, YearRange::new(2015, 2025));
        assert_eq!(range.label(), "2015-2025");
        assert_eq!(range.years().count(), 11);
        assert_eq!(range.clipped_to(2023), YearRange::new(2015, 2023));
        assert_eq!(range.clipped_to(2030), YearRange::new(2015, 2025));
        assert_eq!(range.clipped_to(2000), YearRange::new(2015, 2015));
    }

    #[test]
    fn test_empty_response_has_every_panel_key() {
        let query = Query::new("lidar", 10).unwrap();
        let response = RadarResponse::empty(&query, query.year_range(2025));
        let json = serde_json::to_value(&response).unwrap();
        for kind in PanelKind::ALL {
            assert!(json.get(kind.name()).is_some(), "missing {}", kind);
            assert_eq!(response.panel_status(kind), PanelStatus::NotComputed);
        }
        assert_eq!(json["transparency"]["deterministic"], true);
        assert_eq!(json["cpc_flow"]["cpc_level"], 4);
    }

    #[test]
    fn test_growth_is_omitted_when_undefined() {
        let point = LandscapePoint {
            year: 2020,
            patents: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&point).unwrap();
        assert!(json.get("patents_growth").is_none());
    }
}
