use crate::domain::model::{LegalEntity, YearRange};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Row types returned by the stores. Every query is scoped to a search term and
// a year range; rows are returned in a stable order (year asc, or count desc
// then name asc).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryCount {
    pub country: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCount {
    pub name: String,
    pub country: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationActivity {
    pub name: String,
    pub country: String,
    pub count: u64,
    pub is_sme: bool,
    pub is_coordinator: bool,
}

/// Two actors appearing on the same record. `actor_a < actor_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoActivity {
    pub actor_a: String,
    pub actor_b: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpcAssignment {
    pub patent_id: String,
    pub year: i32,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearActorCount {
    pub year: i32,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingYear {
    pub year: i32,
    pub funding: f64,
    pub projects: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgrammeFunding {
    pub programme: String,
    pub funding: f64,
    pub projects: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearProgrammeFunding {
    pub year: i32,
    pub programme: String,
    pub funding: f64,
    pub projects: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentCount {
    pub year: i32,
    pub instrument: String,
    pub projects: u64,
    pub funding: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCount {
    pub city: String,
    pub country: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryPair {
    pub country_a: String,
    pub country_b: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CrossBorderStats {
    pub total_projects: u64,
    pub cross_border_projects: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub year: Option<i32>,
    pub citation_count: u64,
    pub influential_citation_count: u64,
    pub venue: String,
    pub authors: Vec<String>,
    pub publication_types: Vec<String>,
}

/// Patent records and their applicants, CPC codes and filing countries.
#[async_trait]
pub trait PatentStore: Send + Sync {
    async fn count_by_year(&self, term: &str, range: YearRange) -> Result<Vec<YearCount>>;
    async fn count_by_country(&self, term: &str, range: YearRange) -> Result<Vec<CountryCount>>;
    /// Country of each applicant, counted once per patent and country.
    async fn count_by_applicant_country(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<CountryCount>>;
    async fn top_applicants(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<ActorCount>>;
    async fn co_applicants(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<CoActivity>>;
    async fn cpc_assignments(&self, term: &str, range: YearRange) -> Result<Vec<CpcAssignment>>;
    async fn applicants_by_year(&self, term: &str, range: YearRange)
        -> Result<Vec<YearActorCount>>;
    async fn total_count(&self, term: &str, range: YearRange) -> Result<u64>;
    async fn suggest_titles(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;
    /// Most recent year whose data is considered complete.
    async fn last_full_year(&self) -> Result<Option<i32>>;
}

/// Research projects, their participating organizations and funding.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn count_by_year(&self, term: &str, range: YearRange) -> Result<Vec<YearCount>>;
    async fn count_by_country(&self, term: &str, range: YearRange) -> Result<Vec<CountryCount>>;
    async fn top_organizations(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<OrganizationActivity>>;
    async fn co_participation(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<CoActivity>>;
    async fn funding_by_year(&self, term: &str, range: YearRange) -> Result<Vec<FundingYear>>;
    async fn funding_by_programme(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<ProgrammeFunding>>;
    async fn funding_by_year_and_programme(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<YearProgrammeFunding>>;
    async fn funding_by_instrument(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<InstrumentCount>>;
    async fn orgs_by_city(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<CityCount>>;
    async fn country_collaboration_pairs(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<CountryPair>>;
    /// Projects with participants from at least `min_countries` countries.
    async fn cross_border_projects(
        &self,
        term: &str,
        range: YearRange,
        min_countries: usize,
    ) -> Result<CrossBorderStats>;
    async fn organizations_by_year(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<YearActorCount>>;
    async fn total_count(&self, term: &str, range: YearRange) -> Result<u64>;
    async fn suggest_titles(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;
    async fn last_full_year(&self) -> Result<Option<i32>>;
}

/// Yearly publication counts from an external research-output index.
#[async_trait]
pub trait PublicationSource: Send + Sync {
    fn name(&self) -> &str;
    async fn count_by_year(&self, term: &str, range: YearRange) -> Result<Vec<YearCount>>;
}

#[async_trait]
pub trait CitationSource: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, term: &str, range: YearRange, limit: usize) -> Result<Vec<Paper>>;
}

/// Maps an organization name to its registry record. `Ok(None)` means the
/// registry has no match.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    fn name(&self) -> &str;
    async fn resolve(&self, organization: &str) -> Result<Option<LegalEntity>>;
}

/// Everything a routine may read from. Optional sources are `None` when the
/// corresponding client is disabled in configuration.
#[derive(Clone)]
pub struct DataSources {
    pub patents: Arc<dyn PatentStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub publications: Option<Arc<dyn PublicationSource>>,
    pub citations: Option<Arc<dyn CitationSource>>,
    pub entities: Option<Arc<dyn EntityResolver>>,
}

impl DataSources {
    pub fn new(patents: Arc<dyn PatentStore>, projects: Arc<dyn ProjectStore>) -> Self {
        Self {
            patents,
            projects,
            publications: None,
            citations: None,
            entities: None,
        }
    }

    pub fn with_publications(mut self, source: Arc<dyn PublicationSource>) -> Self {
        self.publications = Some(source);
        self
    }

    pub fn with_citations(mut self, source: Arc<dyn CitationSource>) -> Self {
        self.citations = Some(source);
        self
    }

    pub fn with_entities(mut self, resolver: Arc<dyn EntityResolver>) -> Self {
        self.entities = Some(resolver);
        self
    }
}
