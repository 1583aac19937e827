//! In-memory dataset store loaded from one JSON snapshot holding both the
//! patent and the project records. Implements both store ports.

use crate::domain::model::YearRange;
use crate::domain::ports::{
    ActorCount, CityCount, CoActivity, CountryCount, CountryPair, CpcAssignment, CrossBorderStats,
    FundingYear, InstrumentCount, OrganizationActivity, PatentStore, ProgrammeFunding,
    ProjectStore, YearActorCount, YearCount, YearProgrammeFunding,
};
use crate::utils::error::{RadarError, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub name: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatentRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    pub publication_date: NaiveDate,
    #[serde(default)]
    pub filing_country: String,
    #[serde(default)]
    pub applicants: Vec<ApplicantRecord>,
    #[serde(default)]
    pub cpc_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub is_sme: bool,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub objective: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub programme: String,
    #[serde(default)]
    pub funding_scheme: String,
    #[serde(default)]
    pub ec_contribution: f64,
    #[serde(default)]
    pub organizations: Vec<OrganizationRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    patents: Vec<PatentRecord>,
    #[serde(default)]
    projects: Vec<ProjectRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotDataset {
    patents: Vec<PatentRecord>,
    projects: Vec<ProjectRecord>,
}

impl SnapshotDataset {
    pub fn new(patents: Vec<PatentRecord>, projects: Vec<ProjectRecord>) -> Self {
        Self { patents, projects }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RadarError::store("snapshot", format!("cannot read {}: {}", path.display(), e))
        })?;
        let dataset = Self::from_json_str(&content)?;
        info!(
            "📦 Loaded snapshot {} ({} patents, {} projects)",
            path.display(),
            dataset.patents.len(),
            dataset.projects.len()
        );
        Ok(dataset)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: SnapshotFile = serde_json::from_str(content)
            .map_err(|e| RadarError::store("snapshot", format!("malformed snapshot: {}", e)))?;
        Ok(Self::new(file.patents, file.projects))
    }

    pub fn to_json_string(&self) -> Result<String> {
        let file = SnapshotFile {
            patents: self.patents.clone(),
            projects: self.projects.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn patent_count(&self) -> usize {
        self.patents.len()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    fn patents_matching<'a>(
        &'a self,
        term: &'a str,
        range: YearRange,
    ) -> impl Iterator<Item = &'a PatentRecord> + 'a {
        let needle = tokenize(term);
        self.patents.iter().filter(move |p| {
            range.contains(p.publication_date.year())
                && (phrase_matches(&p.title, &needle) || phrase_matches(&p.abstract_text, &needle))
        })
    }

    fn projects_matching<'a>(
        &'a self,
        term: &'a str,
        range: YearRange,
    ) -> impl Iterator<Item = &'a ProjectRecord> + 'a {
        let needle = tokenize(term);
        self.projects.iter().filter(move |p| {
            range.contains(p.start_date.year())
                && (phrase_matches(&p.title, &needle) || phrase_matches(&p.objective, &needle))
        })
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Case-insensitive match of `needle` as a run of whole words in `text`.
fn phrase_matches(text: &str, needle: &[String]) -> bool {
    if needle.is_empty() {
        return false;
    }
    let words = tokenize(text);
    words.windows(needle.len()).any(|window| window == needle)
}

/// Like [`phrase_matches`], but the last word only needs to start with the
/// last needle word.
fn prefix_matches(text: &str, needle: &[String]) -> bool {
    let Some((last, head)) = needle.split_last() else {
        return false;
    };
    let words = tokenize(text);
    words.windows(needle.len()).any(|window| {
        window[..head.len()] == *head && window[head.len()].starts_with(last.as_str())
    })
}

/// Last year with complete data: the newest record's year when it reaches
/// November, otherwise the year before.
fn last_full_year(newest: Option<NaiveDate>) -> Option<i32> {
    newest.map(|date| {
        if date.month() >= 11 {
            date.year()
        } else {
            date.year() - 1
        }
    })
}

fn ranked_counts(counts: BTreeMap<String, u64>) -> Vec<(String, u64)> {
    let mut rows: Vec<(String, u64)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

fn year_counts(years: impl Iterator<Item = i32>) -> Vec<YearCount> {
    let mut counts: BTreeMap<i32, u64> = BTreeMap::new();
    for year in years {
        *counts.entry(year).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(year, count)| YearCount { year, count })
        .collect()
}

fn pair_counts<'a>(groups: impl Iterator<Item = BTreeSet<&'a str>>) -> BTreeMap<(String, String), u64> {
    let mut pairs = BTreeMap::new();
    for group in groups {
        let members: Vec<&str> = group.into_iter().collect();
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                *pairs.entry((a.to_string(), b.to_string())).or_insert(0) += 1;
            }
        }
    }
    pairs
}

fn ranked_pairs(pairs: BTreeMap<(String, String), u64>, limit: usize) -> Vec<((String, String), u64)> {
    let mut rows: Vec<((String, String), u64)> = pairs.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(limit);
    rows
}

fn year_actor_rows(counts: BTreeMap<(i32, String), u64>) -> Vec<YearActorCount> {
    let mut rows: Vec<YearActorCount> = counts
        .into_iter()
        .map(|((year, name), count)| YearActorCount { year, name, count })
        .collect();
    rows.sort_by(|a, b| {
        a.year
            .cmp(&b.year)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

fn suggestions<'a>(titles: impl Iterator<Item = &'a String>, prefix: &str, limit: usize) -> Vec<String> {
    let needle = tokenize(prefix);
    let matched: BTreeSet<&String> = titles.filter(|t| prefix_matches(t, &needle)).collect();
    matched.into_iter().take(limit).cloned().collect()
}

#[async_trait]
impl PatentStore for SnapshotDataset {
    async fn count_by_year(&self, term: &str, range: YearRange) -> Result<Vec<YearCount>> {
        debug!("patents.count_by_year term={} range={}", term, range.label());
        Ok(year_counts(
            self.patents_matching(term, range)
                .map(|p| p.publication_date.year()),
        ))
    }

    async fn count_by_country(&self, term: &str, range: YearRange) -> Result<Vec<CountryCount>> {
        let mut counts = BTreeMap::new();
        for patent in self.patents_matching(term, range) {
            if !patent.filing_country.is_empty() {
                *counts.entry(patent.filing_country.clone()).or_insert(0) += 1;
            }
        }
        Ok(ranked_counts(counts)
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect())
    }

    async fn count_by_applicant_country(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<CountryCount>> {
        let mut counts = BTreeMap::new();
        for patent in self.patents_matching(term, range) {
            let countries: BTreeSet<&str> = patent
                .applicants
                .iter()
                .map(|a| a.country.as_str())
                .filter(|c| !c.is_empty())
                .collect();
            for country in countries {
                *counts.entry(country.to_string()).or_insert(0) += 1;
            }
        }
        Ok(ranked_counts(counts)
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect())
    }

    async fn top_applicants(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<ActorCount>> {
        let mut counts = BTreeMap::new();
        let mut countries: BTreeMap<String, String> = BTreeMap::new();
        for patent in self.patents_matching(term, range) {
            let names: BTreeSet<&str> = patent.applicants.iter().map(|a| a.name.as_str()).collect();
            for name in names {
                *counts.entry(name.to_string()).or_insert(0) += 1;
            }
            for applicant in &patent.applicants {
                if !applicant.country.is_empty() {
                    countries
                        .entry(applicant.name.clone())
                        .or_insert_with(|| applicant.country.clone());
                }
            }
        }
        Ok(ranked_counts(counts)
            .into_iter()
            .take(limit)
            .map(|(name, count)| ActorCount {
                country: countries.get(&name).cloned().unwrap_or_default(),
                name,
                count,
            })
            .collect())
    }

    async fn co_applicants(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<CoActivity>> {
        let pairs = pair_counts(
            self.patents_matching(term, range)
                .map(|p| p.applicants.iter().map(|a| a.name.as_str()).collect()),
        );
        Ok(ranked_pairs(pairs, limit)
            .into_iter()
            .map(|((actor_a, actor_b), count)| CoActivity {
                actor_a,
                actor_b,
                count,
            })
            .collect())
    }

    async fn cpc_assignments(&self, term: &str, range: YearRange) -> Result<Vec<CpcAssignment>> {
        Ok(self
            .patents_matching(term, range)
            .filter(|p| !p.cpc_codes.is_empty())
            .map(|p| CpcAssignment {
                patent_id: p.id.clone(),
                year: p.publication_date.year(),
                codes: p.cpc_codes.clone(),
            })
            .collect())
    }

    async fn applicants_by_year(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<YearActorCount>> {
        let mut counts = BTreeMap::new();
        for patent in self.patents_matching(term, range) {
            let names: BTreeSet<&str> = patent.applicants.iter().map(|a| a.name.as_str()).collect();
            for name in names {
                *counts
                    .entry((patent.publication_date.year(), name.to_string()))
                    .or_insert(0) += 1;
            }
        }
        Ok(year_actor_rows(counts))
    }

    async fn total_count(&self, term: &str, range: YearRange) -> Result<u64> {
        Ok(self.patents_matching(term, range).count() as u64)
    }

    async fn suggest_titles(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        Ok(suggestions(self.patents.iter().map(|p| &p.title), prefix, limit))
    }

    async fn last_full_year(&self) -> Result<Option<i32>> {
        Ok(last_full_year(
            self.patents.iter().map(|p| p.publication_date).max(),
        ))
    }
}

#[async_trait]
impl ProjectStore for SnapshotDataset {
    async fn count_by_year(&self, term: &str, range: YearRange) -> Result<Vec<YearCount>> {
        debug!("projects.count_by_year term={} range={}", term, range.label());
        Ok(year_counts(
            self.projects_matching(term, range)
                .map(|p| p.start_date.year()),
        ))
    }

    async fn count_by_country(&self, term: &str, range: YearRange) -> Result<Vec<CountryCount>> {
        let mut counts = BTreeMap::new();
        for project in self.projects_matching(term, range) {
            let countries: BTreeSet<&str> = project
                .organizations
                .iter()
                .map(|o| o.country.as_str())
                .filter(|c| !c.is_empty())
                .collect();
            for country in countries {
                *counts.entry(country.to_string()).or_insert(0) += 1;
            }
        }
        Ok(ranked_counts(counts)
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect())
    }

    async fn top_organizations(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<OrganizationActivity>> {
        let mut counts = BTreeMap::new();
        let mut details: BTreeMap<String, (String, bool, bool)> = BTreeMap::new();
        for project in self.projects_matching(term, range) {
            let names: BTreeSet<&str> = project.organizations.iter().map(|o| o.name.as_str()).collect();
            for name in names {
                *counts.entry(name.to_string()).or_insert(0) += 1;
            }
            for org in &project.organizations {
                let entry = details
                    .entry(org.name.clone())
                    .or_insert_with(|| (String::new(), false, false));
                if entry.0.is_empty() {
                    entry.0 = org.country.clone();
                }
                entry.1 |= org.is_sme;
                entry.2 |= org.role.eq_ignore_ascii_case("coordinator");
            }
        }
        Ok(ranked_counts(counts)
            .into_iter()
            .take(limit)
            .map(|(name, count)| {
                let (country, is_sme, is_coordinator) =
                    details.get(&name).cloned().unwrap_or_default();
                OrganizationActivity {
                    name,
                    country,
                    count,
                    is_sme,
                    is_coordinator,
                }
            })
            .collect())
    }

    async fn co_participation(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<CoActivity>> {
        let pairs = pair_counts(
            self.projects_matching(term, range)
                .map(|p| p.organizations.iter().map(|o| o.name.as_str()).collect()),
        );
        Ok(ranked_pairs(pairs, limit)
            .into_iter()
            .map(|((actor_a, actor_b), count)| CoActivity {
                actor_a,
                actor_b,
                count,
            })
            .collect())
    }

    async fn funding_by_year(&self, term: &str, range: YearRange) -> Result<Vec<FundingYear>> {
        let mut by_year: BTreeMap<i32, (f64, u64)> = BTreeMap::new();
        for project in self.projects_matching(term, range) {
            let entry = by_year.entry(project.start_date.year()).or_insert((0.0, 0));
            entry.0 += project.ec_contribution;
            entry.1 += 1;
        }
        Ok(by_year
            .into_iter()
            .map(|(year, (funding, projects))| FundingYear {
                year,
                funding,
                projects,
            })
            .collect())
    }

    async fn funding_by_programme(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<ProgrammeFunding>> {
        let mut by_programme: BTreeMap<String, (f64, u64)> = BTreeMap::new();
        for project in self.projects_matching(term, range) {
            let entry = by_programme
                .entry(project.programme.clone())
                .or_insert((0.0, 0));
            entry.0 += project.ec_contribution;
            entry.1 += 1;
        }
        let mut rows: Vec<ProgrammeFunding> = by_programme
            .into_iter()
            .map(|(programme, (funding, projects))| ProgrammeFunding {
                programme,
                funding,
                projects,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.funding
                .total_cmp(&a.funding)
                .then_with(|| a.programme.cmp(&b.programme))
        });
        Ok(rows)
    }

    async fn funding_by_year_and_programme(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<YearProgrammeFunding>> {
        let mut grouped: BTreeMap<(i32, String), (f64, u64)> = BTreeMap::new();
        for project in self.projects_matching(term, range) {
            let entry = grouped
                .entry((project.start_date.year(), project.programme.clone()))
                .or_insert((0.0, 0));
            entry.0 += project.ec_contribution;
            entry.1 += 1;
        }
        Ok(grouped
            .into_iter()
            .map(|((year, programme), (funding, projects))| YearProgrammeFunding {
                year,
                programme,
                funding,
                projects,
            })
            .collect())
    }

    async fn funding_by_instrument(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<InstrumentCount>> {
        let mut grouped: BTreeMap<(i32, String), (u64, f64)> = BTreeMap::new();
        for project in self.projects_matching(term, range) {
            if project.funding_scheme.is_empty() {
                continue;
            }
            let entry = grouped
                .entry((project.start_date.year(), project.funding_scheme.clone()))
                .or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += project.ec_contribution;
        }
        let mut rows: Vec<InstrumentCount> = grouped
            .into_iter()
            .map(|((year, instrument), (projects, funding))| InstrumentCount {
                year,
                instrument,
                projects,
                funding,
            })
            .collect();
        rows.sort_by(|a, b| {
            a.year
                .cmp(&b.year)
                .then_with(|| b.projects.cmp(&a.projects))
                .then_with(|| a.instrument.cmp(&b.instrument))
        });
        Ok(rows)
    }

    async fn orgs_by_city(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<CityCount>> {
        let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
        for project in self.projects_matching(term, range) {
            let cities: BTreeSet<(&str, &str)> = project
                .organizations
                .iter()
                .filter(|o| !o.city.is_empty())
                .map(|o| (o.city.as_str(), o.country.as_str()))
                .collect();
            for (city, country) in cities {
                *counts
                    .entry((city.to_string(), country.to_string()))
                    .or_insert(0) += 1;
            }
        }
        let mut rows: Vec<CityCount> = counts
            .into_iter()
            .map(|((city, country), count)| CityCount {
                city,
                country,
                count,
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.city.cmp(&b.city)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn country_collaboration_pairs(
        &self,
        term: &str,
        range: YearRange,
        limit: usize,
    ) -> Result<Vec<CountryPair>> {
        let pairs = pair_counts(self.projects_matching(term, range).map(|p| {
            p.organizations
                .iter()
                .map(|o| o.country.as_str())
                .filter(|c| !c.is_empty())
                .collect()
        }));
        Ok(ranked_pairs(pairs, limit)
            .into_iter()
            .map(|((country_a, country_b), count)| CountryPair {
                country_a,
                country_b,
                count,
            })
            .collect())
    }

    async fn cross_border_projects(
        &self,
        term: &str,
        range: YearRange,
        min_countries: usize,
    ) -> Result<CrossBorderStats> {
        let mut stats = CrossBorderStats::default();
        for project in self.projects_matching(term, range) {
            stats.total_projects += 1;
            let countries: BTreeSet<&str> = project
                .organizations
                .iter()
                .map(|o| o.country.as_str())
                .filter(|c| !c.is_empty())
                .collect();
            if countries.len() >= min_countries {
                stats.cross_border_projects += 1;
            }
        }
        Ok(stats)
    }

    async fn organizations_by_year(
        &self,
        term: &str,
        range: YearRange,
    ) -> Result<Vec<YearActorCount>> {
        let mut counts = BTreeMap::new();
        for project in self.projects_matching(term, range) {
            let names: BTreeSet<&str> = project.organizations.iter().map(|o| o.name.as_str()).collect();
            for name in names {
                *counts
                    .entry((project.start_date.year(), name.to_string()))
                    .or_insert(0) += 1;
            }
        }
        Ok(year_actor_rows(counts))
    }

    async fn total_count(&self, term: &str, range: YearRange) -> Result<u64> {
        Ok(self.projects_matching(term, range).count() as u64)
    }

    async fn suggest_titles(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        Ok(suggestions(self.projects.iter().map(|p| &p.title), prefix, limit))
    }

    async fn last_full_year(&self) -> Result<Option<i32>> {
        Ok(last_full_year(self.projects.iter().map(|p| p.start_date).max()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::routines::test_support::sample_dataset;
    use std::sync::Arc;

    fn range() -> YearRange {
        YearRange::new(2015, 2025)
    }

    #[test]
    fn test_phrase_matching() {
        let needle = tokenize("Quantum Computing");
        assert!(phrase_matches("Fault-tolerant quantum computing with qubits", &needle));
        assert!(!phrase_matches("Computing quantum states", &needle));
        assert!(!phrase_matches("quantum computingx", &needle));
        assert!(!phrase_matches("anything", &[]));

        let prefix = tokenize("quantum comp");
        assert!(prefix_matches("Quantum computers at scale", &prefix));
        assert!(!prefix_matches("Quantum dots", &prefix));
    }

    #[test]
    fn test_last_full_year_rule() {
        assert_eq!(last_full_year(NaiveDate::from_ymd_opt(2024, 11, 3)), Some(2024));
        assert_eq!(last_full_year(NaiveDate::from_ymd_opt(2024, 10, 31)), Some(2023));
        assert_eq!(last_full_year(None), None);
    }

    #[tokio::test]
    async fn test_patent_queries() {
        let store: Arc<dyn PatentStore> = Arc::new(sample_dataset());
        let years = store.count_by_year("quantum computing", range()).await.unwrap();
        assert_eq!(years.len(), 5);
        assert_eq!(store.total_count("quantum computing", range()).await.unwrap(), 5);
        assert_eq!(store.total_count("photonics", range()).await.unwrap(), 0);

        let applicants = store.top_applicants("quantum computing", range(), 10).await.unwrap();
        assert_eq!(applicants[0].name, "IBM");
        assert_eq!(applicants[0].count, 3);
        assert_eq!(applicants[0].country, "US");
        assert_eq!(applicants[1].name, "Google");

        let pairs = store.co_applicants("quantum computing", range(), 10).await.unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.actor_a < p.actor_b));

        let countries = store
            .count_by_applicant_country("quantum computing", range())
            .await
            .unwrap();
        assert_eq!(countries[0], CountryCount { country: "US".to_string(), count: 5 });

        assert_eq!(store.last_full_year().await.unwrap(), Some(2023));
    }

    #[tokio::test]
    async fn test_project_queries() {
        let store: Arc<dyn ProjectStore> = Arc::new(sample_dataset());
        let orgs = store.top_organizations("quantum computing", range(), 10).await.unwrap();
        assert_eq!(orgs.len(), 3);
        let qubitech = orgs.iter().find(|o| o.name == "Qubitech").unwrap();
        assert!(qubitech.is_sme);
        assert!(qubitech.is_coordinator);

        let cross = store
            .cross_border_projects("quantum computing", range(), 3)
            .await
            .unwrap();
        assert_eq!(cross.total_projects, 3);
        assert_eq!(cross.cross_border_projects, 1);

        let programmes = store.funding_by_programme("quantum computing", range()).await.unwrap();
        assert_eq!(programmes[0].programme, "HORIZON");
        assert_eq!(programmes[0].funding, 3_500_000.0);

        let cities = store.orgs_by_city("quantum computing", range(), 10).await.unwrap();
        assert_eq!(cities[0].count, 2);

        assert_eq!(store.last_full_year().await.unwrap(), Some(2021));
    }

    #[tokio::test]
    async fn test_suggestions_are_sorted_and_limited() {
        let store: Arc<dyn PatentStore> = Arc::new(sample_dataset());
        let titles = store.suggest_titles("quantum comp", 2).await.unwrap();
        assert_eq!(titles.len(), 2);
        assert!(titles[0] <= titles[1]);
    }

    #[tokio::test]
    async fn test_json_roundtrip_and_missing_file() {
        let json = sample_dataset().to_json_string().unwrap();
        let parsed = SnapshotDataset::from_json_str(&json).unwrap();
        assert_eq!(parsed.patents.len(), 5);

        let err = SnapshotDataset::load("/nonexistent/snapshot.json").await.unwrap_err();
        assert!(matches!(err, RadarError::StoreUnavailable { .. }));
    }
}
