use crate::app::routines::enrichment::enrich_names;
use crate::app::routines::landscape::merge_countries;
use crate::app::routines::{
    share, AnalysisRoutine, RoutineContext, RoutineOutput, PATENT_SOURCE, PROJECT_SOURCE,
};
use crate::domain::model::{
    CityActivity, CountryPairActivity, GeographicPanel, Headquarters, Panel, PanelKind, PanelStatus,
};
use crate::domain::ports::CountryCount;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::info;

const COUNTRY_LIMIT: usize = 50;
const CITY_LIMIT: usize = 50;
const PAIR_LIMIT: usize = 30;
const CROSS_BORDER_MIN_COUNTRIES: usize = 3;
const APPLICANT_LOOKUPS: usize = 20;

/// Where the activity happens: countries, cities, cross-border collaboration
/// and registered headquarters of the leading applicants.
pub struct GeographicRoutine {
    max_lookups: usize,
    enrichment_budget: Duration,
}

impl GeographicRoutine {
    pub fn new(max_lookups: usize, enrichment_budget: Duration) -> Self {
        Self {
            max_lookups,
            enrichment_budget,
        }
    }
}

#[async_trait]
impl AnalysisRoutine for GeographicRoutine {
    fn get_name(&self) -> &str {
        "geographic"
    }

    fn panel_kind(&self) -> PanelKind {
        PanelKind::Geographic
    }

    async fn run(&self, ctx: &RoutineContext) -> Result<RoutineOutput> {
        let started = Instant::now();
        let term = ctx.term();
        let (patent_range, clip_warning) = ctx.patent_range();
        let patents = &ctx.sources.patents;
        let projects = &ctx.sources.projects;

        let (applicant_countries, filing_countries, project_countries, cities, pairs, cross_border, applicants) = tokio::join!(
            patents.count_by_applicant_country(term, patent_range),
            patents.count_by_country(term, patent_range),
            projects.count_by_country(term, ctx.range),
            projects.orgs_by_city(term, ctx.range, CITY_LIMIT),
            projects.country_collaboration_pairs(term, ctx.range, PAIR_LIMIT),
            projects.cross_border_projects(term, ctx.range, CROSS_BORDER_MIN_COUNTRIES),
            patents.top_applicants(term, patent_range, APPLICANT_LOOKUPS),
        );

        let mut output = RoutineOutput::new(Panel::Geographic(GeographicPanel::default()));
        if let Some(warning) = clip_warning {
            output.warn(warning);
        }

        let applicant_countries = output.settle(PATENT_SOURCE, "applicant_countries", applicant_countries);
        let filing_countries = output.settle(PATENT_SOURCE, "filing_countries", filing_countries);
        let project_countries = output.settle(PROJECT_SOURCE, "project_countries", project_countries);
        let cities = output.settle(PROJECT_SOURCE, "orgs_by_city", cities);
        let pairs = output.settle(PROJECT_SOURCE, "country_pairs", pairs);
        let applicants = output.settle(PATENT_SOURCE, "top_applicants", applicants);
        let cross_border = output.settle(PROJECT_SOURCE, "cross_border_projects", cross_border);

        let patent_countries: Vec<CountryCount> = if applicant_countries.is_empty() {
            filing_countries
        } else {
            output.method("Applicant country attribution");
            applicant_countries
        };
        if !patent_countries.is_empty() || !applicants.is_empty() {
            output.source(PATENT_SOURCE);
        }
        if !project_countries.is_empty() || cross_border.total_projects > 0 {
            output.source(PROJECT_SOURCE);
        }

        let country_distribution = merge_countries(&patent_countries, &project_countries, COUNTRY_LIMIT);
        if country_distribution.is_empty() && cities.is_empty() {
            output.panel = Panel::Geographic(GeographicPanel {
                status: PanelStatus::NoData,
                ..GeographicPanel::default()
            });
            return Ok(output);
        }
        output.method("Country aggregation (patents + projects)");

        let mut panel = GeographicPanel {
            status: PanelStatus::Complete,
            total_countries: country_distribution.len(),
            total_cities: cities.len(),
            cross_border_share: share(cross_border.cross_border_projects, cross_border.total_projects),
            country_distribution,
            city_distribution: cities
                .into_iter()
                .map(|c| CityActivity {
                    city: c.city,
                    country: c.country,
                    count: c.count,
                })
                .collect(),
            collaboration_pairs: pairs
                .into_iter()
                .map(|p| CountryPairActivity {
                    country_a: p.country_a,
                    country_b: p.country_b,
                    count: p.count,
                })
                .collect(),
            headquarters: Vec::new(),
        };
        if cross_border.total_projects > 0 {
            output.method(format!(
                "Cross-border share (projects with ≥{} countries)",
                CROSS_BORDER_MIN_COUNTRIES
            ));
        }

        let names: Vec<String> = applicants.iter().map(|a| a.name.clone()).collect();
        let enrichment = enrich_names(
            ctx.sources.entities.as_ref(),
            &names,
            self.max_lookups,
            self.enrichment_budget,
        )
        .await;
        enrichment.annotate(&mut output, "Legal-entity headquarters of top applicants");
        let entities = enrichment.entities();
        panel.headquarters = names
            .iter()
            .filter_map(|name| {
                entities.get(name).map(|entity| Headquarters {
                    applicant: name.clone(),
                    entity: entity.clone(),
                })
            })
            .collect();

        info!(
            "✅ Geographic computed: {} countries, {} cities ({:?})",
            panel.total_countries,
            panel.total_cities,
            started.elapsed()
        );
        output.panel = Panel::Geographic(panel);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::snapshot::SnapshotDataset;
    use crate::app::routines::enrichment::mock::MockResolver;
    use crate::app::routines::test_support::{context_for, context_with, sample_dataset, UnreachableStore};
    use crate::domain::ports::EntityResolver;
    use std::sync::Arc;

    fn routine() -> GeographicRoutine {
        GeographicRoutine::new(5, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_geographic_panel() {
        let ctx = context_for(sample_dataset(), 2015, 2025);
        let output = routine().run(&ctx).await.unwrap();
        let Panel::Geographic(panel) = output.panel else {
            panic!("wrong panel kind");
        };

        assert_eq!(panel.status, PanelStatus::Complete);
        assert_eq!(panel.total_countries, 4);
        assert_eq!(panel.country_distribution[0].country, "US");
        assert_eq!(panel.country_distribution[0].patents, 5);
        let germany = panel.country_distribution.iter().find(|c| c.country == "DE").unwrap();
        assert_eq!(germany.patents, 1);
        assert_eq!(germany.projects, 2);

        assert_eq!(panel.total_cities, 3);
        assert_eq!(panel.city_distribution[0].city, "Munich");
        assert_eq!(panel.collaboration_pairs[0].country_a, "DE");
        assert_eq!(panel.collaboration_pairs[0].country_b, "FR");
        assert_eq!(panel.collaboration_pairs[0].count, 2);
        assert_eq!(panel.cross_border_share, 0.3333);
        assert!(panel.headquarters.is_empty());
    }

    #[tokio::test]
    async fn test_geographic_headquarters() {
        let mut ctx = context_for(sample_dataset(), 2015, 2025);
        let resolver: Arc<dyn EntityResolver> =
            Arc::new(MockResolver::new(&[("Google", "LEI-GOOG", "US")]));
        ctx.sources.entities = Some(resolver);

        let output = routine().run(&ctx).await.unwrap();
        let Panel::Geographic(panel) = output.panel else {
            panic!("wrong panel kind");
        };
        assert_eq!(panel.headquarters.len(), 1);
        assert_eq!(panel.headquarters[0].applicant, "Google");
        assert_eq!(panel.headquarters[0].entity.lei, "LEI-GOOG");
    }

    #[tokio::test]
    async fn test_geographic_without_data() {
        let ctx = context_for(SnapshotDataset::default(), 2015, 2025);
        let output = routine().run(&ctx).await.unwrap();
        let Panel::Geographic(panel) = output.panel else {
            panic!("wrong panel kind");
        };
        assert_eq!(panel.status, PanelStatus::NoData);
        assert_eq!(panel.cross_border_share, 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_patent_store_keeps_project_geography() {
        let ctx = context_with(Arc::new(UnreachableStore), Arc::new(sample_dataset()), 2015, 2025);
        let output = routine().execute(&ctx).await.unwrap();

        assert!(output.alerts.is_empty());
        assert!(output.warnings.iter().any(|w| w.contains("applicant_countries")));
        let Panel::Geographic(panel) = output.panel else {
            panic!("wrong panel kind");
        };
        assert_eq!(panel.status, PanelStatus::Complete);
        assert!(panel.total_countries > 0);
    }
}
