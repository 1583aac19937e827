use crate::app::routines::{
    dense_series, AnalysisRoutine, RoutineContext, RoutineOutput, OPENAIRE_SOURCE, PATENT_SOURCE,
    PROJECT_SOURCE,
};
use crate::domain::metrics::{growth_rate, round_to};
use crate::domain::model::{
    ApiAlert, CountryActivity, LandscapePanel, LandscapePoint, Panel, PanelKind, PanelStatus,
    YearRange,
};
use crate::domain::ports::{CountryCount, YearCount};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

const TOP_COUNTRIES: usize = 20;

/// Activity overview: yearly patents, projects and publications with growth
/// rates, plus the most active countries across both datasets.
pub struct LandscapeRoutine;

impl LandscapeRoutine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LandscapeRoutine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisRoutine for LandscapeRoutine {
    fn get_name(&self) -> &str {
        "landscape"
    }

    fn panel_kind(&self) -> PanelKind {
        PanelKind::Landscape
    }

    async fn run(&self, ctx: &RoutineContext) -> Result<RoutineOutput> {
        let started = Instant::now();
        let term = ctx.term();
        let range = ctx.range;
        let (patent_range, clip_warning) = ctx.patent_range();
        let patents = &ctx.sources.patents;
        let projects = &ctx.sources.projects;

        let publications = async {
            match &ctx.sources.publications {
                Some(source) => Some(source.count_by_year(term, range).await),
                None => None,
            }
        };

        let (patent_years, patent_countries, project_years, project_countries, publication_years) = tokio::join!(
            patents.count_by_year(term, patent_range),
            patents.count_by_country(term, patent_range),
            projects.count_by_year(term, range),
            projects.count_by_country(term, range),
            publications,
        );

        let mut output = RoutineOutput::new(Panel::Landscape(LandscapePanel::default()));
        if let Some(warning) = clip_warning {
            output.warn(warning);
        }

        let patent_years = output.settle(PATENT_SOURCE, "patent_years", patent_years);
        let patent_countries = output.settle(PATENT_SOURCE, "patent_countries", patent_countries);
        let project_years = output.settle(PROJECT_SOURCE, "project_years", project_years);
        let project_countries = output.settle(PROJECT_SOURCE, "project_countries", project_countries);
        let publication_years = match publication_years {
            Some(Ok(rows)) => output.settle(OPENAIRE_SOURCE, "publication_years", Ok(rows)),
            Some(Err(e)) => {
                output.alert(ApiAlert::error(
                    OPENAIRE_SOURCE,
                    format!("{}: publication counts unavailable", OPENAIRE_SOURCE),
                ));
                output.settle(OPENAIRE_SOURCE, "publication_years", Err(e))
            }
            None => Vec::new(),
        };

        let total_patents: u64 = patent_years.iter().map(|r| r.count).sum();
        let total_projects: u64 = project_years.iter().map(|r| r.count).sum();
        let total_publications: u64 = publication_years.iter().map(|r| r.count).sum();

        if !patent_years.is_empty() || !patent_countries.is_empty() {
            output.source(PATENT_SOURCE);
        }
        if !project_years.is_empty() || !project_countries.is_empty() {
            output.source(PROJECT_SOURCE);
        }
        if !publication_years.is_empty() {
            output.source(OPENAIRE_SOURCE);
        }
        output.method("Full-text phrase search");
        output.method("Yearly aggregation");
        output.method("Year-over-year growth (%)");

        let status = if total_patents + total_projects + total_publications > 0 {
            PanelStatus::Complete
        } else {
            PanelStatus::NoData
        };

        output.panel = Panel::Landscape(LandscapePanel {
            status,
            total_patents,
            total_projects,
            total_publications,
            time_series: merge_time_series(range, &patent_years, &project_years, &publication_years),
            top_countries: merge_countries(&patent_countries, &project_countries, TOP_COUNTRIES),
        });

        info!(
            "✅ Landscape computed: {} patents, {} projects, {} publications ({:?})",
            total_patents,
            total_projects,
            total_publications,
            started.elapsed()
        );
        Ok(output)
    }
}

fn merge_time_series(
    range: YearRange,
    patents: &[YearCount],
    projects: &[YearCount],
    publications: &[YearCount],
) -> Vec<LandscapePoint> {
    let patents = dense_series(range, patents);
    let projects = dense_series(range, projects);
    let publications = dense_series(range, publications);

    let as_f64 = |series: &[(i32, u64)]| series.iter().map(|(_, c)| *c as f64).collect::<Vec<_>>();
    let patent_growth = growth_rate(&as_f64(&patents));
    let project_growth = growth_rate(&as_f64(&projects));
    let publication_growth = growth_rate(&as_f64(&publications));

    patents
        .iter()
        .enumerate()
        .map(|(i, (year, count))| LandscapePoint {
            year: *year,
            patents: *count,
            projects: projects[i].1,
            publications: publications[i].1,
            patents_growth: patent_growth[i].map(|g| round_to(g, 1)),
            projects_growth: project_growth[i].map(|g| round_to(g, 1)),
            publications_growth: publication_growth[i].map(|g| round_to(g, 1)),
        })
        .collect()
}

/// Merges patent and project country counts, ranked by combined total.
pub fn merge_countries(
    patents: &[CountryCount],
    projects: &[CountryCount],
    limit: usize,
) -> Vec<CountryActivity> {
    let mut merged: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for row in patents {
        merged.entry(row.country.as_str()).or_default().0 += row.count;
    }
    for row in projects {
        merged.entry(row.country.as_str()).or_default().1 += row.count;
    }

    let mut rows: Vec<CountryActivity> = merged
        .into_iter()
        .map(|(country, (patents, projects))| CountryActivity {
            country: country.to_string(),
            patents,
            projects,
            total: patents + projects,
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.country.cmp(&b.country)));
    rows.truncate(limit);
    rows
}
