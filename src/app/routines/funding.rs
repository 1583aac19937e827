use crate::app::routines::{AnalysisRoutine, RoutineContext, RoutineOutput, PROJECT_SOURCE};
use crate::domain::metrics::{cagr_over_active_years, round_to};
use crate::domain::model::{
    FundingPanel, FundingPoint, InstrumentRow, Panel, PanelKind, PanelStatus, ProgrammeFundingPoint,
    ProgrammeFundingRow,
};
use crate::domain::ports::InstrumentCount;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

const UNKNOWN_PROGRAMME: &str = "UNKNOWN";

/// EU funding volume, growth and breakdown by programme and instrument.
pub struct FundingRoutine;

impl FundingRoutine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FundingRoutine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisRoutine for FundingRoutine {
    fn get_name(&self) -> &str {
        "funding"
    }

    fn panel_kind(&self) -> PanelKind {
        PanelKind::Funding
    }

    async fn run(&self, ctx: &RoutineContext) -> Result<RoutineOutput> {
        let started = Instant::now();
        let term = ctx.term();
        let projects = &ctx.sources.projects;

        let (last_full, yearly, programmes, year_programmes, instruments) = tokio::join!(
            projects.last_full_year(),
            projects.funding_by_year(term, ctx.range),
            projects.funding_by_programme(term, ctx.range),
            projects.funding_by_year_and_programme(term, ctx.range),
            projects.funding_by_instrument(term, ctx.range),
        );

        let mut output = RoutineOutput::new(Panel::Funding(FundingPanel::default()));
        match last_full {
            Ok(Some(last)) if last < ctx.range.end => output.warn(format!(
                "Project data complete through {} (incomplete from {})",
                last,
                last + 1
            )),
            Ok(_) => {}
            Err(e) => debug!("Project completeness check failed: {}", e),
        }

        let yearly = output.settle(PROJECT_SOURCE, "funding_by_year", yearly);
        let programmes = output.settle(PROJECT_SOURCE, "funding_by_programme", programmes);
        let year_programmes = output.settle(PROJECT_SOURCE, "funding_by_year_and_programme", year_programmes);
        let instruments = output.settle(PROJECT_SOURCE, "funding_by_instrument", instruments);

        let total_funding: f64 = yearly.iter().map(|r| r.funding).sum();
        let total_projects: u64 = yearly.iter().map(|r| r.projects).sum();
        if total_projects == 0 {
            output.panel = Panel::Funding(FundingPanel {
                status: PanelStatus::NoData,
                ..FundingPanel::default()
            });
            return Ok(output);
        }
        output.source(PROJECT_SOURCE);

        let mut panel = FundingPanel {
            status: PanelStatus::Complete,
            total_funding_eur: round_to(total_funding, 2),
            avg_project_size: round_to(total_funding / total_projects as f64, 2),
            ..FundingPanel::default()
        };

        let series: Vec<(i32, f64)> = yearly.iter().map(|r| (r.year, r.funding)).collect();
        if let Some((rate, period)) = cagr_over_active_years(&series) {
            panel.funding_cagr = round_to(rate, 2);
            output.method(format!("Funding CAGR over {}", period));
            panel.funding_cagr_period = period;
        }

        panel.time_series = yearly
            .iter()
            .map(|r| FundingPoint {
                year: r.year,
                funding: round_to(r.funding, 2),
                projects: r.projects,
            })
            .collect();

        panel.by_programme = programmes
            .iter()
            .map(|r| ProgrammeFundingRow {
                programme: programme_label(&r.programme),
                funding: round_to(r.funding, 2),
                projects: r.projects,
            })
            .collect();
        panel
            .by_programme
            .sort_by(|a, b| b.funding.total_cmp(&a.funding).then_with(|| a.programme.cmp(&b.programme)));

        panel.time_series_by_programme = year_programmes
            .iter()
            .map(|r| ProgrammeFundingPoint {
                year: r.year,
                programme: programme_label(&r.programme),
                funding: round_to(r.funding, 2),
                projects: r.projects,
            })
            .collect();

        panel.instrument_breakdown = instrument_totals(&instruments);
        if !panel.instrument_breakdown.is_empty() {
            output.method("Funding instrument breakdown");
        }
        output.method("EU funding aggregation (FP7, H2020, Horizon Europe)");

        info!(
            "✅ Funding computed: {:.0} EUR over {} projects ({:?})",
            total_funding,
            total_projects,
            started.elapsed()
        );
        output.panel = Panel::Funding(panel);
        Ok(output)
    }
}

fn programme_label(programme: &str) -> String {
    if programme.trim().is_empty() {
        UNKNOWN_PROGRAMME.to_string()
    } else {
        programme.to_string()
    }
}

/// Collapses the per-year instrument rows into totals, largest funding first.
fn instrument_totals(rows: &[InstrumentCount]) -> Vec<InstrumentRow> {
    let mut totals: BTreeMap<&str, (f64, u64)> = BTreeMap::new();
    for row in rows {
        let entry = totals.entry(row.instrument.as_str()).or_default();
        entry.0 += row.funding;
        entry.1 += row.projects;
    }
    let mut breakdown: Vec<InstrumentRow> = totals
        .into_iter()
        .map(|(instrument, (funding, projects))| InstrumentRow {
            instrument: instrument.to_string(),
            funding: round_to(funding, 2),
            projects,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.funding
            .total_cmp(&a.funding)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });
    breakdown
}
