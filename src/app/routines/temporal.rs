use crate::app::routines::{AnalysisRoutine, RoutineContext, RoutineOutput, PATENT_SOURCE, PROJECT_SOURCE};
use crate::domain::model::{InstrumentYear, Panel, PanelKind, PanelStatus, ProgrammeYear, TemporalPanel};
use crate::domain::ports::{YearActorCount, YearProgrammeFunding};
use crate::domain::temporal_metrics::{
    actor_dynamics, actor_timeline, average_rates, technology_breadth, ActorsByYear,
};
use crate::domain::metrics::round_to;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

const TIMELINE_ACTORS: usize = 10;

/// How the field evolves: actor turnover, technology breadth and the shift
/// between funding programmes and instruments.
pub struct TemporalRoutine;

impl TemporalRoutine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TemporalRoutine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisRoutine for TemporalRoutine {
    fn get_name(&self) -> &str {
        "temporal"
    }

    fn panel_kind(&self) -> PanelKind {
        PanelKind::Temporal
    }

    async fn run(&self, ctx: &RoutineContext) -> Result<RoutineOutput> {
        let started = Instant::now();
        let term = ctx.term();
        let (patent_range, clip_warning) = ctx.patent_range();
        let patents = &ctx.sources.patents;
        let projects = &ctx.sources.projects;

        let (applicants, organizations, assignments, programmes, instruments) = tokio::join!(
            patents.applicants_by_year(term, patent_range),
            projects.organizations_by_year(term, ctx.range),
            patents.cpc_assignments(term, patent_range),
            projects.funding_by_year_and_programme(term, ctx.range),
            projects.funding_by_instrument(term, ctx.range),
        );

        let mut output = RoutineOutput::new(Panel::Temporal(TemporalPanel::default()));
        if let Some(warning) = clip_warning {
            output.warn(warning);
        }

        let applicants = output.settle(PATENT_SOURCE, "applicants_by_year", applicants);
        let organizations = output.settle(PROJECT_SOURCE, "organizations_by_year", organizations);
        let assignments = output.settle(PATENT_SOURCE, "cpc_assignments", assignments);
        let programmes = output.settle(PROJECT_SOURCE, "funding_by_year_and_programme", programmes);
        let instruments = output.settle(PROJECT_SOURCE, "funding_by_instrument", instruments);

        if !applicants.is_empty() || !assignments.is_empty() {
            output.source(PATENT_SOURCE);
        }
        if !organizations.is_empty() || !programmes.is_empty() {
            output.source(PROJECT_SOURCE);
        }

        let actors = merge_actors(&applicants, &organizations);
        if actors.is_empty() && programmes.is_empty() {
            output.panel = Panel::Temporal(TemporalPanel {
                status: PanelStatus::NoData,
                ..TemporalPanel::default()
            });
            return Ok(output);
        }

        let trend = actor_dynamics(&actors);
        let (new_entrant_rate, persistence_rate) = average_rates(&trend);
        if !trend.is_empty() {
            output.method("Actor dynamics (new-entrant and persistence rates)");
        }

        let mut codes_by_year: BTreeMap<i32, Vec<String>> = BTreeMap::new();
        for assignment in assignments {
            codes_by_year
                .entry(assignment.year)
                .or_default()
                .extend(assignment.codes);
        }
        let breadth = technology_breadth(&codes_by_year);
        if !breadth.is_empty() {
            output.method("Technology breadth (distinct CPC sections and subclasses)");
        }

        let (programme_evolution, dominant_programme) = programme_evolution(&programmes);
        if !programme_evolution.is_empty() {
            output.method("Programme evolution");
        }

        let panel = TemporalPanel {
            status: PanelStatus::Complete,
            new_entrant_rate,
            persistence_rate,
            dominant_programme,
            actor_timeline: actor_timeline(&actors, TIMELINE_ACTORS),
            programme_evolution,
            entrant_persistence_trend: trend,
            instrument_evolution: instruments
                .into_iter()
                .map(|row| InstrumentYear {
                    year: row.year,
                    instrument: row.instrument,
                    count: row.projects,
                    funding: round_to(row.funding, 2),
                })
                .collect(),
            technology_breadth: breadth,
        };

        info!(
            "✅ Temporal computed: {} years of actor data ({:?})",
            panel.entrant_persistence_trend.len(),
            started.elapsed()
        );
        output.panel = Panel::Temporal(panel);
        Ok(output)
    }
}

/// Patent applicants and project organizations under one upper-cased name.
fn merge_actors(applicants: &[YearActorCount], organizations: &[YearActorCount]) -> ActorsByYear {
    let mut actors = ActorsByYear::new();
    for row in applicants.iter().chain(organizations) {
        let name = row.name.trim().to_uppercase();
        if name.is_empty() {
            continue;
        }
        *actors.entry(row.year).or_default().entry(name).or_insert(0) += row.count;
    }
    actors
}

/// Project counts per programme and year, plus the programme with the most
/// projects overall (ties by name).
fn programme_evolution(rows: &[YearProgrammeFunding]) -> (Vec<ProgrammeYear>, String) {
    let mut by_year: BTreeMap<i32, BTreeMap<String, u64>> = BTreeMap::new();
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for row in rows {
        let programme = if row.programme.trim().is_empty() {
            "UNKNOWN"
        } else {
            row.programme.as_str()
        };
        *by_year
            .entry(row.year)
            .or_default()
            .entry(programme.to_string())
            .or_insert(0) += row.projects;
        *totals.entry(programme).or_insert(0) += row.projects;
    }

    let dominant = totals
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(name, _)| name.to_string())
        .unwrap_or_default();

    let evolution = by_year
        .into_iter()
        .map(|(year, counts)| ProgrammeYear { year, counts })
        .collect();
    (evolution, dominant)
}
