use crate::app::routines::{
    rank_by_count, share, AnalysisRoutine, RoutineContext, RoutineOutput, CITATION_SOURCE,
};
use crate::domain::metrics::{h_index, round_to};
use crate::domain::model::{
    ApiAlert, CitationYear, Panel, PanelKind, PanelStatus, PublicationTypeCount,
    ResearchImpactPanel, TopPaper, VenueShare,
};
use crate::domain::ports::Paper;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

const TOP_PAPERS: usize = 10;
const TOP_VENUES: usize = 8;
const AUTHORS_SHOWN: usize = 3;

/// Academic impact of the most relevant papers returned by the citation
/// service.
pub struct ResearchImpactRoutine {
    max_papers: usize,
}

impl ResearchImpactRoutine {
    pub fn new(max_papers: usize) -> Self {
        Self { max_papers }
    }

    fn unavailable(output: &mut RoutineOutput, reason: String) {
        output.warn(reason);
        output.panel = Panel::ResearchImpact(ResearchImpactPanel {
            status: PanelStatus::SourceUnavailable,
            ..ResearchImpactPanel::default()
        });
    }
}

#[async_trait]
impl AnalysisRoutine for ResearchImpactRoutine {
    fn get_name(&self) -> &str {
        "research_impact"
    }

    fn panel_kind(&self) -> PanelKind {
        PanelKind::ResearchImpact
    }

    async fn run(&self, ctx: &RoutineContext) -> Result<RoutineOutput> {
        let started = Instant::now();
        let mut output = RoutineOutput::new(Panel::ResearchImpact(ResearchImpactPanel::default()));

        let Some(citations) = &ctx.sources.citations else {
            Self::unavailable(
                &mut output,
                format!("{} is not configured; research impact not computed", CITATION_SOURCE),
            );
            return Ok(output);
        };

        let papers = match citations.search(ctx.term(), ctx.range, self.max_papers).await {
            Ok(papers) => papers,
            Err(e) => {
                warn!("⚠️ {} search failed: {}", citations.name(), e);
                output.alert(ApiAlert::error(
                    CITATION_SOURCE,
                    format!("{} unavailable: {}", CITATION_SOURCE, e.user_friendly_message()),
                ));
                Self::unavailable(
                    &mut output,
                    format!("{} query failed: {}; research impact not computed", CITATION_SOURCE, e),
                );
                return Ok(output);
            }
        };

        if papers.is_empty() {
            output.warn(format!(
                "{} returned no papers for '{}' in {}",
                CITATION_SOURCE,
                ctx.term(),
                ctx.range.label()
            ));
            output.panel = Panel::ResearchImpact(ResearchImpactPanel {
                status: PanelStatus::NoData,
                ..ResearchImpactPanel::default()
            });
            return Ok(output);
        }

        output.source(CITATION_SOURCE);
        output.method("h-index over the returned sample");
        output.method(format!("Sample: {} most relevant papers", papers.len()));
        output.method("Influential-citation ratio");
        if papers.len() >= self.max_papers {
            output.warn(format!(
                "h-index based on the {} most relevant papers; an approximation, not the full corpus",
                self.max_papers
            ));
        }

        let counts: Vec<u64> = papers.iter().map(|p| p.citation_count).collect();
        let total_citations: u64 = counts.iter().sum();
        let influential: u64 = papers.iter().map(|p| p.influential_citation_count).sum();
        let influential_ratio = if total_citations > 0 {
            round_to(influential as f64 / total_citations as f64, 4)
        } else {
            0.0
        };

        let panel = ResearchImpactPanel {
            status: PanelStatus::Complete,
            h_index: h_index(&counts),
            avg_citations: round_to(total_citations as f64 / papers.len() as f64, 1),
            total_papers: papers.len() as u64,
            total_citations,
            influential_ratio,
            citation_trend: citation_trend(&papers),
            top_papers: top_papers(&papers, TOP_PAPERS),
            top_venues: venue_distribution(&papers, TOP_VENUES),
            publication_types: publication_types(&papers),
        };

        info!(
            "✅ Research impact computed: {} papers, h-index {} ({:?})",
            panel.total_papers,
            panel.h_index,
            started.elapsed()
        );
        output.panel = Panel::ResearchImpact(panel);
        Ok(output)
    }
}

fn citation_trend(papers: &[Paper]) -> Vec<CitationYear> {
    let mut by_year: BTreeMap<i32, (u64, u64)> = BTreeMap::new();
    for paper in papers {
        if let Some(year) = paper.year {
            let entry = by_year.entry(year).or_default();
            entry.0 += paper.citation_count;
            entry.1 += 1;
        }
    }
    by_year
        .into_iter()
        .map(|(year, (citations, paper_count))| CitationYear {
            year,
            citations,
            paper_count,
        })
        .collect()
}

fn authors_short(authors: &[String]) -> String {
    let shown = authors
        .iter()
        .take(AUTHORS_SHOWN)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > AUTHORS_SHOWN {
        format!("{} et al.", shown)
    } else {
        shown
    }
}

fn top_papers(papers: &[Paper], limit: usize) -> Vec<TopPaper> {
    let mut sorted: Vec<&Paper> = papers.iter().collect();
    // Stable: equal counts keep the service's relevance order.
    sorted.sort_by_key(|p| Reverse(p.citation_count));
    sorted
        .into_iter()
        .take(limit)
        .map(|p| TopPaper {
            title: p.title.clone(),
            venue: p.venue.clone(),
            year: p.year,
            citations: p.citation_count,
            authors_short: authors_short(&p.authors),
        })
        .collect()
}

fn venue_distribution(papers: &[Paper], limit: usize) -> Vec<VenueShare> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for paper in papers {
        let venue = paper.venue.trim();
        if !venue.is_empty() {
            *counts.entry(venue).or_insert(0) += 1;
        }
    }
    let total: u64 = counts.values().sum();
    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    rank_by_count(&mut ranked, |(venue, count)| (*venue, *count));
    ranked
        .into_iter()
        .take(limit)
        .map(|(venue, count)| VenueShare {
            venue: venue.to_string(),
            count,
            share: share(count, total),
        })
        .collect()
}

fn publication_types(papers: &[Paper]) -> Vec<PublicationTypeCount> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for kind in papers.iter().flat_map(|p| &p.publication_types) {
        if !kind.is_empty() {
            *counts.entry(kind.as_str()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    rank_by_count(&mut ranked, |(kind, count)| (*kind, *count));
    ranked
        .into_iter()
        .map(|(kind, count)| PublicationTypeCount {
            publication_type: kind.to_string(),
            count,
        })
        .collect()
}
