use crate::app::routines::{AnalysisRoutine, RoutineContext, RoutineOutput, PATENT_SOURCE};
use crate::domain::cpc_scheme::{describe, section_title};
use crate::domain::model::{CpcFlowPanel, CpcYearSlice, Panel, PanelKind, PanelStatus};
use crate::domain::similarity::{count_co_occurrence, normalize_code, pairwise_similarity};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::info;

pub const CPC_LEVEL: usize = 4;
const TOP_CODES: usize = 15;

const SECTION_COLORS: [(char, &str); 9] = [
    ('A', "#ef4444"),
    ('B', "#f97316"),
    ('C', "#eab308"),
    ('D', "#22c55e"),
    ('E', "#06b6d4"),
    ('F', "#3b82f6"),
    ('G', "#8b5cf6"),
    ('H', "#ec4899"),
    ('Y', "#6b7280"),
];
const FALLBACK_COLOR: &str = "#9ca3af";

/// Technology convergence: Jaccard similarity between the most frequent CPC
/// subclasses of the matching patents.
pub struct CpcFlowRoutine;

impl CpcFlowRoutine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpcFlowRoutine {
    fn default() -> Self {
        Self::new()
    }
}

pub fn section_color(code: &str) -> &'static str {
    code.chars()
        .next()
        .and_then(|section| SECTION_COLORS.iter().find(|(s, _)| *s == section))
        .map(|(_, color)| *color)
        .unwrap_or(FALLBACK_COLOR)
}

#[async_trait]
impl AnalysisRoutine for CpcFlowRoutine {
    fn get_name(&self) -> &str {
        "cpc_flow"
    }

    fn panel_kind(&self) -> PanelKind {
        PanelKind::CpcFlow
    }

    async fn run(&self, ctx: &RoutineContext) -> Result<RoutineOutput> {
        let started = Instant::now();
        let (patent_range, clip_warning) = ctx.patent_range();
        let assignments = ctx.sources.patents.cpc_assignments(ctx.term(), patent_range).await;

        let mut output = RoutineOutput::new(Panel::CpcFlow(CpcFlowPanel::default()));
        if let Some(warning) = clip_warning {
            output.warn(warning);
        }
        let assignments = output.settle(PATENT_SOURCE, "cpc_assignments", assignments);
        if !assignments.is_empty() {
            output.source(PATENT_SOURCE);
        }

        // Only patents spanning at least two subclasses can link codes.
        let linked: Vec<(i32, BTreeSet<String>)> = assignments
            .iter()
            .map(|a| {
                let codes: BTreeSet<String> = a
                    .codes
                    .iter()
                    .map(|c| normalize_code(c, CPC_LEVEL))
                    .filter(|c| c.len() == CPC_LEVEL)
                    .collect();
                (a.year, codes)
            })
            .filter(|(_, codes)| codes.len() >= 2)
            .collect();

        let counts = count_co_occurrence(linked.iter().map(|(_, codes)| codes));
        let network = pairwise_similarity(&counts.pairs, &counts.individual, TOP_CODES);
        if network.labels.len() < 2 {
            output.warn(format!(
                "Too few co-classified patents ({}) for a CPC network",
                linked.len()
            ));
            output.panel = Panel::CpcFlow(CpcFlowPanel {
                status: PanelStatus::NoData,
                total_patents_analyzed: linked.len() as u64,
                ..CpcFlowPanel::default()
            });
            return Ok(output);
        }
        output.method(format!("CPC co-classification at subclass level ({} characters)", CPC_LEVEL));
        output.method("Jaccard similarity");

        let top: BTreeSet<&String> = network.labels.iter().collect();
        let year_data = year_slices(&linked, &top);

        let section_descriptions: BTreeMap<String, String> = network
            .labels
            .iter()
            .filter_map(|label| label.chars().next())
            .filter_map(|section| section_title(section).map(|t| (section.to_string(), t.to_string())))
            .collect();
        let label_descriptions: BTreeMap<String, String> = network
            .labels
            .iter()
            .filter_map(|label| describe(label).map(|d| (label.clone(), d.to_string())))
            .collect();

        let panel = CpcFlowPanel {
            status: PanelStatus::Complete,
            colors: network.labels.iter().map(|l| section_color(l).to_string()).collect(),
            labels: network.labels,
            matrix: network.matrix,
            total_patents_analyzed: counts.items,
            total_connections: network.total_connections,
            cpc_level: CPC_LEVEL,
            year_data,
            section_descriptions,
            label_descriptions,
        };

        info!(
            "✅ CPC flow computed: {} codes, {} connections ({:?})",
            panel.labels.len(),
            panel.total_connections,
            started.elapsed()
        );
        output.panel = Panel::CpcFlow(panel);
        Ok(output)
    }
}

/// Per-year code and pair counts restricted to the top labels.
fn year_slices(linked: &[(i32, BTreeSet<String>)], top: &BTreeSet<&String>) -> Vec<CpcYearSlice> {
    let mut slices: BTreeMap<i32, CpcYearSlice> = BTreeMap::new();
    for (year, codes) in linked {
        let kept: Vec<&String> = codes.iter().filter(|c| top.contains(c)).collect();
        if kept.is_empty() {
            continue;
        }
        let slice = slices.entry(*year).or_insert_with(|| CpcYearSlice {
            year: *year,
            ..CpcYearSlice::default()
        });
        for (i, a) in kept.iter().enumerate() {
            *slice.code_counts.entry((*a).clone()).or_insert(0) += 1;
            for b in &kept[i + 1..] {
                *slice.pair_counts.entry(format!("{}|{}", a, b)).or_insert(0) += 1;
            }
        }
    }
    slices.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::snapshot::SnapshotDataset;
    use crate::app::routines::test_support::{context_for, context_with, patent, sample_dataset, UnreachableStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cpc_flow_panel() {
        let ctx = context_for(sample_dataset(), 2015, 2025);
        let output = CpcFlowRoutine::new().run(&ctx).await.unwrap();
        let Panel::CpcFlow(panel) = output.panel else {
            panic!("wrong panel kind");
        };

        assert_eq!(panel.status, PanelStatus::Complete);
        assert_eq!(panel.labels, vec!["G06N", "B82Y", "H01L", "H04L"]);
        assert_eq!(panel.total_patents_analyzed, 4);
        assert_eq!(panel.total_connections, 4);
        assert_eq!(panel.cpc_level, 4);
        assert_eq!(panel.colors, vec!["#8b5cf6", "#f97316", "#ec4899", "#ec4899"]);

        // G06N on 4 patents, H01L on 2, both on 2.
        assert_eq!(panel.matrix[0][2], 0.5);
        assert_eq!(panel.matrix[2][0], 0.5);
        assert_eq!(panel.matrix[1][2], 0.3333);
        for i in 0..panel.labels.len() {
            assert_eq!(panel.matrix[i][i], 0.0);
        }

        let years: Vec<i32> = panel.year_data.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2019, 2020, 2021, 2023]);
        assert_eq!(panel.year_data[2].pair_counts["B82Y|H01L"], 1);
        assert_eq!(panel.section_descriptions["G"], "Physics");
        assert_eq!(panel.label_descriptions.len(), 4);
        assert_eq!(panel.label_descriptions["H04L"], "Transmission of Digital Information");
        assert_eq!(
            panel.label_descriptions["B82Y"],
            "Specific Uses or Applications of Nanostructures"
        );
    }

    #[tokio::test]
    async fn test_cpc_flow_single_code_patents() {
        let dataset = SnapshotDataset::new(
            vec![
                patent("EP1", (2020, 1, 1), &[("IBM", "US")], &["G06N10/00"]),
                patent("EP2", (2021, 1, 1), &[("IBM", "US")], &["G06N99/00"]),
            ],
            Vec::new(),
        );
        let ctx = context_for(dataset, 2015, 2025);
        let output = CpcFlowRoutine::new().run(&ctx).await.unwrap();
        let Panel::CpcFlow(panel) = output.panel else {
            panic!("wrong panel kind");
        };
        assert_eq!(panel.status, PanelStatus::NoData);
        assert!(panel.matrix.is_empty());
        assert!(output.warnings.iter().any(|w| w.contains("CPC network")));
    }

    #[test]
    fn test_section_color() {
        assert_eq!(section_color("G06N"), "#8b5cf6");
        assert_eq!(section_color("Y02E"), "#6b7280");
        assert_eq!(section_color("Z99Z"), FALLBACK_COLOR);
        assert_eq!(section_color(""), FALLBACK_COLOR);
    }

    #[tokio::test]
    async fn test_unreachable_patent_store() {
        let ctx = context_with(Arc::new(UnreachableStore), Arc::new(sample_dataset()), 2015, 2025);
        let output = CpcFlowRoutine::new().execute(&ctx).await.unwrap();

        assert_eq!(output.alerts.len(), 1);
        assert_eq!(output.alerts[0].source, PATENT_SOURCE);
        let Panel::CpcFlow(panel) = output.panel else {
            panic!("wrong panel kind");
        };
        assert_eq!(panel.status, PanelStatus::SourceUnavailable);
    }
}
