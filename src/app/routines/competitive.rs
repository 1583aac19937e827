use crate::app::routines::enrichment::enrich_names;
use crate::app::routines::{
    share, AnalysisRoutine, RoutineContext, RoutineOutput, PATENT_SOURCE, PROJECT_SOURCE,
};
use crate::domain::metrics::{concentration, round_to};
use crate::domain::model::{
    ActorRow, ActorShare, ActorType, CompetitivePanel, NetworkEdge, NetworkNode, Panel, PanelKind,
    PanelStatus,
};
use crate::domain::ports::{ActorCount, CoActivity, OrganizationActivity};
use crate::domain::similarity::ordered_pair;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use tracing::info;

const ACTOR_QUERY_LIMIT: usize = 50;
const EDGE_QUERY_LIMIT: usize = 200;
const TOP_SHARES: usize = 20;
const NETWORK_NODES: usize = 40;
const NETWORK_EDGES: usize = 100;

/// Actor landscape: market shares, concentration, co-activity network and
/// the full ranked actor table.
pub struct CompetitiveRoutine {
    max_lookups: usize,
    enrichment_budget: Duration,
}

impl CompetitiveRoutine {
    pub fn new(max_lookups: usize, enrichment_budget: Duration) -> Self {
        Self {
            max_lookups,
            enrichment_budget,
        }
    }
}

#[derive(Debug, Default)]
struct ProjectActorInfo {
    country: String,
    is_sme: bool,
    is_coordinator: bool,
}

fn normalize_actor(name: &str) -> String {
    name.trim().to_uppercase()
}

#[async_trait]
impl AnalysisRoutine for CompetitiveRoutine {
    fn get_name(&self) -> &str {
        "competitive"
    }

    fn panel_kind(&self) -> PanelKind {
        PanelKind::Competitive
    }

    async fn run(&self, ctx: &RoutineContext) -> Result<RoutineOutput> {
        let started = Instant::now();
        let term = ctx.term();
        let (patent_range, clip_warning) = ctx.patent_range();
        let patents = &ctx.sources.patents;
        let projects = &ctx.sources.projects;

        let (applicants, organizations, co_applicants, co_participants) = tokio::join!(
            patents.top_applicants(term, patent_range, ACTOR_QUERY_LIMIT),
            projects.top_organizations(term, ctx.range, ACTOR_QUERY_LIMIT),
            patents.co_applicants(term, patent_range, EDGE_QUERY_LIMIT),
            projects.co_participation(term, ctx.range, EDGE_QUERY_LIMIT),
        );

        let mut output = RoutineOutput::new(Panel::Competitive(CompetitivePanel::default()));
        if let Some(warning) = clip_warning {
            output.warn(warning);
        }

        let applicants: Vec<ActorCount> = output.settle(PATENT_SOURCE, "patent applicants", applicants);
        let organizations: Vec<OrganizationActivity> =
            output.settle(PROJECT_SOURCE, "project organizations", organizations);
        let co_applicants: Vec<CoActivity> = output.settle(PATENT_SOURCE, "co-applicants", co_applicants);
        let co_participants: Vec<CoActivity> =
            output.settle(PROJECT_SOURCE, "co-participation", co_participants);

        let mut patent_actors: BTreeMap<String, u64> = BTreeMap::new();
        let mut patent_countries: BTreeMap<String, String> = BTreeMap::new();
        for applicant in &applicants {
            let name = normalize_actor(&applicant.name);
            if name.is_empty() {
                continue;
            }
            *patent_actors.entry(name.clone()).or_insert(0) += applicant.count;
            if !applicant.country.is_empty() {
                patent_countries.entry(name).or_insert_with(|| applicant.country.clone());
            }
        }
        if !applicants.is_empty() {
            output.source(PATENT_SOURCE);
        }

        let mut project_actors: BTreeMap<String, u64> = BTreeMap::new();
        let mut project_info: BTreeMap<String, ProjectActorInfo> = BTreeMap::new();
        for org in &organizations {
            let name = normalize_actor(&org.name);
            if name.is_empty() {
                continue;
            }
            *project_actors.entry(name.clone()).or_insert(0) += org.count;
            let info = project_info.entry(name).or_default();
            if info.country.is_empty() {
                info.country = org.country.clone();
            }
            info.is_sme |= org.is_sme;
            info.is_coordinator |= org.is_coordinator;
        }
        if !organizations.is_empty() {
            output.source(PROJECT_SOURCE);
        }

        let mut totals: BTreeMap<String, u64> = patent_actors.clone();
        for (name, count) in &project_actors {
            *totals.entry(name.clone()).or_insert(0) += count;
        }
        if totals.is_empty() {
            output.panel = Panel::Competitive(CompetitivePanel {
                status: PanelStatus::NoData,
                ..CompetitivePanel::default()
            });
            return Ok(output);
        }

        let mut ranked: Vec<(String, u64)> = totals.iter().map(|(n, c)| (n.clone(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let total_activity: u64 = ranked.iter().map(|(_, c)| c).sum();

        let counts: Vec<u64> = ranked.iter().map(|(_, c)| *c).collect();
        let mut panel = CompetitivePanel {
            status: PanelStatus::Complete,
            ..CompetitivePanel::default()
        };
        if let Some(result) = concentration(&counts) {
            panel.concentration_index = round_to(result.index, 1);
            panel.concentration_band = Some(result.band);
            panel.top_3_share = round_to(result.top3_share, 4);
        }
        output.method("Herfindahl-Hirschman concentration index");
        output.method("Actor aggregation (patent applicants + project organizations)");

        panel.top_actors = ranked
            .iter()
            .take(TOP_SHARES)
            .map(|(name, count)| ActorShare {
                name: name.clone(),
                count: *count,
                share: share(*count, total_activity),
            })
            .collect();

        let (nodes, edges) = build_network(
            &ranked,
            &patent_actors,
            &project_actors,
            &co_applicants,
            &co_participants,
        );
        if !edges.is_empty() {
            output.method("Co-activity network (co-applicants + project partners)");
        }
        panel.network_nodes = nodes;
        panel.network_edges = edges;

        let top_names: Vec<String> = ranked.iter().map(|(n, _)| n.clone()).collect();
        let enrichment = enrich_names(
            ctx.sources.entities.as_ref(),
            &top_names,
            self.max_lookups,
            self.enrichment_budget,
        )
        .await;
        enrichment.annotate(&mut output, "Legal-entity resolution of top actors");
        let entities = enrichment.entities();

        panel.full_actors = ranked
            .iter()
            .enumerate()
            .map(|(i, (name, count))| {
                let info = project_info.get(name);
                let legal_entity = entities.get(name).cloned();
                let mut country = info
                    .map(|i| i.country.clone())
                    .filter(|c| !c.is_empty())
                    .or_else(|| patent_countries.get(name).cloned())
                    .unwrap_or_default();
                if country.is_empty() {
                    if let Some(entity) = &legal_entity {
                        country = entity.country.clone();
                    }
                }
                ActorRow {
                    rank: i + 1,
                    name: name.clone(),
                    patents: patent_actors.get(name).copied().unwrap_or(0),
                    projects: project_actors.get(name).copied().unwrap_or(0),
                    total: *count,
                    share: share(*count, total_activity),
                    country,
                    is_sme: info.map(|i| i.is_sme).unwrap_or(false),
                    is_coordinator: info.map(|i| i.is_coordinator).unwrap_or(false),
                    legal_entity,
                }
            })
            .collect();

        info!(
            "✅ Competitive computed: {} actors, HHI {} ({:?})",
            ranked.len(),
            panel.concentration_index,
            started.elapsed()
        );
        output.panel = Panel::Competitive(panel);
        Ok(output)
    }
}

/// Top actors connected by co-activity. Only nodes with at least one kept
/// edge appear.
fn build_network(
    ranked: &[(String, u64)],
    patent_actors: &BTreeMap<String, u64>,
    project_actors: &BTreeMap<String, u64>,
    co_applicants: &[CoActivity],
    co_participants: &[CoActivity],
) -> (Vec<NetworkNode>, Vec<NetworkEdge>) {
    let mut patent_side: BTreeSet<String> = patent_actors.keys().cloned().collect();
    let mut project_side: BTreeSet<String> = project_actors.keys().cloned().collect();
    let mut weights: BTreeMap<(String, String), u64> = BTreeMap::new();

    for (edges, side) in [
        (co_applicants, &mut patent_side),
        (co_participants, &mut project_side),
    ] {
        for edge in edges {
            let a = normalize_actor(&edge.actor_a);
            let b = normalize_actor(&edge.actor_b);
            if a.is_empty() || b.is_empty() || a == b {
                continue;
            }
            side.insert(a.clone());
            side.insert(b.clone());
            *weights.entry(ordered_pair(&a, &b)).or_insert(0) += edge.count;
        }
    }

    let top: BTreeSet<&String> = ranked.iter().take(NETWORK_NODES).map(|(n, _)| n).collect();
    let mut kept: Vec<((String, String), u64)> = weights
        .into_iter()
        .filter(|((a, b), _)| top.contains(a) && top.contains(b))
        .collect();
    kept.sort_by(|x, y| y.1.cmp(&x.1).then_with(|| x.0.cmp(&y.0)));
    kept.truncate(NETWORK_EDGES);

    let connected: BTreeSet<&String> = kept.iter().flat_map(|((a, b), _)| [a, b]).collect();
    let counts: BTreeMap<&String, u64> = ranked.iter().map(|(n, c)| (n, *c)).collect();
    let nodes = connected
        .into_iter()
        .map(|name| {
            let actor_type = match (patent_side.contains(name), project_side.contains(name)) {
                (true, true) => ActorType::Both,
                (true, false) => ActorType::Patent,
                _ => ActorType::Project,
            };
            NetworkNode {
                id: name.clone(),
                count: counts.get(name).copied().unwrap_or(0),
                actor_type,
            }
        })
        .collect();

    let edges = kept
        .into_iter()
        .map(|((source, target), weight)| NetworkEdge {
            source,
            target,
            weight,
        })
        .collect();

    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::routines::enrichment::mock::MockResolver;
    use crate::app::routines::test_support::{context_for, sample_dataset};
    use crate::domain::model::{AlertSeverity, ConcentrationBand};
    use crate::domain::ports::EntityResolver;
    use std::sync::Arc;

    fn routine() -> CompetitiveRoutine {
        CompetitiveRoutine::new(5, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_competitive_panel() {
        let ctx = context_for(sample_dataset(), 2015, 2025);
        let output = routine().run(&ctx).await.unwrap();
        let Panel::Competitive(panel) = output.panel else {
            panic!("wrong panel kind");
        };

        assert_eq!(panel.status, PanelStatus::Complete);
        // ETH ZURICH, IBM and SIEMENS tie at 3; ties rank by name.
        assert_eq!(panel.top_actors[0].name, "ETH ZURICH");
        assert_eq!(panel.top_actors[0].count, 3);
        assert_eq!(panel.full_actors.len(), 5);
        assert_eq!(panel.full_actors[0].rank, 1);
        assert_eq!(panel.concentration_band, Some(ConcentrationBand::Moderate));
        assert_eq!(panel.concentration_index, 2071.0);

        let siemens = panel.full_actors.iter().find(|a| a.name == "SIEMENS").unwrap();
        assert_eq!(siemens.patents, 1);
        assert_eq!(siemens.projects, 2);
        assert!(siemens.is_coordinator);
        assert_eq!(siemens.country, "DE");

        let node = panel.network_nodes.iter().find(|n| n.id == "SIEMENS").unwrap();
        assert_eq!(node.actor_type, ActorType::Both);
        assert!(panel.network_edges.iter().all(|e| e.source < e.target));
        assert!(output.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_competitive_enrichment() {
        let mut ctx = context_for(sample_dataset(), 2015, 2025);
        let resolver: Arc<dyn EntityResolver> =
            Arc::new(MockResolver::new(&[("IBM", "LEI-IBM", "US")]));
        ctx.sources.entities = Some(resolver);

        let output = routine().run(&ctx).await.unwrap();
        let Panel::Competitive(panel) = output.panel else {
            panic!("wrong panel kind");
        };
        let ibm = panel.full_actors.iter().find(|a| a.name == "IBM").unwrap();
        assert_eq!(ibm.legal_entity.as_ref().unwrap().lei, "LEI-IBM");
        assert!(output.sources.iter().any(|s| s == "GLEIF"));
    }

    #[tokio::test]
    async fn test_competitive_enrichment_failure_is_additive() {
        let plain_ctx = context_for(sample_dataset(), 2015, 2025);
        let plain = routine().run(&plain_ctx).await.unwrap();

        let mut ctx = context_for(sample_dataset(), 2015, 2025);
        let resolver: Arc<dyn EntityResolver> = Arc::new(MockResolver::failing());
        ctx.sources.entities = Some(resolver);
        let degraded = routine().run(&ctx).await.unwrap();

        assert_eq!(plain.panel, degraded.panel);
        assert_eq!(degraded.alerts.len(), 1);
        assert_eq!(degraded.alerts[0].severity, AlertSeverity::Warning);
    }
}
