use crate::domain::metrics::round_to;
use crate::domain::model::{ActorDynamicsPoint, ActorTimelineEntry, TechnologyBreadthPoint};
use std::collections::{BTreeMap, BTreeSet};

/// `year -> actor -> activity count`.
pub type ActorsByYear = BTreeMap<i32, BTreeMap<String, u64>>;

/// Share of new actors and of retained actors for each year. The first year
/// counts every actor as new.
pub fn actor_dynamics(actors_by_year: &ActorsByYear) -> Vec<ActorDynamicsPoint> {
    let mut points = Vec::with_capacity(actors_by_year.len());
    let mut previous: BTreeSet<&String> = BTreeSet::new();

    for (year, actors) in actors_by_year {
        let current: BTreeSet<&String> = actors.keys().collect();
        let (new_entrant_rate, persistence_rate) = if previous.is_empty() {
            (1.0, 0.0)
        } else {
            let new_entrants = current.difference(&previous).count();
            let persisting = current.intersection(&previous).count();
            let entrant_rate = if current.is_empty() {
                0.0
            } else {
                new_entrants as f64 / current.len() as f64
            };
            (entrant_rate, persisting as f64 / previous.len() as f64)
        };

        points.push(ActorDynamicsPoint {
            year: *year,
            new_entrant_rate: round_to(new_entrant_rate, 4),
            persistence_rate: round_to(persistence_rate, 4),
            total_actors: current.len(),
        });
        previous = current;
    }

    points
}

/// Mean of the yearly rates, excluding the first year where every actor is new.
pub fn average_rates(points: &[ActorDynamicsPoint]) -> (f64, f64) {
    if points.len() < 2 {
        return (0.0, 0.0);
    }
    let tail = &points[1..];
    let n = tail.len() as f64;
    let entrants = tail.iter().map(|p| p.new_entrant_rate).sum::<f64>() / n;
    let persistence = tail.iter().map(|p| p.persistence_rate).sum::<f64>() / n;
    (round_to(entrants, 4), round_to(persistence, 4))
}

/// Distinct classification sections (first character) and subclasses (first
/// four characters) per year.
pub fn technology_breadth(codes_by_year: &BTreeMap<i32, Vec<String>>) -> Vec<TechnologyBreadthPoint> {
    codes_by_year
        .iter()
        .map(|(year, codes)| {
            let mut sections = BTreeSet::new();
            let mut subclasses = BTreeSet::new();
            for code in codes {
                let code = code.trim();
                let Some(section) = code.chars().next() else {
                    continue;
                };
                sections.insert(section);
                if code.chars().count() >= 4 {
                    subclasses.insert(code.chars().take(4).collect::<String>());
                }
            }
            TechnologyBreadthPoint {
                year: *year,
                unique_cpc_sections: sections.len(),
                unique_cpc_subclasses: subclasses.len(),
            }
        })
        .collect()
}

/// The `top_n` most active actors over all years with the years they were active.
pub fn actor_timeline(actors_by_year: &ActorsByYear, top_n: usize) -> Vec<ActorTimelineEntry> {
    let mut totals: BTreeMap<&String, (u64, Vec<i32>)> = BTreeMap::new();
    for (year, actors) in actors_by_year {
        for (name, count) in actors {
            let entry = totals.entry(name).or_insert((0, Vec::new()));
            entry.0 += count;
            entry.1.push(*year);
        }
    }

    let mut ranked: Vec<(&String, (u64, Vec<i32>))> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(top_n)
        .map(|(name, (total_count, years_active))| ActorTimelineEntry {
            name: name.clone(),
            years_active,
            total_count,
        })
        .collect()
}
