//! Co-occurrence counting and Jaccard similarity networks.

use crate::domain::metrics::round_to;
use std::collections::{BTreeMap, BTreeSet};

/// Unordered category pair, stored with the smaller label first.
pub type CategoryPair = (String, String);

pub fn ordered_pair(a: &str, b: &str) -> CategoryPair {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoOccurrence {
    /// Number of items carrying each category.
    pub individual: BTreeMap<String, u64>,
    /// Number of items carrying both categories of a pair.
    pub pairs: BTreeMap<CategoryPair, u64>,
    pub items: u64,
}

/// Counts categories and category pairs over a collection of item sets.
pub fn count_co_occurrence<'a, I>(sets: I) -> CoOccurrence
where
    I: IntoIterator<Item = &'a BTreeSet<String>>,
{
    let mut result = CoOccurrence::default();
    for set in sets {
        result.items += 1;
        let labels: Vec<&String> = set.iter().collect();
        for (i, a) in labels.iter().enumerate() {
            *result.individual.entry((*a).clone()).or_insert(0) += 1;
            for b in &labels[i + 1..] {
                *result
                    .pairs
                    .entry(((*a).clone(), (*b).clone()))
                    .or_insert(0) += 1;
            }
        }
    }
    result
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityNetwork {
    pub labels: Vec<String>,
    /// Symmetric, zero diagonal, values in `[0, 1]` rounded to 4 places.
    pub matrix: Vec<Vec<f64>>,
    /// Pairs with non-zero similarity.
    pub total_connections: u64,
}

pub fn jaccard(count_a: u64, count_b: u64, both: u64) -> f64 {
    let union = (count_a + count_b).saturating_sub(both);
    if union == 0 {
        0.0
    } else {
        both as f64 / union as f64
    }
}

/// Ranks categories by individual count (ties by label), keeps the top `top_n`
/// and builds the Jaccard matrix over them. Fewer than two categories yield an
/// empty matrix.
pub fn pairwise_similarity(
    co_occurrence: &BTreeMap<CategoryPair, u64>,
    individual: &BTreeMap<String, u64>,
    top_n: usize,
) -> SimilarityNetwork {
    let labels = top_labels(individual, top_n);
    if labels.len() < 2 {
        return SimilarityNetwork {
            labels,
            matrix: Vec::new(),
            total_connections: 0,
        };
    }

    let n = labels.len();
    let mut matrix = vec![vec![0.0; n]; n];
    let mut total_connections = 0;
    for i in 0..n {
        for j in i + 1..n {
            let pair = ordered_pair(&labels[i], &labels[j]);
            let both = co_occurrence.get(&pair).copied().unwrap_or(0);
            if both == 0 {
                continue;
            }
            let count_a = individual.get(&labels[i]).copied().unwrap_or(0);
            let count_b = individual.get(&labels[j]).copied().unwrap_or(0);
            let value = round_to(jaccard(count_a, count_b, both), 4);
            matrix[i][j] = value;
            matrix[j][i] = value;
            if value > 0.0 {
                total_connections += 1;
            }
        }
    }

    SimilarityNetwork {
        labels,
        matrix,
        total_connections,
    }
}

pub fn top_labels(individual: &BTreeMap<String, u64>, top_n: usize) -> Vec<String> {
    let mut ranked: Vec<(&String, &u64)> = individual.iter().filter(|(_, c)| **c > 0).collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(top_n)
        .map(|(label, _)| label.clone())
        .collect()
}

/// Truncates a classification code to `level` characters after removing
/// whitespace.
pub fn normalize_code(code: &str, level: usize) -> String {
    let clean: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    clean.chars().take(level).collect()
}
