//! Deterministic indicators shared by the analysis routines. Every function is
//! pure: same input, bit-identical output.

use crate::domain::model::{ConcentrationBand, MaturityPhase};
use std::cmp::Reverse;

pub const LOW_CONCENTRATION_LIMIT: f64 = 1500.0;
pub const HIGH_CONCENTRATION_LIMIT: f64 = 2500.0;

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Year-over-year percent change. The first point is undefined, as is any
/// point whose predecessor is zero or negative.
pub fn growth_rate(series: &[f64]) -> Vec<Option<f64>> {
    let mut rates = Vec::with_capacity(series.len());
    for (i, value) in series.iter().enumerate() {
        if i == 0 {
            rates.push(None);
            continue;
        }
        let prior = series[i - 1];
        if prior <= 0.0 {
            rates.push(None);
        } else {
            rates.push(Some((value - prior) / prior * 100.0));
        }
    }
    rates
}

/// Herfindahl-Hirschman index over market shares in `[0, 1]`, scaled to `[0, 10000]`.
pub fn concentration_index(shares: &[f64]) -> f64 {
    shares.iter().map(|s| s * s).sum::<f64>() * 10_000.0
}

pub fn concentration_band(index: f64) -> ConcentrationBand {
    if index < LOW_CONCENTRATION_LIMIT {
        ConcentrationBand::Low
    } else if index <= HIGH_CONCENTRATION_LIMIT {
        ConcentrationBand::Moderate
    } else {
        ConcentrationBand::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationResult {
    pub index: f64,
    pub band: ConcentrationBand,
    pub top3_share: f64,
}

/// Concentration over raw activity counts. Returns `None` when there is no
/// activity at all.
pub fn concentration(counts: &[u64]) -> Option<ConcentrationResult> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;
    let shares: Vec<f64> = counts.iter().map(|&c| c as f64 / total).collect();
    let index = concentration_index(&shares);

    let mut sorted = shares.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top3_share: f64 = sorted.iter().take(3).sum();

    Some(ConcentrationResult {
        index,
        band: concentration_band(index),
        top3_share: top3_share.min(1.0),
    })
}

/// `((final / initial)^(1 / periods) - 1) * 100`. Invalid inputs
/// (non-positive endpoints, fewer than one period) yield `0.0`.
pub fn compound_growth_rate(initial: f64, final_value: f64, periods: u32) -> f64 {
    if periods < 1 || initial <= 0.0 || final_value <= 0.0 {
        return 0.0;
    }
    ((final_value / initial).powf(1.0 / periods as f64) - 1.0) * 100.0
}

/// CAGR between the first and last non-zero entries of a yearly series.
/// Returns the rate and the `first-last` period label, or `None` when fewer
/// than two non-zero years exist.
pub fn cagr_over_active_years(series: &[(i32, f64)]) -> Option<(f64, String)> {
    let active: Vec<&(i32, f64)> = series.iter().filter(|(_, v)| *v > 0.0).collect();
    if active.len() < 2 {
        return None;
    }
    let (first_year, first) = *active[0];
    let (last_year, last) = *active[active.len() - 1];
    let periods = (last_year - first_year).max(0) as u32;
    if periods < 1 {
        return None;
    }
    Some((
        compound_growth_rate(first, last, periods),
        format!("{}-{}", first_year, last_year),
    ))
}

pub fn h_index(citations: &[u64]) -> u64 {
    let mut sorted = citations.to_vec();
    sorted.sort_by_key(|&c| Reverse(c));
    let mut h = 0;
    for (i, &c) in sorted.iter().enumerate() {
        let rank = i as u64 + 1;
        if c >= rank {
            h = rank;
        } else {
            break;
        }
    }
    h
}

/// Weighted confidence for a curve-based phase call: fit quality 60%,
/// year coverage 20% (saturating at 15 years), sample size 20% (saturating
/// at 200 patents). Clipped to `[0.1, 0.95]`.
pub fn s_curve_confidence(r_squared: f64, n_years: usize, total_patents: u64) -> f64 {
    let data_factor = (n_years as f64 / 15.0).min(1.0);
    let sample_factor = (total_patents as f64 / 200.0).min(1.0);
    let raw = r_squared * 0.6 + data_factor * 0.2 + sample_factor * 0.2;
    round_to(raw.clamp(0.1, 0.95), 2)
}

pub fn phase_from_maturity(maturity_percent: f64) -> MaturityPhase {
    if maturity_percent < 10.0 {
        MaturityPhase::Emerging
    } else if maturity_percent < 50.0 {
        MaturityPhase::Growing
    } else if maturity_percent < 90.0 {
        MaturityPhase::Mature
    } else {
        MaturityPhase::Declining
    }
}

/// Phase guess from the shape of yearly counts alone, used when no curve
/// could be fitted. Compares the halves of the series, the trend over the
/// last three years and the stability of the second half.
pub fn classify_growth_pattern(yearly_counts: &[u64]) -> (MaturityPhase, f64) {
    let n = yearly_counts.len();
    let total: u64 = yearly_counts.iter().sum();
    if n < 3 || total == 0 {
        return (MaturityPhase::Unknown, 0.0);
    }

    let values: Vec<f64> = yearly_counts.iter().map(|&c| c as f64).collect();
    let mid = n / 2;
    let (first_half, second_half) = values.split_at(mid.max(1));
    let mean = |xs: &[f64]| {
        if xs.is_empty() {
            0.0
        } else {
            xs.iter().sum::<f64>() / xs.len() as f64
        }
    };
    let avg_first = mean(first_half);
    let avg_second = mean(second_half);

    let recent = &values[n - 3..];
    let recent_growth = if recent[0] > 0.0 {
        (recent[2] - recent[0]) / recent[0]
    } else {
        0.0
    };

    let overall_growth = if avg_first > 0.0 {
        (avg_second - avg_first) / avg_first
    } else if avg_second > 0.0 {
        1.0
    } else {
        0.0
    };

    let cv = if !second_half.is_empty() && avg_second > 0.0 {
        let variance = second_half
            .iter()
            .map(|x| (x - avg_second).powi(2))
            .sum::<f64>()
            / second_half.len() as f64;
        variance.sqrt() / avg_second
    } else {
        1.0
    };

    let (phase, confidence) = if overall_growth > 0.5 && recent_growth > 0.1 {
        (MaturityPhase::Emerging, 0.5 + overall_growth * 0.3)
    } else if overall_growth > 0.1 && recent_growth > -0.1 {
        (MaturityPhase::Growing, 0.5 + (1.0 - cv) * 0.3)
    } else if overall_growth.abs() <= 0.2 && cv < 0.4 {
        (MaturityPhase::Mature, 0.6 + (1.0 - cv) * 0.3)
    } else if overall_growth < -0.1 || recent_growth < -0.2 {
        (MaturityPhase::Declining, 0.5 + overall_growth.abs() * 0.3)
    } else {
        (MaturityPhase::Growing, 0.4)
    };

    (phase, round_to(confidence.min(0.9), 2))
}
