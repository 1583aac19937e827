//! Saturation-curve fitting for cumulative activity series.
//!
//! Two growth models are fitted with a bounded Levenberg-Marquardt solver:
//!
//! - logistic: `L / (1 + exp(-k (x - x0)))`, symmetric around `x0`
//! - Gompertz: `L * exp(-b * exp(-k (x - x0)))`, inflecting at `x0 + ln(b) / k`
//!
//! The model with the higher R² wins; Gompertz must be strictly better to
//! replace the logistic fit. When neither fit is possible the cumulative
//! linear trend is returned instead, with a warning and zero fit quality.

use crate::domain::metrics::{classify_growth_pattern, phase_from_maturity, round_to};
use crate::domain::model::{FitModel, FittedPoint, MaturityPhase};

pub const MIN_FIT_POINTS: usize = 4;

const MAX_ITERATIONS: usize = 200;
const INITIAL_LAMBDA: f64 = 1e-3;
const MAX_LAMBDA: f64 = 1e12;
const COST_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct MaturityFit {
    pub model: FitModel,
    pub fit_quality: f64,
    pub saturation_level: f64,
    pub inflection_year: f64,
    pub maturity_percent: f64,
    pub phase: MaturityPhase,
    pub fitted_curve: Vec<FittedPoint>,
    pub warning: Option<String>,
}

/// Fits both growth models to `(year, cumulative)` points and keeps the
/// better one. Never fails: short or degenerate input falls back to the
/// linear trend.
pub fn fit_maturity_curve(points: &[(i32, f64)]) -> MaturityFit {
    if points.len() < MIN_FIT_POINTS {
        return linear_trend(
            points,
            format!(
                "Maturity curve needs at least {} data points (got {}); showing linear trend",
                MIN_FIT_POINTS,
                points.len()
            ),
        );
    }
    let distinct = distinct_values(points);
    if distinct < MIN_FIT_POINTS {
        return linear_trend(
            points,
            format!(
                "Maturity curve needs at least {} distinct cumulative values (got {}); showing linear trend",
                MIN_FIT_POINTS, distinct
            ),
        );
    }
    let last = points[points.len() - 1].1;
    if last <= 0.0 {
        return linear_trend(
            points,
            "No cumulative activity to fit; showing linear trend".to_string(),
        );
    }

    let xs: Vec<f64> = points.iter().map(|(year, _)| *year as f64).collect();
    let ys: Vec<f64> = points.iter().map(|(_, value)| *value).collect();

    let best = match (fit_logistic(&xs, &ys), fit_gompertz(&xs, &ys)) {
        (Some(logistic), Some(gompertz)) => {
            if gompertz.r_squared > logistic.r_squared {
                Some(gompertz)
            } else {
                Some(logistic)
            }
        }
        (Some(logistic), None) => Some(logistic),
        (None, Some(gompertz)) => Some(gompertz),
        (None, None) => None,
    };

    match best {
        Some(curve) => curve.into_fit(points, last),
        None => linear_trend(
            points,
            "Curve optimizer did not converge; showing linear trend".to_string(),
        ),
    }
}

struct CurveEstimate {
    model: FitModel,
    params: Vec<f64>,
    r_squared: f64,
}

impl CurveEstimate {
    fn into_fit(self, points: &[(i32, f64)], last: f64) -> MaturityFit {
        let saturation = self.params[0];
        let inflection = match self.model {
            FitModel::Gompertz => {
                let (b, k, x0) = (self.params[1], self.params[2], self.params[3]);
                x0 + b.ln() / k
            }
            _ => self.params[2],
        };
        let maturity = if saturation > 0.0 {
            (last / saturation * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let maturity = round_to(maturity, 2);

        let fitted_curve = points
            .iter()
            .map(|(year, _)| FittedPoint {
                year: *year,
                fitted: round_to(self.evaluate(*year as f64), 1),
            })
            .collect();

        MaturityFit {
            model: self.model,
            fit_quality: round_to(self.r_squared, 4),
            saturation_level: round_to(saturation, 2),
            inflection_year: round_to(inflection, 2),
            maturity_percent: maturity,
            phase: phase_from_maturity(maturity),
            fitted_curve,
            warning: None,
        }
    }

    fn evaluate(&self, x: f64) -> f64 {
        match self.model {
            FitModel::Gompertz => gompertz(&self.params, x),
            _ => logistic(&self.params, x),
        }
    }
}

/// Number of different cumulative values. Flat stretches add no shape
/// information to the fit.
fn distinct_values(points: &[(i32, f64)]) -> usize {
    let mut values: Vec<f64> = points.iter().map(|(_, value)| *value).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    values.len()
}

fn linear_trend(points: &[(i32, f64)], warning: String) -> MaturityFit {
    let n = points.len() as f64;
    let fitted_curve = if points.is_empty() {
        Vec::new()
    } else {
        let mean_x = points.iter().map(|(x, _)| *x as f64).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| *y).sum::<f64>() / n;
        let sxx: f64 = points.iter().map(|(x, _)| (*x as f64 - mean_x).powi(2)).sum();
        let sxy: f64 = points
            .iter()
            .map(|(x, y)| (*x as f64 - mean_x) * (y - mean_y))
            .sum();
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        points
            .iter()
            .map(|(x, _)| FittedPoint {
                year: *x,
                fitted: round_to(mean_y + slope * (*x as f64 - mean_x), 1),
            })
            .collect()
    };

    let mut yearly = Vec::with_capacity(points.len());
    let mut previous = 0.0;
    for (_, cumulative) in points {
        yearly.push((cumulative - previous).max(0.0).round() as u64);
        previous = *cumulative;
    }
    let (phase, _) = classify_growth_pattern(&yearly);

    MaturityFit {
        model: FitModel::LinearTrend,
        fit_quality: 0.0,
        saturation_level: 0.0,
        inflection_year: 0.0,
        maturity_percent: 0.0,
        phase,
        fitted_curve,
        warning: Some(warning),
    }
}

/// 10%-90% transition width of the series against a provisional saturation.
fn transition_width(xs: &[f64], ys: &[f64], saturation: f64) -> f64 {
    let lo = nearest_index(ys, saturation * 0.1);
    let hi = nearest_index(ys, saturation * 0.9);
    xs[hi] - xs[lo]
}

fn nearest_index(ys: &[f64], target: f64) -> usize {
    let mut best = 0;
    for (i, y) in ys.iter().enumerate() {
        if (y - target).abs() < (ys[best] - target).abs() {
            best = i;
        }
    }
    best
}

fn fit_logistic(xs: &[f64], ys: &[f64]) -> Option<CurveEstimate> {
    let y_max = ys[ys.len() - 1];
    let first_x = xs[0];
    let last_x = xs[xs.len() - 1];

    let saturation = y_max * 1.5;
    let midpoint = xs[nearest_index(ys, saturation / 2.0)];
    let width = transition_width(xs, ys, saturation);
    let k0 = if width > 0.0 { 4.0 / width } else { 0.5 };

    let lower = [y_max * 0.5, 0.001, first_x - 10.0];
    let upper = [y_max * 10.0, 5.0, last_x + 10.0];
    let params = levenberg_marquardt(
        xs,
        ys,
        vec![saturation, k0, midpoint],
        &lower,
        &upper,
        logistic,
        logistic_gradient,
    )?;

    Some(CurveEstimate {
        model: FitModel::Logistic,
        r_squared: r_squared(xs, ys, &params, logistic),
        params,
    })
}

fn fit_gompertz(xs: &[f64], ys: &[f64]) -> Option<CurveEstimate> {
    let y_max = ys[ys.len() - 1];
    let first_x = xs[0];
    let last_x = xs[xs.len() - 1];

    let saturation = y_max * 1.5;
    let width = transition_width(xs, ys, saturation);
    let k0 = if width > 0.0 { 4.0 / width } else { 0.3 };

    let lower = [y_max * 0.5, 0.1, 0.001, first_x - 10.0];
    let upper = [y_max * 10.0, 50.0, 5.0, last_x + 10.0];
    let params = levenberg_marquardt(
        xs,
        ys,
        vec![saturation, 5.0, k0, first_x],
        &lower,
        &upper,
        gompertz,
        gompertz_gradient,
    )?;

    Some(CurveEstimate {
        model: FitModel::Gompertz,
        r_squared: r_squared(xs, ys, &params, gompertz),
        params,
    })
}

fn logistic(p: &[f64], x: f64) -> f64 {
    let (l, k, x0) = (p[0], p[1], p[2]);
    l / (1.0 + (-k * (x - x0)).exp())
}

fn logistic_gradient(p: &[f64], x: f64, out: &mut [f64]) {
    let (l, k, x0) = (p[0], p[1], p[2]);
    let e = (-k * (x - x0)).exp();
    let denom = 1.0 + e;
    let denom_sq = denom * denom;
    out[0] = 1.0 / denom;
    out[1] = l * e * (x - x0) / denom_sq;
    out[2] = -l * e * k / denom_sq;
}

fn gompertz(p: &[f64], x: f64) -> f64 {
    let (l, b, k, x0) = (p[0], p[1], p[2], p[3]);
    l * (-b * (-k * (x - x0)).exp()).exp()
}

fn gompertz_gradient(p: &[f64], x: f64, out: &mut [f64]) {
    let (l, b, k, x0) = (p[0], p[1], p[2], p[3]);
    let g = (-k * (x - x0)).exp();
    let outer = (-b * g).exp();
    out[0] = outer;
    out[1] = -l * g * outer;
    out[2] = l * outer * b * g * (x - x0);
    out[3] = -l * outer * b * g * k;
}

fn sum_squared_residuals(xs: &[f64], ys: &[f64], params: &[f64], f: fn(&[f64], f64) -> f64) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (y - f(params, *x)).powi(2))
        .sum()
}

/// Coefficient of determination, clipped to `[0, 1]`; zero for a flat series.
fn r_squared(xs: &[f64], ys: &[f64], params: &[f64], f: fn(&[f64], f64) -> f64) -> f64 {
    let mean = ys.iter().sum::<f64>() / ys.len() as f64;
    let ss_tot: f64 = ys.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot <= 0.0 {
        return 0.0;
    }
    let ss_res = sum_squared_residuals(xs, ys, params, f);
    let r2 = 1.0 - ss_res / ss_tot;
    if r2.is_finite() {
        r2.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Bounded least squares. Each trial step is projected back into
/// `[lower, upper]`; a step is accepted only when it lowers the residual sum.
/// Returns `None` if the objective is not finite at the start.
fn levenberg_marquardt(
    xs: &[f64],
    ys: &[f64],
    initial: Vec<f64>,
    lower: &[f64],
    upper: &[f64],
    f: fn(&[f64], f64) -> f64,
    gradient: fn(&[f64], f64, &mut [f64]),
) -> Option<Vec<f64>> {
    let n = initial.len();
    let mut params: Vec<f64> = initial
        .iter()
        .enumerate()
        .map(|(i, p)| p.clamp(lower[i], upper[i]))
        .collect();
    let mut cost = sum_squared_residuals(xs, ys, &params, f);
    if !cost.is_finite() {
        return None;
    }

    let mut lambda = INITIAL_LAMBDA;
    let mut row = vec![0.0; n];

    for _ in 0..MAX_ITERATIONS {
        let mut jtj = vec![vec![0.0; n]; n];
        let mut jtr = vec![0.0; n];
        for (x, y) in xs.iter().zip(ys) {
            gradient(&params, *x, &mut row);
            let residual = y - f(&params, *x);
            for i in 0..n {
                jtr[i] += row[i] * residual;
                for j in 0..n {
                    jtj[i][j] += row[i] * row[j];
                }
            }
        }
        if jtj.iter().flatten().any(|v| !v.is_finite()) {
            break;
        }

        let mut improved = false;
        while lambda < MAX_LAMBDA {
            let mut damped = jtj.clone();
            for (i, damped_row) in damped.iter_mut().enumerate() {
                damped_row[i] += lambda * jtj[i][i].max(1e-12);
            }
            let Some(step) = solve_linear(damped, jtr.clone()) else {
                lambda *= 10.0;
                continue;
            };
            let candidate: Vec<f64> = params
                .iter()
                .zip(&step)
                .enumerate()
                .map(|(i, (p, d))| (p + d).clamp(lower[i], upper[i]))
                .collect();
            let candidate_cost = sum_squared_residuals(xs, ys, &candidate, f);
            if candidate_cost.is_finite() && candidate_cost < cost {
                let reduction = cost - candidate_cost;
                params = candidate;
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-12);
                improved = reduction > COST_TOLERANCE * cost.max(1.0);
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            break;
        }
    }

    Some(params)
}

/// Gaussian elimination with partial pivoting. `None` for a singular system.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let mut pivot = col;
        for r in col + 1..n {
            if a[r][col].abs() > a[pivot][col].abs() {
                pivot = r;
            }
        }
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for r in col + 1..n {
            let factor = a[r][col] / a[col][col];
            for c in col..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let tail: f64 = (r + 1..n).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
