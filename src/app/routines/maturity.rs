use crate::app::routines::{dense_series, AnalysisRoutine, RoutineContext, RoutineOutput, PATENT_SOURCE};
use crate::domain::metrics::{cagr_over_active_years, classify_growth_pattern, round_to, s_curve_confidence};
use crate::domain::model::{FitModel, MaturityPanel, MaturityPoint, Panel, PanelKind, PanelStatus};
use crate::domain::scurve::fit_maturity_curve;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info};

/// Minimum cumulative patent count before a curve fit is attempted.
pub const MIN_PATENTS_FOR_FIT: u64 = 30;

/// Technology maturity from the cumulative patent curve.
pub struct MaturityRoutine;

impl MaturityRoutine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MaturityRoutine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisRoutine for MaturityRoutine {
    fn get_name(&self) -> &str {
        "maturity"
    }

    fn panel_kind(&self) -> PanelKind {
        PanelKind::Maturity
    }

    async fn run(&self, ctx: &RoutineContext) -> Result<RoutineOutput> {
        let started = Instant::now();
        let rows = ctx.sources.patents.count_by_year(ctx.term(), ctx.range).await;

        let mut output = RoutineOutput::new(Panel::Maturity(MaturityPanel::default()));
        let rows = output.settle(PATENT_SOURCE, "patent_years", rows);
        if !rows.is_empty() {
            output.source(PATENT_SOURCE);
        }

        let yearly = dense_series(ctx.range, &rows);
        let mut running = 0;
        let time_series: Vec<MaturityPoint> = yearly
            .iter()
            .map(|(year, patents)| {
                running += patents;
                MaturityPoint {
                    year: *year,
                    patents: *patents,
                    cumulative: running,
                }
            })
            .collect();

        let fit_end = match ctx.data_complete_until {
            Some(last) if last < ctx.range.end => {
                output.warn(format!(
                    "Maturity curve limited to {}-{} (data incomplete from {})",
                    ctx.range.start,
                    last,
                    last + 1
                ));
                last
            }
            _ => ctx.range.end,
        };
        let fit_points: Vec<&MaturityPoint> = time_series.iter().filter(|p| p.year <= fit_end).collect();

        let mut panel = MaturityPanel {
            status: if running > 0 {
                PanelStatus::Complete
            } else {
                PanelStatus::NoData
            },
            ..MaturityPanel::default()
        };

        let active: Vec<(i32, f64)> = fit_points.iter().map(|p| (p.year, p.patents as f64)).collect();
        if let Some((rate, period)) = cagr_over_active_years(&active) {
            panel.cagr = round_to(rate, 2);
            output.method(format!("CAGR over active years {}", period));
        }

        let fit_total = fit_points.last().map(|p| p.cumulative).unwrap_or(0);
        let yearly_counts: Vec<u64> = time_series.iter().map(|p| p.patents).collect();

        let fit = if fit_total >= MIN_PATENTS_FOR_FIT {
            let points: Vec<(i32, f64)> = fit_points.iter().map(|p| (p.year, p.cumulative as f64)).collect();
            Some(fit_maturity_curve(&points))
        } else {
            if fit_total > 0 {
                output.warn(format!(
                    "Too few patents ({}) for a maturity curve (minimum {}); using growth-pattern heuristic",
                    fit_total, MIN_PATENTS_FOR_FIT
                ));
            }
            None
        };

        match fit {
            Some(fit) if fit.model != FitModel::LinearTrend => {
                debug!("Maturity fit {:?} R²={}", fit.model, fit.fit_quality);
                panel.phase = fit.phase;
                panel.confidence = s_curve_confidence(fit.fit_quality, fit_points.len(), fit_total);
                panel.maturity_percent = fit.maturity_percent;
                panel.saturation_level = fit.saturation_level;
                panel.inflection_year = fit.inflection_year;
                panel.fit_quality = fit.fit_quality;
                panel.fit_model = Some(fit.model);
                panel.fitted_curve = fit.fitted_curve;
                output.method(format!("S-curve ({:?}, R²={})", fit.model, fit.fit_quality));
                output.method("Phase from maturity percent");
            }
            other => {
                let (phase, confidence) = classify_growth_pattern(&yearly_counts);
                panel.phase = phase;
                panel.confidence = confidence;
                if let Some(fallback) = other {
                    if let Some(warning) = fallback.warning {
                        output.warn(warning);
                    }
                    panel.fit_model = Some(FitModel::LinearTrend);
                    panel.fitted_curve = fallback.fitted_curve;
                }
                output.method("Phase from growth-pattern heuristic");
            }
        }

        panel.time_series = time_series;
        info!(
            "✅ Maturity computed: phase {:?}, {} patents ({:?})",
            panel.phase,
            running,
            started.elapsed()
        );
        output.panel = Panel::Maturity(panel);
        Ok(output)
    }
}
