use crate::app::routines::RoutineOutput;
use crate::domain::model::{AlertSeverity, ApiAlert, TransparencyRecord};

/// Folds routine provenance into one [`TransparencyRecord`]. Outputs must be
/// absorbed in routine declaration order so that warnings keep that order.
#[derive(Debug, Default)]
pub struct TransparencyAssembler {
    record: TransparencyRecord,
}

impl TransparencyAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, output: &RoutineOutput) {
        for source in &output.sources {
            push_unique(&mut self.record.sources_used, source);
        }
        for method in &output.methods {
            push_unique(&mut self.record.methods, method);
        }
        self.record.warnings.extend(output.warnings.iter().cloned());
        for alert in &output.alerts {
            self.alert(alert.clone());
        }
        self.record.deterministic &= output.deterministic;
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.record.warnings.push(warning.into());
    }

    /// One alert per source. A later error replaces an earlier warning from
    /// the same source; anything else is dropped.
    pub fn alert(&mut self, alert: ApiAlert) {
        match self.record.alerts.iter_mut().find(|a| a.source == alert.source) {
            Some(existing) => {
                if existing.severity == AlertSeverity::Warning && alert.severity == AlertSeverity::Error {
                    *existing = alert;
                }
            }
            None => self.record.alerts.push(alert),
        }
    }

    pub fn finish(mut self, elapsed_ms: u64, data_complete_until: Option<i32>) -> TransparencyRecord {
        self.record.elapsed_ms = elapsed_ms;
        self.record.data_complete_until = data_complete_until;
        self.record
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{LandscapePanel, Panel};

    fn output(sources: &[&str], methods: &[&str], warnings: &[&str]) -> RoutineOutput {
        let mut output = RoutineOutput::new(Panel::Landscape(LandscapePanel::default()));
        for s in sources {
            output.source(*s);
        }
        for m in methods {
            output.method(*m);
        }
        for w in warnings {
            output.warn(*w);
        }
        output
    }

    #[test]
    fn test_sources_and_methods_are_unions_in_first_seen_order() {
        let mut assembler = TransparencyAssembler::new();
        assembler.absorb(&output(&["B", "A"], &["m1"], &["first"]));
        assembler.absorb(&output(&["A", "C"], &["m1", "m2"], &["second", "third"]));
        let record = assembler.finish(12, Some(2023));

        assert_eq!(record.sources_used, vec!["B", "A", "C"]);
        assert_eq!(record.methods, vec!["m1", "m2"]);
        assert_eq!(record.warnings, vec!["first", "second", "third"]);
        assert_eq!(record.elapsed_ms, 12);
        assert_eq!(record.data_complete_until, Some(2023));
        assert!(record.deterministic);
    }

    #[test]
    fn test_alerts_deduplicated_by_source() {
        let mut assembler = TransparencyAssembler::new();
        assembler.alert(ApiAlert::warning("GLEIF", "slow"));
        assembler.alert(ApiAlert::warning("GLEIF", "slow again"));
        assembler.alert(ApiAlert::error("Semantic Scholar", "down"));
        assembler.alert(ApiAlert::error("GLEIF", "down"));
        let record = assembler.finish(0, None);

        assert_eq!(record.alerts.len(), 2);
        assert_eq!(record.alerts[0].source, "GLEIF");
        assert_eq!(record.alerts[0].severity, AlertSeverity::Error);
        assert_eq!(record.alerts[1].source, "Semantic Scholar");
    }

    #[test]
    fn test_non_deterministic_output_taints_record() {
        let mut assembler = TransparencyAssembler::new();
        let mut sampled = output(&[], &[], &[]);
        sampled.deterministic = false;
        assembler.absorb(&output(&[], &[], &[]));
        assembler.absorb(&sampled);
        assert!(!assembler.finish(0, None).deterministic);
    }
}
