use std::collections::BTreeSet;

use serde::Serialize;

use crate::engine::AggregateMetrics;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntentDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub restrictive: usize,
    pub none: usize,
}

impl IntentDistribution {
    pub fn record(&mut self, positive: bool, neutral: bool, restrictive: bool) {
        if positive {
            self.positive += 1;
        }
        if neutral {
            self.neutral += 1;
        }
        if restrictive {
            self.restrictive += 1;
        }
        if !positive && !neutral && !restrictive {
            self.none += 1;
        }
    }
}

/// Subpolicies dropped from one bill because the website no longer lists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportWarning {
    pub kind: String,
    pub bill: String,
    pub policies: Vec<String>,
}

/// Counters accumulated while an export runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportMetrics {
    pub total_records: usize,
    pub complete_records: usize,
    pub source_blurbs: usize,
    pub exported_blurbs: usize,
    pub date_errors: usize,
    pub format_errors: usize,
    pub duplicates: usize,
    pub states: BTreeSet<String>,
    pub policies: BTreeSet<String>,
    pub intent: IntentDistribution,
    pub successful: usize,
    pub failed: usize,
    pub warnings: Vec<ExportWarning>,
}

impl ExportMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_records as f64 * 100.0
        }
    }

    pub fn blurb_failures(&self) -> usize {
        self.source_blurbs.saturating_sub(self.exported_blurbs)
    }

    pub fn aggregate(&self) -> AggregateMetrics {
        AggregateMetrics {
            total_records: self.total_records,
            complete_records: self.complete_records,
            fidelity_expected: self.source_blurbs,
            fidelity_delivered: self.exported_blurbs,
            date_errors: self.date_errors,
            format_errors: self.format_errors,
            duplicates: self.duplicates,
            coverage: self.states.len(),
        }
    }
}
