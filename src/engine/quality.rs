use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::report::{Report, Section};

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub completeness: f64,
    pub accuracy: f64,
    pub consistency: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.3,
            accuracy: 0.5,
            consistency: 0.2,
        }
    }
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.completeness + self.accuracy + self.consistency
    }

    pub fn validate(&self) -> Result<(), QualityPolicyError> {
        if [self.completeness, self.accuracy, self.consistency]
            .iter()
            .any(|weight| *weight < 0.0)
        {
            return Err(QualityPolicyError::NegativeWeight);
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(QualityPolicyError::WeightsDoNotSumToOne(sum));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeStep {
    pub threshold: f64,
    pub label: String,
}

/// Descending (threshold, label) pairs; the first threshold the score
/// reaches wins, and scores below every threshold get `floor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeLadder {
    pub steps: Vec<GradeStep>,
    pub floor: String,
}

impl Default for GradeLadder {
    fn default() -> Self {
        let steps = [(95.0, "A+"), (90.0, "A"), (85.0, "B"), (80.0, "C"), (70.0, "D")]
            .into_iter()
            .map(|(threshold, label)| GradeStep {
                threshold,
                label: label.to_string(),
            })
            .collect();
        Self {
            steps,
            floor: "F".to_string(),
        }
    }
}

impl GradeLadder {
    pub fn grade(&self, score: f64) -> &str {
        self.steps
            .iter()
            .find(|step| score >= step.threshold)
            .map(|step| step.label.as_str())
            .unwrap_or(&self.floor)
    }

    pub fn validate(&self) -> Result<(), QualityPolicyError> {
        let descending = self
            .steps
            .windows(2)
            .all(|pair| pair[0].threshold > pair[1].threshold);
        if descending {
            Ok(())
        } else {
            Err(QualityPolicyError::LadderNotDescending)
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QualityPolicyError {
    #[error("quality weights must sum to 1.0 (found {0:.4})")]
    WeightsDoNotSumToOne(f64),
    #[error("quality weights must not be negative")]
    NegativeWeight,
    #[error("grade thresholds must be strictly descending")]
    LadderNotDescending,
    #[error("fidelity sub-weight must lie in [0, 1] (found {0})")]
    FidelityWeightOutOfRange(f64),
    #[error("warning score ({warning}) must not be below the critical score ({critical})")]
    ScoreThresholdsInverted { critical: f64, warning: f64 },
}

/// Scoring knobs. Every deployment-specific threshold lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityPolicy {
    pub weights: QualityWeights,
    /// Share of completeness taken by the fidelity ratio.
    pub fidelity_weight: f64,
    /// Accuracy points lost per unit of error rate.
    pub accuracy_penalty: f64,
    pub grades: GradeLadder,
    /// Totals below this raise a critical recommendation.
    pub critical_score: f64,
    /// Totals below this (but not below `critical_score`) raise a high one.
    pub warning_score: f64,
    /// Critical-field errors tolerated before a recommendation is raised.
    pub max_critical_field_errors: usize,
    /// Fewer distinct coverage values than this raises a recommendation.
    pub min_coverage: usize,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            fidelity_weight: 0.3,
            accuracy_penalty: 20.0,
            grades: GradeLadder::default(),
            critical_score: 50.0,
            warning_score: 70.0,
            max_critical_field_errors: 0,
            min_coverage: 40,
        }
    }
}

impl QualityPolicy {
    pub fn validate(&self) -> Result<(), QualityPolicyError> {
        self.weights.validate()?;
        self.grades.validate()?;
        if !(0.0..=1.0).contains(&self.fidelity_weight) {
            return Err(QualityPolicyError::FidelityWeightOutOfRange(
                self.fidelity_weight,
            ));
        }
        if self.warning_score < self.critical_score {
            return Err(QualityPolicyError::ScoreThresholdsInverted {
                critical: self.critical_score,
                warning: self.warning_score,
            });
        }
        Ok(())
    }
}

/// Raw counts a run accumulates before scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_records: usize,
    pub complete_records: usize,
    /// Records that should carry a secondary value through (e.g. source blurbs).
    pub fidelity_expected: usize,
    /// How many of those actually did.
    pub fidelity_delivered: usize,
    pub date_errors: usize,
    pub format_errors: usize,
    pub duplicates: usize,
    /// Distinct coverage values seen (e.g. states).
    pub coverage: usize,
}

impl AggregateMetrics {
    fn rate(&self, count: usize) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            count as f64 / self.total_records as f64
        }
    }

    pub fn field_completeness(&self) -> f64 {
        if self.total_records == 0 {
            100.0
        } else {
            self.complete_records as f64 / self.total_records as f64 * 100.0
        }
    }

    pub fn fidelity(&self) -> f64 {
        if self.fidelity_expected == 0 {
            100.0
        } else {
            self.fidelity_delivered as f64 / self.fidelity_expected as f64 * 100.0
        }
    }

    pub fn fidelity_failures(&self) -> usize {
        self.fidelity_expected.saturating_sub(self.fidelity_delivered)
    }

    pub fn error_rate(&self) -> f64 {
        self.rate(self.date_errors + self.format_errors)
    }

    pub fn duplicate_rate(&self) -> f64 {
        self.rate(self.duplicates)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub completeness: f64,
    pub accuracy: f64,
    pub consistency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

impl Priority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub message: String,
    pub action: String,
}

impl Recommendation {
    fn new(priority: Priority, message: String, action: &str) -> Self {
        Self {
            priority,
            message,
            action: action.to_string(),
        }
    }
}

/// Elapsed time since the previous persisted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trend {
    pub now: NaiveDate,
    pub last_run: Option<NaiveDate>,
    /// Whole days since the last run, or the default window on a first run.
    pub days_since_last_check: i64,
}

impl Trend {
    pub fn between(now: NaiveDate, last_run: Option<NaiveDate>, default_window_days: i64) -> Self {
        let days_since_last_check = match last_run {
            Some(last) => (now - last).num_days(),
            None => default_window_days,
        };
        Self {
            now,
            last_run,
            days_since_last_check,
        }
    }

    /// Start of the comparison window. Windows reaching past the calendar
    /// clamp to its first day.
    pub fn window_start(&self) -> NaiveDate {
        self.last_run.unwrap_or_else(|| {
            chrono::Duration::try_days(self.days_since_last_check)
                .and_then(|window| self.now.checked_sub_signed(window))
                .unwrap_or(NaiveDate::MIN)
        })
    }

    pub fn commentary(&self) -> String {
        match self.last_run {
            Some(last) => format!(
                "{} day(s) since last check on {}",
                self.days_since_last_check,
                last.format("%Y-%m-%d")
            ),
            None => format!(
                "No previous check found; using a {}-day window",
                self.days_since_last_check
            ),
        }
    }
}

/// Scored outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub metrics: AggregateMetrics,
    pub violations_by_rule: BTreeMap<String, usize>,
    pub components: ComponentScores,
    pub total: f64,
    pub grade: String,
    pub recommendations: Vec<Recommendation>,
    pub trend: Option<Trend>,
    pub critical_issues_overridden: bool,
}

impl QualityReport {
    pub fn with_violations(mut self, violations: BTreeMap<String, usize>) -> Self {
        self.violations_by_rule = violations;
        self
    }

    pub fn with_trend(mut self, trend: Trend) -> Self {
        self.trend = Some(trend);
        self
    }

    pub fn overridden(mut self, overridden: bool) -> Self {
        self.critical_issues_overridden = overridden;
        self
    }

    pub fn rounded_total(&self) -> i64 {
        self.total.round() as i64
    }

    pub fn to_report(&self, title: &str) -> Report {
        let mut report = Report::new(title);
        report.push(
            Section::new("Quality Score")
                .entry("Score", format!("{}/100", self.rounded_total()))
                .entry("Grade", &self.grade)
                .entry("Completeness", format!("{:.0}%", self.components.completeness.round()))
                .entry("Accuracy", format!("{:.0}%", self.components.accuracy.round()))
                .entry("Consistency", format!("{:.0}%", self.components.consistency.round())),
        );
        if !self.violations_by_rule.is_empty() {
            let mut section = Section::new("Rule Violations");
            for (rule, count) in &self.violations_by_rule {
                section = section.entry(rule, count);
            }
            report.push(section);
        }
        if let Some(trend) = &self.trend {
            report.push(Section::new("Trend").paragraph(trend.commentary()));
        }
        if self.critical_issues_overridden {
            report.push(
                Section::new("Overrides")
                    .paragraph("Critical preflight issues were ignored by the operator"),
            );
        }
        report.push(
            Section::new("Recommendations").bullets(self.recommendations.iter().map(|rec| {
                format!("{}: {} ({})", rec.priority.label(), rec.message, rec.action)
            })),
        );
        report
    }
}

/// Weighted quality scoring over aggregate metrics.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    policy: QualityPolicy,
}

impl QualityScorer {
    pub fn new(policy: QualityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &QualityPolicy {
        &self.policy
    }

    pub fn components(&self, metrics: &AggregateMetrics) -> ComponentScores {
        let fidelity_weight = self.policy.fidelity_weight;
        let completeness = metrics.field_completeness() * (1.0 - fidelity_weight)
            + metrics.fidelity() * fidelity_weight;
        let accuracy = (100.0 - metrics.error_rate() * self.policy.accuracy_penalty).max(0.0);
        let consistency = (100.0 - metrics.duplicate_rate() * 100.0).max(0.0);

        ComponentScores {
            completeness: completeness.clamp(0.0, 100.0),
            accuracy: accuracy.min(100.0),
            consistency: consistency.min(100.0),
        }
    }

    /// Weighted sum, snapped to 1e-6 so grade boundaries hold exactly.
    pub fn total(&self, components: &ComponentScores) -> f64 {
        let weights = &self.policy.weights;
        let raw = components.completeness * weights.completeness
            + components.accuracy * weights.accuracy
            + components.consistency * weights.consistency;
        ((raw * 1e6).round() / 1e6).clamp(0.0, 100.0)
    }

    pub fn score(&self, metrics: &AggregateMetrics) -> QualityReport {
        let components = self.components(metrics);
        let total = self.total(&components);
        let grade = self.policy.grades.grade(total).to_string();
        let recommendations = recommend(metrics, total, &self.policy);

        QualityReport {
            metrics: metrics.clone(),
            violations_by_rule: BTreeMap::new(),
            components,
            total,
            grade,
            recommendations,
            trend: None,
            critical_issues_overridden: false,
        }
    }
}

/// Runs every independent check and orders the results by priority.
pub fn recommend(metrics: &AggregateMetrics, total: f64, policy: &QualityPolicy) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = [
        score_floor_check(total, policy),
        fidelity_check(metrics),
        critical_field_check(metrics, policy),
        coverage_check(metrics, policy),
    ]
    .into_iter()
    .flatten()
    .collect();
    recommendations.sort_by_key(|rec| rec.priority);
    recommendations
}

pub fn score_floor_check(total: f64, policy: &QualityPolicy) -> Option<Recommendation> {
    if total < policy.critical_score {
        Some(Recommendation::new(
            Priority::Critical,
            format!("Quality score ({:.0}) is below critical threshold", total.round()),
            "Review data entry processes immediately",
        ))
    } else if total < policy.warning_score {
        Some(Recommendation::new(
            Priority::High,
            format!("Quality score ({:.0}) is below warning threshold", total.round()),
            "Review recent data entry for recurring errors",
        ))
    } else {
        None
    }
}

pub fn fidelity_check(metrics: &AggregateMetrics) -> Option<Recommendation> {
    let failures = metrics.fidelity_failures();
    (failures > 0).then(|| {
        Recommendation::new(
            Priority::High,
            format!(
                "{failures} website blurbs failed to export ({:.1}% loss)",
                100.0 - metrics.fidelity()
            ),
            "Review blurb processing; every existing blurb must export",
        )
    })
}

pub fn critical_field_check(metrics: &AggregateMetrics, policy: &QualityPolicy) -> Option<Recommendation> {
    (metrics.date_errors > policy.max_critical_field_errors).then(|| {
        Recommendation::new(
            Priority::Critical,
            format!("{} bills have date validation errors", metrics.date_errors),
            "Fix all date validation issues before export",
        )
    })
}

pub fn coverage_check(metrics: &AggregateMetrics, policy: &QualityPolicy) -> Option<Recommendation> {
    (metrics.coverage < policy.min_coverage).then(|| {
        Recommendation::new(
            Priority::Medium,
            format!("Only {} states have bills in the system", metrics.coverage),
            "Verify data imports for missing states",
        )
    })
}
