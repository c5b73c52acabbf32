mod duplicates;
pub mod rules;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::store::{Record, RecordId};

pub use duplicates::{DuplicateEntry, DuplicateIndex};

type Check = Arc<dyn Fn(&Record) -> Result<(), String> + Send + Sync>;

/// Named predicate over one record. A failing check returns the reason.
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    pub critical: bool,
    check: Check,
}

impl Rule {
    pub fn new<F>(name: impl Into<String>, critical: bool, check: F) -> Self
    where
        F: Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            critical,
            check: Arc::new(check),
        }
    }

    /// Downgrade to a warning: failures are reported but keep the record valid.
    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    /// Rewrites the failure detail, e.g. to prefix it for operator output.
    pub fn map_detail<F>(self, map: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        let check = self.check;
        Self {
            name: self.name,
            critical: self.critical,
            check: Arc::new(move |record: &Record| check(record).map_err(&map)),
        }
    }

    pub fn evaluate(&self, record: &Record) -> Result<(), String> {
        (self.check)(record)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("critical", &self.critical)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFailure {
    pub rule: String,
    pub critical: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub record_id: RecordId,
    pub failures: Vec<RuleFailure>,
    /// True when no critical rule failed; non-critical failures are warnings.
    pub valid: bool,
}

impl ValidationResult {
    pub fn failed_rules(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|failure| failure.rule.as_str())
            .collect()
    }

    pub fn failed(&self, rule: &str) -> bool {
        self.failures.iter().any(|failure| failure.rule == rule)
    }

    /// Critical failure details joined for a rejection reason.
    pub fn reason(&self) -> String {
        self.failures
            .iter()
            .filter(|failure| failure.critical)
            .map(|failure| failure.detail.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Ordered rule set. Every rule runs on every record.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: Vec<Rule>,
}

impl Validator {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn validate(&self, record: &Record) -> ValidationResult {
        let failures: Vec<RuleFailure> = self
            .rules
            .iter()
            .filter_map(|rule| {
                rule.evaluate(record).err().map(|detail| RuleFailure {
                    rule: rule.name.clone(),
                    critical: rule.critical,
                    detail,
                })
            })
            .collect();
        let valid = !failures.iter().any(|failure| failure.critical);

        ValidationResult {
            record_id: record.id.clone(),
            failures,
            valid,
        }
    }

    pub fn validate_all(&self, records: &[Record]) -> ValidationTally {
        let mut tally = ValidationTally::default();
        for record in records {
            tally.add(&self.validate(record));
        }
        tally
    }
}

/// Aggregate of many validation results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationTally {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub violations_by_rule: BTreeMap<String, usize>,
}

impl ValidationTally {
    pub fn add(&mut self, result: &ValidationResult) {
        self.total += 1;
        if result.valid {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }
        for failure in &result.failures {
            *self
                .violations_by_rule
                .entry(failure.rule.clone())
                .or_default() += 1;
        }
    }

    pub fn violations(&self, rule: &str) -> usize {
        self.violations_by_rule.get(rule).copied().unwrap_or(0)
    }
}
