//! Verdict categories and the run summary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sample failures kept for display.
pub const MAX_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictCategory {
    /// Current outcome equals the reference outcome
    Passed,
    /// Current outcome differs from the reference outcome
    Mismatch,
    /// Reference id never produced a result in the current run
    Missing,
}

impl VerdictCategory {
    pub fn label(&self) -> &'static str {
        match self {
            VerdictCategory::Passed => "Passed",
            VerdictCategory::Mismatch => "Mismatch",
            VerdictCategory::Missing => "Missing",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, VerdictCategory::Passed)
    }
}

impl std::fmt::Display for VerdictCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionSample {
    pub record_id: String,
    pub category: VerdictCategory,
    pub detail: String,
}

/// Totals for one comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Reference rows compared (one verdict each)
    pub total: usize,
    pub by_category: HashMap<VerdictCategory, usize>,
    /// Pass rate (0.0 - 1.0); 1.0 for an empty reference
    pub pass_rate: f32,
    /// First failures in reference order, at most `MAX_SAMPLES`
    pub samples: Vec<RegressionSample>,
}

impl RegressionReport {
    pub fn new() -> Self {
        Self {
            pass_rate: 1.0,
            ..Default::default()
        }
    }

    pub fn record(&mut self, record_id: &str, category: VerdictCategory, detail: &str) {
        self.total += 1;
        *self.by_category.entry(category).or_insert(0) += 1;

        if category.is_failure() && self.samples.len() < MAX_SAMPLES {
            self.samples.push(RegressionSample {
                record_id: record_id.to_string(),
                category,
                detail: detail.to_string(),
            });
        }

        self.pass_rate = self.passed() as f32 / self.total as f32;
    }

    pub fn count(&self, category: VerdictCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn passed(&self) -> usize {
        self.count(VerdictCategory::Passed)
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}
