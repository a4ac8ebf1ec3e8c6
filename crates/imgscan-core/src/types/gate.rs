//! Gate evaluation results.

use serde::{Deserialize, Serialize};

/// One triggered condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub trigger: String,
    pub detail: String,
}

impl Finding {
    pub fn new(trigger: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            detail: detail.into(),
        }
    }
}

/// Ordered findings for one (image, gate) pair, rebuilt on every evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: String,
    pub findings: Vec<Finding>,
    /// Unix seconds of the evaluation.
    pub evaluated_at: i64,
}

impl GateResult {
    pub fn is_triggered(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Findings produced by one trigger, in order.
    pub fn findings_for<'a>(&'a self, trigger: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.trigger == trigger)
    }
}
