//! Parallel flow report types

use super::registry::SessionName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of one flow in a parallel run
#[derive(Debug, Clone, Serialize)]
pub struct FlowOutcome {
    /// Position in the submitted flow set (1-indexed)
    pub step: usize,

    /// Session the flow was bound to
    pub session: SessionName,

    pub status: FlowStatus,

    /// How long the flow took to settle
    pub duration: Duration,

    /// Flow output (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Passed,
    Failed,
}

/// Complete report of a parallel run
#[derive(Debug, Clone, Serialize)]
pub struct ParallelReport {
    pub started_at: DateTime<Utc>,

    pub total_flows: usize,

    pub passed: usize,

    pub failed: usize,

    /// Wall-clock time until every flow settled
    pub wall_duration: Duration,

    /// Per-flow outcomes, in submission order
    pub outcomes: Vec<FlowOutcome>,
}

impl ParallelReport {
    pub fn new(total_flows: usize) -> Self {
        Self {
            started_at: Utc::now(),
            total_flows,
            passed: 0,
            failed: 0,
            wall_duration: Duration::from_secs(0),
            outcomes: Vec::with_capacity(total_flows),
        }
    }

    /// Add a flow outcome and update counters
    pub fn add_outcome(&mut self, outcome: FlowOutcome) {
        match outcome.status {
            FlowStatus::Passed => self.passed += 1,
            FlowStatus::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.passed == self.total_flows
    }

    /// First failed flow in submission order
    pub fn first_error(&self) -> Option<&FlowOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.status == FlowStatus::Failed)
    }

    /// Sum of per-flow durations; exceeds `wall_duration` when flows overlapped
    pub fn busy_duration(&self) -> Duration {
        self.outcomes.iter().map(|o| o.duration).sum()
    }
}
