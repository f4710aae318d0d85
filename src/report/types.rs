use std::time::Duration;

use crate::resync::ResourceKind;

/// How a single resource resync ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed(String),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed => write!(f, "COMPLETED"),
            Outcome::Cancelled => write!(f, "CANCELLED"),
            Outcome::Failed(_) => write!(f, "FAILED"),
        }
    }
}

/// Tally for one configured resource.
#[derive(Debug, Clone)]
pub struct ResourceSummary {
    pub kind: ResourceKind,
    /// Organizations named by the resource's selector
    pub organizations: Vec<String>,
    /// Batches yielded before the stream ended
    pub batches: usize,
    /// Records across all yielded batches
    pub records: usize,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

/// Summary of one resync run.
#[derive(Debug)]
pub struct Report {
    pub resources: Vec<ResourceSummary>,
    pub total_records: usize,
    /// False if any resource failed or was cancelled
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Completed.to_string(), "COMPLETED");
        assert_eq!(Outcome::Cancelled.to_string(), "CANCELLED");
        assert_eq!(Outcome::Failed("boom".into()).to_string(), "FAILED");
    }
}
