//! Core types for declarative rule application

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit status used when a process ended without reporting one
/// (lost connection, killed by a signal).
pub const EXIT_MISSING: i32 = -1;

/// Result of a single command run on a target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Standard output, sudo prompt scrubbed and outer newline trimmed
    pub stdout: String,
    /// Standard error, scrubbed the same way as stdout
    pub stderr: String,
    /// Process exit code, or [`EXIT_MISSING`]
    pub exit_status: i32,
}

impl Response {
    /// Check if the command exited with status zero
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Check if the process never reported an exit status
    pub fn exit_missing(&self) -> bool {
        self.exit_status == EXIT_MISSING
    }
}

/// Terminal outcome of applying a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Desired state already held, nothing was changed
    Satisfied,
    /// Desired state did not hold and was brought to hold
    Applied,
    /// Checking or ensuring returned an error
    Failed,
}

impl Status {
    /// Check if the status represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed)
    }

    /// Check if the target was changed
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Satisfied => "satisfied",
            Self::Applied => "applied",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a composite rule does when one of its children fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed child; later children are not attempted
    #[default]
    FailFast,
    /// Attempt every child, then fail with the first child error
    Continue,
}

/// Summary of statuses across many applies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplySummary {
    pub satisfied: usize,
    pub applied: usize,
    pub failed: usize,
}

impl ApplySummary {
    /// Check if every apply succeeded
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of applies counted
    pub fn total(&self) -> usize {
        self.satisfied + self.applied + self.failed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ApplySummary) {
        self.satisfied += other.satisfied;
        self.applied += other.applied;
        self.failed += other.failed;
    }

    /// Add a status to the summary
    pub fn add(&mut self, status: Status) {
        match status {
            Status::Satisfied => self.satisfied += 1,
            Status::Applied => self.applied += 1,
            Status::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_exit() {
        let ok = Response {
            exit_status: 0,
            ..Default::default()
        };
        assert!(ok.success());
        assert!(!ok.exit_missing());

        let lost = Response {
            exit_status: EXIT_MISSING,
            ..Default::default()
        };
        assert!(!lost.success());
        assert!(lost.exit_missing());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Satisfied.to_string(), "satisfied");
        assert_eq!(Status::Applied.to_string(), "applied");
        assert_eq!(Status::Failed.to_string(), "failed");
        assert!(Status::Applied.is_change());
        assert!(!Status::Failed.is_success());
    }

    #[test]
    fn test_summary_merge() {
        let mut a = ApplySummary::default();
        a.add(Status::Applied);
        a.add(Status::Satisfied);

        let mut b = ApplySummary::default();
        b.add(Status::Failed);

        a.merge(&b);
        assert_eq!(a.total(), 3);
        assert!(!a.is_success());
    }
}
