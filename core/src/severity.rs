//! Severity bands for inherent and residual ratings.

use crate::config::SeverityBands;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered least to most severe, so `max()` picks the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low      => "low",
            Severity::Medium   => "medium",
            Severity::High     => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SeverityBands {
    /// Classify a rating (a single `likelihood * impact` or an average of them).
    pub fn classify(&self, rating: f64) -> Severity {
        if rating >= self.critical {
            Severity::Critical
        } else if rating >= self.high {
            Severity::High
        } else if rating >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}
