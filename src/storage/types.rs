use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from loading or saving the snapshot store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in state file: {0}")]
    Parse(#[from] serde_json::Error),

    /// State file exceeds the maximum allowed size.
    #[error("State file too large: {0}")]
    TooLarge(String),

    #[error("Failed to write state file: {0}")]
    Write(String),
}

// ============================================================================
// Impact
// ============================================================================

/// How disruptive a change to a target is expected to be.
///
/// Declared per target in configuration and copied onto every change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Impact {
    Breaking,
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Breaking => "Breaking",
            Impact::High => "High",
            Impact::Medium => "Medium",
            Impact::Low => "Low",
        }
    }

    /// Breaking and High changes go into the important-only feed.
    pub fn is_important(&self) -> bool {
        matches!(self, Impact::Breaking | Impact::High)
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Snapshots and Events
// ============================================================================

/// Last canonical form seen for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub canonical: String,
    /// Hex SHA-256 of `canonical`.
    pub sha256: String,
    /// RFC 3339 timestamp of the check that stored this snapshot.
    pub checked_at: String,
}

/// A detected difference between two snapshots of the same target.
///
/// Serialized with the field names the feed history uses (`pubDate`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub impact: Impact,
    pub name: String,
    pub url: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_ja: Option<String>,
    #[serde(rename = "pubDate", default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
}

/// Outcome of comparing a fresh canonical form with the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// First time the target was seen; stored without an event.
    Baseline,
    /// Canonical form identical to the stored one.
    Unchanged,
    /// Canonical form differs; the event has been recorded.
    Changed(ChangeEvent),
}
