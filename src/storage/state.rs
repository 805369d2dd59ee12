//! JSON snapshot store: last canonical form per target plus change history.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use super::types::{ChangeEvent, Observation, Snapshot, StateError};
use crate::config::Target;
use crate::diff::{diff_snippet, DEFAULT_DIFF_MAX_LINES};
use crate::util::atomic_write;

/// Default number of change events retained.
pub const DEFAULT_MAX_EVENTS: usize = 200;

/// Bounds applied when recording a change.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub max_events: usize,
    pub diff_max_lines: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            diff_max_lines: DEFAULT_DIFF_MAX_LINES,
        }
    }
}

/// Persistent state of the monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStore {
    #[serde(default)]
    pub targets: BTreeMap<String, Snapshot>,
    /// Newest first.
    #[serde(default)]
    pub events: Vec<ChangeEvent>,
}

impl StateStore {
    /// Maximum state file size (64 MB).
    const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

    /// Load the store from `path`.
    ///
    /// A missing or blank file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(StateError::TooLarge(format!(
                    "State file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No state file found, starting empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(StateError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let store: StateStore = serde_json::from_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            targets = store.targets.len(),
            events = store.events.len(),
            "Loaded state"
        );
        Ok(store)
    }

    /// Write the store to `path` as pretty JSON, atomically.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        atomic_write(path, json.as_bytes()).map_err(|e| StateError::Write(format!("{e:#}")))
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn snapshot(&self, target_id: &str) -> Option<&Snapshot> {
        self.targets.get(target_id)
    }

    /// Compare `canonical` with the stored snapshot of `target` and record
    /// the result.
    ///
    /// The snapshot is replaced in every case. A difference also pushes a
    /// [`ChangeEvent`] to the front of the history, which is then cut to
    /// `limits.max_events`.
    pub fn observe(
        &mut self,
        target: &Target,
        canonical: String,
        now: DateTime<Utc>,
        limits: &StoreLimits,
    ) -> Observation {
        let sha256 = sha256_hex(&canonical);
        let checked_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);

        let observation = match self.targets.get(&target.id) {
            None => {
                tracing::info!(target = %target.id, "Baseline stored");
                Observation::Baseline
            }
            Some(previous) if previous.sha256 == sha256 => Observation::Unchanged,
            Some(previous) => Observation::Changed(ChangeEvent {
                id: sha256_hex(&format!("{}|{}", target.id, sha256)),
                impact: target.impact,
                name: target.name.clone(),
                url: target.url.clone(),
                snippet: diff_snippet(&previous.canonical, &canonical, limits.diff_max_lines),
                summary_ja: None,
                pub_date: Some(now.to_rfc2822()),
            }),
        };

        self.targets.insert(
            target.id.clone(),
            Snapshot {
                canonical,
                sha256,
                checked_at,
            },
        );

        if let Observation::Changed(event) = &observation {
            tracing::info!(
                target = %target.id,
                impact = %target.impact,
                event = %event.id,
                "Change detected"
            );
            self.events.insert(0, event.clone());
            self.events.truncate(limits.max_events);
        }

        observation
    }
}

fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
