//! Configuration file parser for `driftfeed.toml`.
//!
//! The config file is optional. A missing file yields `Config::default()`,
//! which watches the built-in targets. Unknown keys are ignored by serde,
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::diff::DEFAULT_DIFF_MAX_LINES;
use crate::feed::FetchOptions;
use crate::normalize::{Kind, NormalizeOptions, DEFAULT_BODY_LIMIT, DEFAULT_MAX_FALLBACK_ITEMS};
use crate::publish::DEFAULT_EXCERPT_LIMIT;
use crate::storage::{Impact, StoreLimits, DEFAULT_MAX_EVENTS};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Duplicate target id: {0}")]
    DuplicateTarget(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// A monitored remote document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    /// Key under which snapshots are stored. Defaults to `url`.
    #[serde(default)]
    pub id: String,
    /// Display name used in feed item titles.
    pub name: String,
    pub url: String,
    pub impact: Impact,
    /// Normalization applied to the fetched document.
    pub normalize: Kind,
}

impl Target {
    pub fn new(name: &str, url: &str, impact: Impact, normalize: Kind) -> Self {
        Self {
            id: url.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            impact,
            normalize,
        }
    }
}

/// Targets watched when the config file names none.
pub fn builtin_targets() -> Vec<Target> {
    vec![
        Target::new(
            "OpenAI Developer Changelog (RSS)",
            "https://developers.openai.com/changelog/rss.xml",
            Impact::High,
            Kind::RssMin,
        ),
        Target::new(
            "OpenAI News (RSS)",
            "https://openai.com/news/rss.xml",
            Impact::Medium,
            Kind::RssMin,
        ),
        Target::new(
            "OpenAI OpenAPI Spec (YAML)",
            "https://app.stainless.com/api/spec/documented/openai/openapi.documented.yml",
            Impact::Breaking,
            Kind::OpenApiC14nV1,
        ),
    ]
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Item bodies in feed snapshots are cut to this many characters.
    pub body_limit: usize,

    /// Cap on `<item>`/`<entry>` blocks read from unparseable feeds.
    pub max_fallback_items: usize,

    /// Diff excerpts in the published feed are cut to this many characters.
    pub excerpt_limit: usize,

    /// Change events kept in the state file, newest first.
    pub max_events: usize,

    /// Diff snippets stored on events are cut to this many lines.
    pub diff_max_lines: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Allow targets on localhost and private networks.
    pub allow_private_hosts: bool,

    /// Channel link of the published feeds. Overrides SITE_URL and
    /// GITHUB_REPOSITORY.
    pub site_url: Option<String>,

    pub feed_title: String,

    pub feed_description: String,

    pub targets: Vec<Target>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
            max_fallback_items: DEFAULT_MAX_FALLBACK_ITEMS,
            excerpt_limit: DEFAULT_EXCERPT_LIMIT,
            max_events: DEFAULT_MAX_EVENTS,
            diff_max_lines: DEFAULT_DIFF_MAX_LINES,
            request_timeout_secs: 30,
            allow_private_hosts: false,
            site_url: None,
            feed_title: "Upstream API changes".to_string(),
            feed_description: "Detected changes in watched feeds and API specifications"
                .to_string(),
            targets: builtin_targets(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    /// - Empty `targets` → built-in targets
    /// - Duplicate target ids → `Err(ConfigError::DuplicateTarget)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            targets = config.targets.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "body_limit",
                "max_fallback_items",
                "excerpt_limit",
                "max_events",
                "diff_max_lines",
                "request_timeout_secs",
                "allow_private_hosts",
                "site_url",
                "feed_title",
                "feed_description",
                "targets",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(content)?;
        config.finalize_targets()?;
        Ok(config)
    }

    fn finalize_targets(&mut self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            self.targets = builtin_targets();
        }

        let mut seen = HashSet::new();
        for target in &mut self.targets {
            target.url = target.url.trim().to_string();
            if target.url.is_empty() {
                return Err(ConfigError::InvalidTarget(format!(
                    "target '{}' has an empty url",
                    target.name
                )));
            }
            if target.id.trim().is_empty() {
                target.id = target.url.clone();
            }
            if !seen.insert(target.id.clone()) {
                return Err(ConfigError::DuplicateTarget(target.id.clone()));
            }
        }
        Ok(())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            body_limit: self.body_limit,
            max_fallback_items: self.max_fallback_items,
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            ..FetchOptions::default()
        }
    }

    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits {
            max_events: self.max_events,
            diff_max_lines: self.diff_max_lines,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
