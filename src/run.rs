//! One monitoring pass over every configured target.
//!
//! Targets are checked one after another. A target that cannot be fetched
//! is logged and counted but never aborts the pass; its stored snapshot is
//! left as it was. State and feeds are written once at the end.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::config::{Config, Target};
use crate::feed::{build_client, fetch_document, FetchError, FetchOptions};
use crate::normalize::{normalize, NormalizeOptions};
use crate::publish::{base_url_from_env, publish, resolve_base_url, ChannelMeta};
use crate::storage::{Observation, StateStore, StoreLimits};
use crate::util::{validate_target_url, HostPolicy, UrlValidationError};

/// Why a single target could not be checked.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Per-pass outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub baseline: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub failed: usize,
}

impl RunReport {
    fn record(&mut self, observation: &Observation) {
        match observation {
            Observation::Baseline => self.baseline += 1,
            Observation::Unchanged => self.unchanged += 1,
            Observation::Changed(_) => self.changed += 1,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "baseline={} unchanged={} changed={} failed={}",
            self.baseline, self.unchanged, self.changed, self.failed
        )
    }
}

/// Everything a target check needs besides the store.
struct CheckContext<'a> {
    client: &'a reqwest::Client,
    fetch: FetchOptions,
    normalize: NormalizeOptions,
    limits: StoreLimits,
    policy: HostPolicy,
    now: DateTime<Utc>,
}

async fn check_target(
    ctx: &CheckContext<'_>,
    store: &mut StateStore,
    target: &Target,
) -> Result<Observation, TargetError> {
    let url = validate_target_url(&target.url, ctx.policy)?;
    let raw = fetch_document(ctx.client, url.as_str(), &ctx.fetch).await?;
    let canonical = normalize(&raw, target.normalize, &ctx.normalize);
    tracing::debug!(
        target = %target.id,
        raw_bytes = raw.len(),
        canonical_bytes = canonical.len(),
        "Normalized"
    );
    Ok(store.observe(target, canonical, ctx.now, &ctx.limits))
}

/// Check every target in `config`, update `store` and return the counts.
///
/// Does not touch the filesystem.
pub async fn check_all(
    config: &Config,
    store: &mut StateStore,
    client: &reqwest::Client,
    now: DateTime<Utc>,
) -> RunReport {
    let ctx = CheckContext {
        client,
        fetch: config.fetch_options(),
        normalize: config.normalize_options(),
        limits: config.store_limits(),
        policy: HostPolicy::from_allow_private(config.allow_private_hosts),
        now,
    };

    let mut report = RunReport::default();
    for target in &config.targets {
        match check_target(&ctx, store, target).await {
            Ok(observation) => report.record(&observation),
            Err(e) => {
                tracing::warn!(
                    target = %target.id,
                    url = %target.url,
                    error = %e,
                    "Target check failed"
                );
                report.failed += 1;
            }
        }
    }
    report
}

/// Channel metadata for the published feeds.
pub fn channel_meta(config: &Config, now: DateTime<Utc>) -> ChannelMeta {
    let link = match config.site_url.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(site) => resolve_base_url(Some(site), None),
        None => base_url_from_env(),
    };
    ChannelMeta {
        title: config.feed_title.clone(),
        link,
        description: config.feed_description.clone(),
        last_build_date: now,
    }
}

/// Full pass: load state, check targets, save state, publish feeds.
pub async fn run(config: &Config, state_path: &Path, out_dir: &Path) -> Result<RunReport> {
    let now = Utc::now();

    let mut store = StateStore::load(state_path)
        .with_context(|| format!("Failed to load state from '{}'", state_path.display()))?;
    let client = build_client(&config.fetch_options()).context("Failed to build HTTP client")?;

    let report = check_all(config, &mut store, &client, now).await;

    store
        .save(state_path)
        .with_context(|| format!("Failed to save state to '{}'", state_path.display()))?;
    publish(
        out_dir,
        &channel_meta(config, now),
        store.events(),
        config.excerpt_limit,
    )
    .with_context(|| format!("Failed to publish feeds to '{}'", out_dir.display()))?;

    tracing::info!(
        baseline = report.baseline,
        unchanged = report.unchanged,
        changed = report.changed,
        failed = report.failed,
        "Run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Kind;
    use crate::storage::Impact;

    #[test]
    fn test_report_display() {
        let report = RunReport {
            baseline: 1,
            unchanged: 2,
            changed: 3,
            failed: 4,
        };
        assert_eq!(report.to_string(), "baseline=1 unchanged=2 changed=3 failed=4");
    }

    #[test]
    fn test_channel_meta_prefers_config_site_url() {
        let config = Config {
            site_url: Some("https://feeds.example.com".into()),
            feed_title: "T".into(),
            ..Config::default()
        };
        let meta = channel_meta(&config, Utc::now());
        assert_eq!(meta.link, "https://feeds.example.com/");
        assert_eq!(meta.title, "T");
    }

    #[tokio::test]
    async fn test_private_target_rejected_without_opt_in() {
        let config = Config {
            targets: vec![Target::new(
                "local",
                "http://127.0.0.1:9/rss.xml",
                Impact::Low,
                Kind::RssMin,
            )],
            ..Config::default()
        };
        let mut store = StateStore::default();
        let client = reqwest::Client::new();

        let report = check_all(&config, &mut store, &client, Utc::now()).await;
        assert_eq!(report.failed, 1);
        assert!(store.targets.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_scheme_counts_as_failure() {
        let config = Config {
            allow_private_hosts: true,
            targets: vec![Target::new(
                "ftp",
                "ftp://example.com/feed.xml",
                Impact::Low,
                Kind::RssMin,
            )],
            ..Config::default()
        };
        let mut store = StateStore::default();
        let report = check_all(&config, &mut store, &reqwest::Client::new(), Utc::now()).await;
        assert_eq!(report, RunReport { failed: 1, ..RunReport::default() });
    }
}
