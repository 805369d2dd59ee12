use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use driftfeed::config::Config;
use driftfeed::normalize::{normalize, Kind};
use driftfeed::publish::{FEED_FILE, IMPORTANT_FEED_FILE};
use driftfeed::run::run;

#[derive(Parser, Debug)]
#[command(
    name = "driftfeed",
    version,
    about = "Watch upstream feeds and API specs and publish their changes as RSS"
)]
struct Args {
    /// Configuration file (TOML). Missing file means built-in targets.
    #[arg(long, value_name = "FILE", default_value = "driftfeed.toml")]
    config: PathBuf,

    /// Snapshot and event history file
    #[arg(long, value_name = "FILE", default_value = "state.json")]
    state: PathBuf,

    /// Directory the RSS feeds are written to
    #[arg(long, value_name = "DIR", default_value = "public")]
    out_dir: PathBuf,

    /// Print the canonical form of a local file and exit
    #[arg(long, value_name = "FILE", requires = "kind")]
    normalize: Option<PathBuf>,

    /// Normalization for --normalize: rss_min or openapi_c14n_v1
    #[arg(long, value_name = "KIND")]
    kind: Option<Kind>,
}

/// Canonical form of a local document, for inspecting what a target
/// normalizes to without touching state or the network.
fn normalize_file(path: &Path, kind: Kind, config: &Config) -> Result<String> {
    let resolved = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve input file: {}", path.display()))?;

    let metadata = std::fs::metadata(&resolved)?;
    if !metadata.is_file() {
        anyhow::bail!("Input path must be a regular file");
    }

    let bytes = std::fs::read(&resolved)
        .with_context(|| format!("Failed to read input file: {}", resolved.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(normalize(&text, kind, &config.normalize_options()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --normalize output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from '{}'", args.config.display()))?;

    if let (Some(path), Some(kind)) = (&args.normalize, args.kind) {
        print!("{}", normalize_file(path, kind, &config)?);
        return Ok(());
    }

    tracing::info!(
        targets = config.targets.len(),
        state = %args.state.display(),
        out_dir = %args.out_dir.display(),
        "Starting run"
    );

    let report = run(&config, &args.state, &args.out_dir).await?;

    println!("{report}");
    println!(
        "Wrote {} and {}",
        args.out_dir.join(FEED_FILE).display(),
        args.out_dir.join(IMPORTANT_FEED_FILE).display()
    );
    if report.failed > 0 {
        eprintln!(
            "Warning: {} of {} targets could not be checked (set RUST_LOG=warn for details)",
            report.failed,
            config.targets.len()
        );
    }
    Ok(())
}
