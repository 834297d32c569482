//! Clientside-Crawler main entry point
//!
//! This is the command-line interface for the client-side security crawler.

use anyhow::Context;
use clap::Parser;
use clientside_crawler::config::{load_config_with_hash, Config};
use clientside_crawler::{Orchestrator, SiteRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Clientside-Crawler: archives the client-side surface of a site
///
/// Crawls each site in the inclusive id range, rendering every page in an
/// instrumented Chromium, and writes per-URL artifacts (rendered DOM,
/// scripts, captured XHR/form events) plus a navigation graph.
#[derive(Parser, Debug)]
#[command(name = "crawl")]
#[command(version = "1.0.0")]
#[command(about = "A crawler for client-side security research", long_about = None)]
struct Cli {
    /// First site id to crawl
    #[arg(value_name = "SITE_ID")]
    site_id: u32,

    /// Last site id to crawl (inclusive); defaults to SITE_ID
    #[arg(value_name = "SITE_ID_HIGH")]
    site_id_high: Option<u32>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "crawler.toml")]
    config: PathBuf,

    /// Login state to crawl under (default: the site's first state)
    #[arg(long, value_name = "LABEL")]
    state: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let low = cli.site_id;
    let high = cli.site_id_high.unwrap_or(low);
    anyhow::ensure!(low <= high, "SITE_ID_HIGH ({}) is below SITE_ID ({})", high, low);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let orchestrator = Orchestrator::new(config, config_hash)?;

    if cli.dry_run {
        handle_dry_run(orchestrator.config(), orchestrator.sites(), low, high)?;
        return Ok(());
    }

    let summaries = orchestrator
        .run_range(low, high, cli.state.as_deref())
        .await?;

    for summary in &summaries {
        tracing::info!(
            "Site {} [{}]: {} visited, {} edges, ended by {}",
            summary.site_id,
            summary.label,
            summary.visited,
            summary.edges,
            summary.termination
        );
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("clientside_crawler=info,warn"),
            1 => EnvFilter::new("clientside_crawler=debug,info"),
            2 => EnvFilter::new("clientside_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(
    config: &Config,
    sites: &SiteRegistry,
    low: u32,
    high: u32,
) -> anyhow::Result<()> {
    println!("=== Clientside-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max URLs: {}", config.crawler.max_urls);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max per depth: {}", config.crawler.max_per_depth);
    println!(
        "  Waits: page load {}s, XHR read {}s",
        config.crawler.page_load_wait, config.crawler.xhr_read_wait
    );
    println!("  Timeout: {}s", config.crawler.timeout);
    println!("  Session rebuilds per URL: {}", config.crawler.rebuild_attempts);

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    println!("  Extensions: {}", config.browser.extensions_dir);
    println!("  State scripts: {}", config.browser.use_state_scripts);

    println!("\nOutput:");
    println!("  Root: {}", config.output.root);
    println!("  Beautify scripts: {}", config.output.beautify_scripts);

    let selected = sites.resolve_range(low, high)?;
    println!("\nSites ({}):", selected.len());
    for site in &selected {
        println!("  - [{}] {} ({})", site.id, site.name, site.seed_url);
        let entry = config.sites.iter().find(|s| s.id == site.id);
        for state in entry.map(|e| e.states.as_slice()).unwrap_or(&[]) {
            println!("    * state {}", state.label);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} site(s)", selected.len());

    Ok(())
}
