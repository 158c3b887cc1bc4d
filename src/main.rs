use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use researchmap_export::{Client, DEFAULT_OUTPUT, Format, Listing, QueryParams, Snapshot, export};

#[derive(Parser, Debug)]
#[command(name = "researchmap-export")]
#[command(about = "Export papers, research projects and awards from researchmap to JSON")]
#[command(version)]
struct Cli {
    /// Base API URL (default: https://api.researchmap.jp)
    #[arg(long)]
    url: Option<String>,

    /// Researcher permalink
    #[arg(long)]
    permalink: Option<String>,

    /// Output file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Query parameter override applied to every request, e.g. `from_date=2015`
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Request timeout in seconds (no timeout when unset)
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Hide the request spinner
    #[arg(long)]
    no_progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Format a saved snapshot as a publication listing
    Render {
        /// Snapshot to read
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        input: PathBuf,

        /// Listing format
        #[arg(short, long, value_enum, default_value_t = Format::Markdown)]
        format: Format,

        /// Write the listing here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    QueryParams::parse_pair(raw).map_err(|e| e.to_string())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_level(false),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Some(Command::Render {
        input,
        format,
        output,
    }) = &cli.command
    {
        return render(input, *format, output.as_deref());
    }

    let verify = cli.insecure.then_some(false);
    let mut client = Client::new(cli.url, cli.permalink, verify)?.with_progress(!cli.no_progress);
    if let Some(secs) = cli.timeout {
        client = client.with_timeout(Duration::from_secs(secs))?;
    }

    tracing::debug!(
        url = client.base_url(),
        permalink = client.permalink(),
        "starting export"
    );

    let overrides: QueryParams = cli.params.into_iter().collect();
    export(&client, &overrides, &cli.output)?;
    Ok(())
}

fn render(input: &Path, format: Format, output: Option<&Path>) -> Result<()> {
    let snapshot = Snapshot::load(input)?;
    let listing = Listing::from_snapshot(&snapshot);
    tracing::debug!(
        selected = listing.selected.len(),
        recent = listing.recent.len(),
        grants = listing.grants.len(),
        awards = listing.awards.len(),
        "rendering listing"
    );

    let text = listing.render(format);
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("saved: {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
