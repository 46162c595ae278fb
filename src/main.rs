mod control;
mod error;
mod export;
mod models;
mod pacing;
mod scrapers;
mod settings;

use anyhow::Context;
use clap::Parser;
use control::{Controller, ScrapeEvent};
use scrapers::types::MAX_RECORDS_LIMIT;
use scrapers::{ChromeProvider, DriverProvider, Harvester, ScrapeRequest, SnapshotProvider};
use settings::{OutputFormat, ScoutConfig, ScoutConfigLoader, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Collect listing leads for a postal code into a spreadsheet.
#[derive(Debug, Parser)]
#[command(name = "leads-scout", version)]
struct Cli {
    /// Postal code of the area to search
    area_code: String,

    /// Stop after this many listings
    #[arg(short, long, default_value_t = 50,
          value_parser = clap::value_parser!(u32).range(1..=MAX_RECORDS_LIMIT as i64))]
    max: u32,

    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, env = "LEADS_SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Site root the search URL is built on
    #[arg(long)]
    base_url: Option<String>,

    /// Directory for the result file (default: desktop, else current directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Save each visited results page as HTML into this directory
    #[arg(long)]
    capture_dir: Option<PathBuf>,

    /// Re-run extraction over pages saved with --capture-dir instead of a browser
    #[arg(long, conflicts_with = "capture_dir")]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr; the run log is printed on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let request =
        ScrapeRequest::new(cli.area_code.as_str(), cli.max as usize).context("Invalid search")?;
    let sink = export::sink_for(&settings.output);

    info!("🏠 Leads Scout - {} (max {})", request.area_code(), request.max_records());

    match &cli.replay {
        Some(dir) => {
            let provider = SnapshotProvider::from_dir(dir)
                .with_context(|| format!("Failed to read captured pages from {}", dir.display()))?;
            info!("Replaying {} captured pages", provider.page_count());
            drive(Harvester::new(provider, sink, settings.for_replay()), request).await
        }
        None => {
            let provider = ChromeProvider::new(settings.browser.clone());
            drive(Harvester::new(provider, sink, settings), request).await
        }
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<ScoutConfig> {
    let loader = match &cli.config {
        Some(path) => ScoutConfigLoader::new().with_file(path, true),
        None => ScoutConfigLoader::new().with_file(DEFAULT_CONFIG_FILE, false),
    };
    let mut settings = loader.load().context("Failed to load configuration")?;

    if cli.headless {
        settings.browser.headless = true;
    }
    if let Some(url) = &cli.base_url {
        settings.base_url = url.clone();
    }
    if let Some(dir) = &cli.output_dir {
        settings.output.directory = Some(dir.clone());
    }
    if let Some(format) = cli.format {
        settings.output.format = format;
    }
    if let Some(dir) = &cli.capture_dir {
        settings.output.capture_dir = Some(dir.clone());
    }

    Ok(settings)
}

/// Start the run and pump its events to the terminal until it finishes.
/// Ctrl-C asks the run to stop; whatever was collected is still saved.
async fn drive<P: DriverProvider + 'static>(
    harvester: Harvester<P>,
    request: ScrapeRequest,
) -> anyhow::Result<()> {
    let max = request.max_records();
    let controller = Controller::new(harvester);
    let mut handle = controller.start(request).context("Failed to start extraction")?;
    let stop = handle.stop_handle();
    let mut stopping = false;

    let summary = loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(ScrapeEvent::Log(line)) => println!(">> {}", line),
                Some(ScrapeEvent::Progress(count)) => println!("[{}/{}]", count, max),
                Some(ScrapeEvent::Finished(summary)) => break Some(summary),
                None => break None,
            },
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                warn!("Stop requested, wrapping up...");
                stop.request_stop();
            }
        }
    };

    tokio::task::spawn_blocking(move || handle.join()).await?;
    println!(">> Process finished.");

    match summary {
        Some(summary) => {
            info!(
                "Run ended ({:?}): {} records{}",
                summary.reason,
                summary.collected,
                summary
                    .saved_to
                    .map(|p| format!(", saved to {}", p.display()))
                    .unwrap_or_default()
            );
            Ok(())
        }
        None => anyhow::bail!("Extraction worker exited without reporting"),
    }
}
