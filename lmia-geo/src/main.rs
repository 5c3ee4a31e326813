//! LMIA geocoder (lmia-geocoder) - Main entry point
//!
//! Command-line front end for the postal-code geocoder: single lookups,
//! report annotation, store initialization and statistics.
//!
//! Logs go to stderr; stdout carries lookup results and annotated CSV.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lmia_common::config::{load_or_default, write_toml_config};
use lmia_geo::annotate::{annotate_report, lookup_and_record, run_summary, AnnotateOptions};
use lmia_geo::config::{resolve_settings, CliOverrides, GeocoderSettings};
use lmia_geo::{BogonStore, GeocodeOrchestrator, LocationCache, PostalCode};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lmia-geocoder
#[derive(Parser, Debug)]
#[command(name = "lmia-geocoder")]
#[command(about = "Geocode Canadian postal codes for LMIA employer records")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(long, global = true, env = "LMIA_CONFIG")]
    config: Option<PathBuf>,

    /// Location cache file (semicolon-delimited)
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,

    /// Bogon list file
    #[arg(long, global = true)]
    bogon_file: Option<PathBuf>,

    /// Try a premium provider first
    #[arg(long, global = true)]
    turbo: bool,

    /// Delay after every provider call, replacing per-provider pacing
    #[arg(long, global = true)]
    pacing_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create empty cache and bogon files
    Init {
        /// Also write the effective settings to this TOML file
        #[arg(long)]
        write_config: Option<PathBuf>,
    },

    /// Resolve one postal code or address, printing "lat,lon"
    Lookup {
        /// Postal code or full address
        input: String,

        /// Sample address stored with a fresh cache row
        #[arg(long)]
        address: Option<String>,

        /// Sample employer stored with a fresh cache row
        #[arg(long)]
        employer: Option<String>,
    },

    /// Append postal_code,latitude,longitude columns to a CSV report
    Annotate {
        #[arg(long)]
        input: PathBuf,

        /// Defaults to stdout
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        address_column: String,

        #[arg(long)]
        employer_column: Option<String>,
    },

    /// Print cache and bogon statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Remove a postal code from the bogon list
    Forgive { code: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing (stderr keeps stdout clean for results)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let overrides = CliOverrides {
        cache_file: args.cache_file.clone(),
        bogon_file: args.bogon_file.clone(),
        pacing_ms: args.pacing_ms,
        turbo: args.turbo,
    };
    let settings =
        resolve_settings(&toml_config, &overrides).context("Failed to resolve settings")?;

    info!(
        cache_file = %settings.cache_file.display(),
        bogon_file = %settings.bogon_file.display(),
        turbo = settings.turbo,
        "Starting lmia-geocoder"
    );

    match args.command {
        Command::Init { write_config } => init(&settings, write_config),
        Command::Lookup {
            input,
            address,
            employer,
        } => lookup(&settings, &input, address.as_deref(), employer.as_deref()).await,
        Command::Annotate {
            input,
            output,
            address_column,
            employer_column,
        } => {
            let options = AnnotateOptions {
                address_column,
                employer_column,
            };
            annotate(&settings, input, output, &options).await
        }
        Command::Stats { json } => stats(&settings, json),
        Command::Forgive { code } => forgive(&settings, &code),
    }
}

fn init(settings: &GeocoderSettings, write_config: Option<PathBuf>) -> Result<()> {
    LocationCache::open(&settings.cache_file)
        .and_then(|cache| cache.initialize())
        .context("Failed to initialize location cache")?;
    BogonStore::open(&settings.bogon_file)
        .and_then(|bogons| bogons.initialize())
        .context("Failed to initialize bogon list")?;

    if let Some(path) = write_config {
        write_toml_config(&settings.to_toml_config(), &path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        info!("Wrote configuration to {}", path.display());
    }

    info!("Stores initialized");
    Ok(())
}

async fn lookup(
    settings: &GeocoderSettings,
    input: &str,
    address: Option<&str>,
    employer: Option<&str>,
) -> Result<()> {
    let orchestrator =
        GeocodeOrchestrator::from_settings(settings).context("Failed to open geocoder")?;

    let resolution = lookup_and_record(&orchestrator, input, address, employer)
        .await
        .context("Lookup failed")?;

    println!("{}", resolution.result.to_field_pair());
    eprintln!("{}", run_summary(&orchestrator));

    info!(
        postal_code = resolution.postal_code.as_ref().map(|c| c.as_str()).unwrap_or(""),
        provider = resolution.result.provider().unwrap_or("none"),
        "Lookup complete"
    );
    Ok(())
}

async fn annotate(
    settings: &GeocoderSettings,
    input: PathBuf,
    output: Option<PathBuf>,
    options: &AnnotateOptions,
) -> Result<()> {
    let started = chrono::Utc::now();
    let orchestrator =
        GeocodeOrchestrator::from_settings(settings).context("Failed to open geocoder")?;

    let reader = BufReader::new(
        File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?,
    );

    let summary = match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            annotate_report(&orchestrator, reader, BufWriter::new(file), options).await
        }
        None => annotate_report(&orchestrator, reader, io::stdout().lock(), options).await,
    }
    .context("Annotation failed")?;

    let elapsed = chrono::Utc::now() - started;
    eprintln!("{}", summary.display_string());
    eprintln!("{}", run_summary(&orchestrator));
    info!(elapsed_secs = elapsed.num_seconds(), "Annotation run complete");
    Ok(())
}

fn stats(settings: &GeocoderSettings, json: bool) -> Result<()> {
    let orchestrator =
        GeocodeOrchestrator::from_settings(settings).context("Failed to open geocoder")?;
    let snapshot = orchestrator.stats_snapshot();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize stats")?
        );
    } else {
        println!("{}", snapshot.display_string());
    }
    Ok(())
}

fn forgive(settings: &GeocoderSettings, code: &str) -> Result<()> {
    let Some(code) = PostalCode::parse(code) else {
        bail!("'{}' is not a Canadian postal code", code);
    };

    let bogons = BogonStore::open(&settings.bogon_file).context("Failed to open bogon list")?;
    if bogons.forgive(&code).context("Failed to rewrite bogon list")? {
        info!(postal_code = %code, "Removed from bogon list");
    } else {
        info!(postal_code = %code, "Not on the bogon list");
    }
    Ok(())
}
