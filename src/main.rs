mod dataset;
mod fetch;
mod identity;
mod model;
mod normalize;
mod parser;
mod pipeline;
mod settings;
mod sources;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::fetch::Fetcher;
use crate::pipeline::{RunSummary, SourceBatch};
use crate::settings::Settings;
use crate::sources::{FetchedPage, RawRecordSource};

#[derive(Parser)]
#[command(name = "hkacadjobs", about = "Hong Kong university academic jobs aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every configured source and rewrite the dataset
    Run {
        /// Harvest a single university (key or id prefix)
        #[arg(short, long)]
        uni: Option<String>,
        /// Dataset path (default: settings `output`)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run as if today were this date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
        /// Drop postings whose deadline passed more than N days ago
        #[arg(long)]
        retention_days: Option<u64>,
        /// Read saved page dumps from this directory instead of fetching
        #[arg(long)]
        offline_dir: Option<PathBuf>,
    },
    /// Parse saved listing pages with one source and print the records as CSV
    Extract {
        #[arg(short, long)]
        uni: String,
        /// Saved page markdown, one file per listing page, or saved `.json`
        /// answers for sources with an API feed
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        today: Option<String>,
    },
    /// Summarize an existing dataset
    Stats {
        /// Dataset path (default: settings `output`)
        path: Option<PathBuf>,
        #[arg(long)]
        today: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    match cli.command {
        Commands::Run { uni, output, today, retention_days, offline_dir } => {
            let today = resolve_today(today.as_deref())?;
            if let Some(output) = output {
                settings.output = output;
            }
            if let Some(days) = retention_days {
                settings.retention_days = days;
            }
            if offline_dir.is_some() {
                settings.offline_dir = offline_dir;
            }
            if let Some(uni) = uni {
                let Some(u) = model::university(&uni) else {
                    bail!("Unknown university {:?}", uni);
                };
                settings.sources = vec![u.key.to_string()];
            }
            let summary = harvest(&settings, today).await?;
            println!("\nWrote {:?} in {:.1}s", settings.output, t0.elapsed().as_secs_f64());
            summary.print();
        }
        Commands::Extract { uni, files, today } => {
            let today = resolve_today(today.as_deref())?;
            let Some(source) = sources::source_for(&uni) else {
                bail!("No source for {:?}", uni);
            };
            extract(source.as_ref(), &files, today)?;
        }
        Commands::Stats { path, today } => {
            let today = resolve_today(today.as_deref())?;
            let path = path.unwrap_or(settings.output);
            let rows = dataset::load_rows(&path)?;
            println!("Dataset: {:?}\n", path);
            RunSummary::tally(
                rows.iter()
                    .filter(|r| !r.id.is_empty())
                    .map(|r| (r.deadline.as_str(), r.is_new.eq_ignore_ascii_case("true"))),
                today,
            )
            .print();
        }
    }

    Ok(())
}

fn resolve_today(arg: Option<&str>) -> Result<NaiveDate> {
    match arg {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid --today {:?}, expected YYYY-MM-DD", s)),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Fetch and parse every configured source in order, then run the pipeline
/// against the previous dataset and overwrite it.
async fn harvest(settings: &Settings, today: NaiveDate) -> Result<RunSummary> {
    let previous = dataset::load_snapshot(&settings.output);

    let fetcher = Arc::new(match &settings.offline_dir {
        Some(dir) => Fetcher::dir(dir),
        None => Fetcher::spider(settings.spider_api_key.clone(), settings.max_retries)
            .context("Cannot fetch listings")?,
    });

    let selected: Vec<Box<dyn RawRecordSource>> = settings
        .sources
        .iter()
        .filter_map(|key| {
            let source = sources::source_for(key);
            if source.is_none() {
                info!(university = %key, "no listing source, skipping");
            }
            source
        })
        .collect();

    let total: usize = selected.iter().map(|s| s.listings().len()).sum();
    println!("Harvesting {} sources ({} listing pages)...", selected.len(), total);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut batches = Vec::with_capacity(selected.len());
    for source in &selected {
        pb.set_message(source.university().short_name);
        let records =
            sources::produce(source.as_ref(), Arc::clone(&fetcher), settings.concurrency, &pb).await;
        batches.push(SourceBatch { university: source.university(), records });
    }
    pb.finish_and_clear();

    let records = pipeline::run(&batches, &previous, today, settings.retention_days);
    dataset::write_file(&settings.output, &records)?;
    Ok(RunSummary::of(&records, today))
}

/// Parse saved pages as if each were the source's first listing. With
/// `.json` files the source's feed parser reads their `items` instead.
fn extract(source: &dyn RawRecordSource, files: &[PathBuf], today: NaiveDate) -> Result<()> {
    let listing = source
        .listings()
        .into_iter()
        .next()
        .context("Source has no listings")?;

    let texts = files
        .iter()
        .map(|path| {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
        })
        .collect::<Result<Vec<_>>>()?;

    let is_json = files.iter().all(|p| p.extension().is_some_and(|e| e == "json"));
    let raw = if is_json && source.feed().is_some() {
        let mut items = Vec::new();
        for (text, path) in texts.iter().zip(files) {
            let page: serde_json::Value = serde_json::from_str(text)
                .with_context(|| format!("Invalid JSON in {:?}", path))?;
            if let Some(batch) = page.get("items").and_then(|v| v.as_array()) {
                items.extend(batch.iter().cloned());
            }
        }
        source.parse_feed(&items)
    } else {
        let pages: Vec<_> = texts
            .into_iter()
            .map(|markdown| FetchedPage { listing: listing.clone(), markdown })
            .collect();
        source.parse(&pages)
    };

    let uni = source.university();
    let records: Vec<_> = raw
        .iter()
        .filter_map(|raw| normalize::canonicalize(uni, raw, today))
        .collect();
    info!(university = uni.code, records = records.len(), "extracted");

    dataset::write_csv(std::io::stdout().lock(), &records)
}
