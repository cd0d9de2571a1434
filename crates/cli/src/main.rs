//! jobscout — search configured sources and ingest the results.
//!
//! Thin composition root: wires config → store → source registry → search
//! graph → ingestion queue and runs one search to completion. Everything
//! interesting lives in the library crates.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use jobscout_core::config::{load_dotenv, Config};
use jobscout_graph::{GraphConfig, SearchGraph, SearchRequest};
use jobscout_queue::{IngestQueue, ProcessOutcome, QueueConfig, QueueEvent};
use jobscout_sources::SourceRegistry;
use jobscout_store::{JobStore, MemoryStore, PgStore};

// ── CLI ─────────────────────────────────────────────────────────────

/// Job posting search and ingestion.
#[derive(Parser, Debug)]
#[command(name = "jobscout", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fan a search out to every configured source and ingest the results.
    Search {
        /// Keywords to search for.
        #[arg(long)]
        keywords: String,
    },
    /// List the configured sources in registration order.
    Sources,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let cli = Cli::parse();
    match cli.command {
        Command::Search { keywords } => run_search(&config, &keywords).await,
        Command::Sources => {
            let registry = SourceRegistry::from_config(&config.sources);
            for (name, _) in registry.iter() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

/// Select the store backend from config: Postgres when configured,
/// in-memory otherwise.
async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn JobStore>> {
    if config.postgres.is_configured() {
        let store = PgStore::connect(&config.postgres)
            .await
            .context("failed to connect to postgres")?;
        store
            .ensure_schema()
            .await
            .context("failed to ensure postgres schema")?;
        Ok(Arc::new(store))
    } else {
        info!("postgres not configured, using in-memory store");
        Ok(Arc::new(MemoryStore::new()))
    }
}

async fn run_search(config: &Config, keywords: &str) -> anyhow::Result<()> {
    let registry = SourceRegistry::from_config(&config.sources);
    if registry.is_empty() {
        bail!("no sources configured — set SOURCES and {{NAME}}_SOURCE_URL");
    }

    let store = build_store(config).await?;
    let graph = SearchGraph::from_registry(
        &registry,
        GraphConfig {
            step_timeout: Duration::from_secs(config.search.step_timeout_secs),
        },
    );

    let outcome = graph
        .invoke(&SearchRequest {
            keywords: keywords.to_string(),
        })
        .await;
    for (source, jobs) in &outcome.per_source {
        println!("{source}: {} records", jobs.len());
    }
    if outcome.all_jobs.is_empty() {
        println!("nothing to ingest");
        return Ok(());
    }

    let queue = IngestQueue::new(store, QueueConfig::from_settings(&config.queue));
    let mut events = queue.subscribe();
    for (source, jobs) in outcome.per_source {
        if !jobs.is_empty() {
            queue.add_jobs(jobs, &source).await;
        }
    }

    let mut saved = 0usize;
    let mut duplicates = 0usize;
    let mut failed = 0usize;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            QueueEvent::JobProcessed { outcome, .. } => match outcome {
                ProcessOutcome::Saved => saved += 1,
                ProcessOutcome::Duplicate => duplicates += 1,
            },
            QueueEvent::JobFailed { .. } => failed += 1,
            QueueEvent::CompanyProcessed { company, .. } => {
                info!(company = %company, "company updated");
            }
            QueueEvent::ProcessingCompleted => break,
            QueueEvent::ProcessingError { error } => {
                bail!("ingestion could not start: {error}");
            }
            QueueEvent::JobsAdded { .. } => {}
        }
    }

    println!("saved {saved}, duplicates {duplicates}, failed {failed}");
    Ok(())
}
