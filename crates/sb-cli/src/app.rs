//! One `spinbook` invocation: configure, run, publish

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};

use sb_core::plan;
use sb_engine::{LogObserver, ObserverSet, Orchestrator, ProgressObserver, ReportSummary, RunReport};
use sb_output::{FileWriter, RunManifest, publish};

use crate::cli::Cli;
use crate::config::SimConfig;
use crate::registry::KernelRegistry;

/// What a successful invocation produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: ReportSummary,
    /// Merged book file, unless publishing was turned off
    pub published: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
}

/// Run the simulation described by `cli` with the games in `registry`
///
/// Errors on invalid input, unknown games, and on any failed or cancelled
/// worker; failing batches are printed to stderr first.
pub fn run(cli: &Cli, registry: &KernelRegistry) -> Result<RunSummary> {
    let start = Instant::now();
    let request = cli.request();
    request.validate().context("Invalid simulation parameters")?;

    let config = SimConfig::load(&cli.game, &cli.mode, cli.config.as_deref())
        .context("Failed to load config")?;
    let factory = registry.factory(&config)?;
    config.ensure_dirs()?;

    println!("Starting simulations for game: {}, mode: {}", cli.game, cli.mode);
    println!(
        "Simulations: {}, Threads: {}, Batch: {}",
        request.num_sims, request.thread_count, request.batch_size
    );

    let writer = FileWriter::new(&config.books_dir).with_level(config.compression_level);
    let progress = Arc::new(ProgressObserver::new());
    let observers = ObserverSet::new()
        .with(Arc::new(
            LogObserver::new().with_progress_every(config.progress_every),
        ))
        .with(progress.clone());

    let orchestrator = Orchestrator::new()
        .with_observer(Arc::new(observers))
        .with_fail_fast(cli.fail_fast)
        .with_resume(cli.resume);
    let report = orchestrator
        .run(&request, &factory, &writer)
        .context("Simulation could not start")?;

    let summary = report.summary();
    if let Some(path) = &cli.report {
        fs::write(path, summary.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    if !report.succeeded {
        print_failures(&report);
        bail!(
            "Simulation failed: {} of {} threads failed, {} cancelled ({} trials written)",
            report.failures.len(),
            report.thread_count(),
            report.cancelled.len(),
            progress.trials_done()
        );
    }

    let mut published = None;
    let mut manifest = None;
    if !cli.no_publish {
        let plan = plan(&request)?;
        let books = publish(&writer, &request, &plan, &config.publish_dir)
            .context("Failed to publish books")?;
        let path = RunManifest::new(&request, &plan, &writer, report.elapsed)
            .with_published(&books.path)
            .write_to(&config.publish_dir)
            .context("Failed to write manifest")?;
        published = Some(books.path);
        manifest = Some(path);
    }

    let elapsed = start.elapsed();
    println!(
        "\nSimulations completed in {:.2} seconds ({:.2} minutes)",
        elapsed.as_secs_f64(),
        elapsed.as_secs_f64() / 60.0
    );

    Ok(RunSummary {
        report: summary,
        published,
        manifest,
    })
}

fn print_failures(report: &RunReport) {
    for outcome in &report.failures {
        if let Some(err) = &outcome.error {
            match (err.batch_index(), err.trial_index()) {
                (Some(batch), Some(trial)) => eprintln!(
                    "Thread {} batch {} trial {}: {}",
                    outcome.thread_id, batch, trial, err
                ),
                (Some(batch), None) => {
                    eprintln!("Thread {} batch {}: {}", outcome.thread_id, batch, err)
                }
                _ => eprintln!("Thread {}: {}", outcome.thread_id, err),
            }
        }
    }
    for outcome in &report.cancelled {
        eprintln!(
            "Thread {} cancelled after {} batches",
            outcome.thread_id,
            outcome.batches_accounted()
        );
    }
}
