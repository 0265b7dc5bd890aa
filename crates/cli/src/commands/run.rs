//! `run` command implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref filter) = args.filter {
        info!(filter = %filter, "Overriding filter expression from CLI");
        blueprint.filter.expression = filter.clone();
    }
    if let Some(workers) = args.workers {
        info!(workers, "Overriding async worker count from CLI");
        blueprint.dispatcher.async_workers = workers;
    }
    config_loader::ConfigLoader::validate(&blueprint).context("Invalid CLI override")?;

    info!(
        filter = %blueprint.filter.expression,
        workers = blueprint.dispatcher.async_workers,
        sources = blueprint.sources.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        filter_lang::compile(&blueprint.filter.expression).context("Invalid filter expression")?;
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        events_path: args.events.clone(),
        output_path: args.output.clone(),
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    // The dispatcher blocks; run it off the async runtime and stop it via a flag
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let mut task = tokio::task::spawn_blocking(move || pipeline.run(worker_cancel));

    info!("Starting pipeline...");

    let result = tokio::select! {
        joined = &mut task => joined,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping pipeline...");
            cancel.store(true, Ordering::Relaxed);
            task.await
        }
    };

    let stats = result
        .context("Pipeline task panicked")?
        .context("Pipeline execution failed")?;

    info!(
        received = stats.dispatcher.received,
        written = stats.events_written,
        duration_secs = stats.duration.as_secs_f64(),
        events_per_sec = format!("{:.2}", stats.events_per_sec()),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("evt-filter finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Filter: {}", blueprint.filter.expression);
    println!("\nDispatcher:");
    println!("  Async workers: {}", blueprint.dispatcher.async_workers);
    println!("  Thread prefix: {}", blueprint.dispatcher.thread_name_prefix);
    println!("  Flush timeout: {} ms", blueprint.dispatcher.flush_timeout_ms);

    println!("\nSources ({}):", blueprint.sources.len());
    for source in &blueprint.sources {
        println!("  - {} ({})", source.id, source.name);
    }
    println!();
}
