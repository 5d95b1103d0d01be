// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod collect;
pub mod config;
mod error;
mod kubernetes;
mod output;
pub mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use cli::Args;
use collect::Aggregator;
use error::CollectError;
use kubernetes::KubeCluster;
use output::{Reporter, redact};
use progress::{ProgressUpdate, create_progress_handle, create_spinner};

/// Initialize logging with file output and optional stderr.
/// stdout carries the output document and is never logged to.
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // 10MB per file, 5 files, rotated daily as well
    let log_path = log_dir.join("podcopy.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, _guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(_guard);

    let filter = if verbose { "podcopy=debug" } else { "podcopy=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if verbose {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    init_logging(args.verbose);

    let request = args.request()?;
    let mut config = config::Config::load()?;
    args.apply_to(&mut config);

    let redactor = redact::build(args.redact, &config.redact_patterns)
        .context("Invalid redaction pattern in config")?;
    if args.redact && config.redact_patterns.is_empty() {
        warn!("Redaction requested but no redact_patterns are configured");
    }

    let cluster = KubeCluster::connect(config.context.as_deref())
        .await
        .map_err(CollectError::Config)?;

    info!(context = %cluster.context(), namespace = %request.namespace, "Connected");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling in-flight fetches");
                cancel.cancel();
            }
        });
    }

    let progress = create_progress_handle();
    let aggregator = Aggregator::new(Arc::new(cluster), config.run_limits(), Arc::clone(&progress));

    let spinner = create_spinner("Resolving pods...");
    let mut progress_rx = progress.subscribe();

    let bundle = {
        let mut run = Box::pin(aggregator.collect(&request, &cancel));
        loop {
            tokio::select! {
                biased;
                update = progress_rx.recv() => {
                    match update {
                        Ok(ProgressUpdate::Resolving { namespace }) => {
                            spinner.set_message(format!("Resolving pods in {}...", namespace));
                        }
                        Ok(ProgressUpdate::Resolved { pods }) => {
                            spinner.set_message(format!("{} pods found", pods));
                        }
                        Ok(ProgressUpdate::Fetching { pod }) => {
                            let (done, total) = progress.progress();
                            spinner.set_message(format!("[{}/{}] Reading from {}...", done, total, pod));
                        }
                        Ok(ProgressUpdate::Fetched { pod, ok: false, elapsed_ms }) => {
                            spinner.set_message(format!("{} failed after {}ms", pod, elapsed_ms));
                        }
                        _ => {}
                    }
                }
                result = &mut run => {
                    break result;
                }
            }
        }
    };

    spinner.finish_and_clear();
    let bundle = bundle?;

    if bundle.is_empty() {
        info!("Nothing collected");
    }
    info!(
        files = bundle.files.len(),
        errors = bundle.errors.len(),
        "Writing output document"
    );

    Reporter::new(redactor).write_to(bundle, &mut std::io::stdout().lock())
}
