mod backend;
mod classify;
mod config;
mod controller;
mod errors;
mod models;
mod notify;
mod render;
mod warmup;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::{HttpBackend, ScoringBackend, TransportError};
use crate::config::Config;
use crate::controller::{SubmissionController, SubmissionState, SubmitOutcome};
use crate::notify::Notifier;
use crate::render::render_report;
use crate::warmup::WarmupProber;

/// Score a résumé against a job description with a remote scoring service.
#[derive(Parser, Debug)]
#[command(name = "scorecard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL (takes precedence over SCORECARD_API_URL; empty means same origin)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a résumé and a job description and wait for the match report
    Score {
        /// Résumé file (PDF)
        #[arg(short, long, value_name = "FILE")]
        resume: Option<PathBuf>,

        /// Job description text
        #[arg(short, long, conflicts_with = "description_file")]
        description: Option<String>,

        /// Read the job description from a file
        #[arg(long, value_name = "FILE")]
        description_file: Option<PathBuf>,

        /// Open the score view once the result is in
        #[arg(long)]
        open: bool,
    },
    /// Ask the backend to load its model and wait until it is ready
    Warmup,
    /// Check that the backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = Config::from_env()?.with_api_override(args.api_url.as_deref());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting scorecard v{}", env!("CARGO_PKG_VERSION"));
    info!("Scoring backend: {}", config.api_base_url);

    let backend: Arc<dyn ScoringBackend> = Arc::new(HttpBackend::new(&config.api_base_url)?);

    match args.command {
        Command::Score {
            resume,
            description,
            description_file,
            open,
        } => {
            let description = match description_file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read job description from {path:?}"))?,
                None => description.unwrap_or_default(),
            };
            run_score(&config, backend, resume, description, open).await
        }
        Command::Warmup => run_warmup(&config, backend).await,
        Command::Health => run_health(backend).await,
    }
}

async fn run_score(
    config: &Config,
    backend: Arc<dyn ScoringBackend>,
    resume: Option<PathBuf>,
    description: String,
    open: bool,
) -> Result<ExitCode> {
    let root = CancellationToken::new();
    let prober = WarmupProber::new(Arc::clone(&backend), config.warmup_timeout, &root);
    let controller = SubmissionController::new(
        backend,
        config.submit_timeout,
        Notifier::new(config.toast_duration),
        &root,
    );

    if let Some(path) = resume {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read résumé from {path:?}"))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        controller.select_file(name, Bytes::from(bytes))?;
    }
    controller.set_description(description)?;

    // The user may submit before warmup completes; the probe only feeds the hint.
    prober.start();
    controller.observe_warmup(prober.status());
    let mut warmup_rx = prober.subscribe();
    let mut snapshot_rx = controller.subscribe();
    let mut toast_rx = controller.notifier().subscribe();
    eprintln!("{}", prober.status().hint());

    let submit = controller.submit();
    tokio::pin!(submit);

    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            Ok(()) = warmup_rx.changed() => {
                let status = *warmup_rx.borrow_and_update();
                controller.observe_warmup(status);
                eprintln!("{}", status.hint());
            }
            Ok(()) = snapshot_rx.changed() => {
                let snapshot = snapshot_rx.borrow_and_update().clone();
                debug!(attempt = snapshot.attempt, busy = snapshot.busy, "Controller state: {:?}", snapshot.state);
                if snapshot.state == SubmissionState::Submitting {
                    eprintln!("Scoring résumé... (press Ctrl-C to cancel)");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
            }
        }
    };

    let code = match outcome {
        SubmitOutcome::Settled(SubmissionState::Succeeded(result)) => {
            if let Some(toast) = toast_rx.borrow_and_update().clone() {
                println!("{}", toast.text);
            }
            if let Some(db_id) = result.db_id {
                println!(
                    "Stored as record {db_id} (status: {})",
                    result.status.as_deref().unwrap_or("uploaded")
                );
            }
            if open {
                controller.open_score_view();
            }
            let snapshot = controller.snapshot();
            match controller.result() {
                Some(result) if snapshot.score_view_open => {
                    println!();
                    print!("{}", render_report(&result));
                }
                _ => println!("Run again with --open to view the full match report."),
            }
            ExitCode::SUCCESS
        }
        SubmitOutcome::Settled(SubmissionState::Failed(report))
        | SubmitOutcome::Rejected(report) => {
            eprintln!("{}", report.display_text());
            ExitCode::FAILURE
        }
        other => {
            debug!("Submission ended without a result: {other:?}");
            ExitCode::FAILURE
        }
    };

    controller.shutdown();
    root.cancel();
    Ok(code)
}

async fn run_warmup(config: &Config, backend: Arc<dyn ScoringBackend>) -> Result<ExitCode> {
    let root = CancellationToken::new();
    let prober = WarmupProber::new(backend, config.warmup_timeout, &root);
    prober.start();
    eprintln!("{}", prober.status().hint());

    let ready = tokio::select! {
        status = prober.wait_ready() => status,
        _ = tokio::signal::ctrl_c() => {
            root.cancel();
            None
        }
    };

    match ready {
        Some(status) => {
            println!("{}", status.hint());
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

async fn run_health(backend: Arc<dyn ScoringBackend>) -> Result<ExitCode> {
    match backend.health().await {
        Ok(()) => {
            println!("Backend at {} is healthy.", backend.base_url());
            Ok(ExitCode::SUCCESS)
        }
        Err(TransportError::Unreachable(_)) => {
            eprintln!(
                "{}",
                errors::ErrorReport::unreachable(backend.base_url()).display_text()
            );
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            eprintln!("Health check failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
