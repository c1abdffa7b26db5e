use std::fmt::Write as _;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use warpscale_autoscale::orchestrator::epoch_now;
use warpscale_autoscale::{GroupOutcome, Orchestrator, RunReport};

use super::{EngineArgs, SourceArgs};
use crate::OutputFormat;

/// One evaluation run. Per-group failures are part of the report and do
/// not fail the command.
pub fn run(
    engine: &EngineArgs,
    source: &SourceArgs,
    at: Option<u64>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = engine.load()?;
    let store = source.open()?;
    let orchestrator = Orchestrator::new(config);

    let report = orchestrator.evaluate_all(&store, &store, at.unwrap_or_else(epoch_now))?;
    print_report(&report, format)
}

/// Repeated runs until Ctrl-C.
pub async fn watch(
    engine: &EngineArgs,
    source: &SourceArgs,
    interval: u64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = engine.load()?;
    let store = source.open()?;
    let orchestrator = Orchestrator::new(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl-C"),
        }
        let _ = shutdown_tx.send(true);
    });

    orchestrator
        .run(
            &store,
            &store,
            Duration::from_secs(interval),
            shutdown_rx,
            |report| {
                if let Err(e) = print_report(report, format) {
                    error!(error = %e, "failed to print report");
                }
            },
        )
        .await;

    Ok(())
}

fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print!("{}", format_report(report)),
    }
    Ok(())
}

fn format_report(report: &RunReport) -> String {
    let mut out = String::new();
    let mode = if report.dry_run { " (dry run)" } else { "" };
    let _ = writeln!(out, "evaluated at {}{mode}", report.evaluated_at);

    let width = report
        .groups
        .iter()
        .map(|g| g.group.len())
        .max()
        .unwrap_or(0);
    for g in &report.groups {
        let outcome = match &g.outcome {
            GroupOutcome::ScaledUp { policy } => format!("scaled up ({policy})"),
            GroupOutcome::ScaledDown { policy } => format!("scaled down ({policy})"),
            GroupOutcome::NoAction => "no action".to_string(),
            GroupOutcome::Failed { error } => format!("failed: {error}"),
        };
        let _ = writeln!(out, "  {:width$}  {outcome}", g.group);
    }

    let _ = writeln!(
        out,
        "{} groups, {} triggered, {} failed",
        report.groups.len(),
        report.triggered_count(),
        report.failed_count()
    );
    out
}
