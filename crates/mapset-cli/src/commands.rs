use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use mapset_lease::FileLeaseService;
use mapset_merge::{JobOutcome, JobReport, MergeConfig};
use mapset_store::FsLocation;
use mapset_types::{JobId, MergeRequest, UserId};
use mapset_worker::MergeWorker;
use serde_json::json;

use crate::cli::*;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Merge(args) => cmd_merge(args, config, cli.format).await,
        Command::Leases(args) => cmd_leases(args, cli.format),
        Command::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MergeConfig> {
    let config = match path {
        Some(path) => MergeConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => MergeConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn resolve_user(user: Option<String>) -> UserId {
    let name = user
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "mapset".into());
    UserId::new(name)
}

async fn cmd_merge(args: MergeArgs, config: MergeConfig, format: OutputFormat) -> anyhow::Result<()> {
    let lease_dir = args.lease_dir.unwrap_or_else(|| args.root.join(".leases"));
    let leases = FileLeaseService::open(&lease_dir)
        .with_context(|| format!("opening lease directory {}", lease_dir.display()))?;
    let store = Arc::new(FsLocation::new(&args.root));
    let worker = MergeWorker::new(Arc::new(leases), store.clone(), store, config);

    let user = resolve_user(args.user);
    let request = MergeRequest::new(args.location, args.target, args.sources);
    let handle = worker.submit_request(&request, user.clone())?;
    let job_id = handle.job_id;
    if format == OutputFormat::Text {
        println!("{} Job {} accepted", "→".cyan(), job_id.short_id().yellow());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut printed = 0;
    while !handle.is_finished() {
        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match worker.terminate(&user, &job_id) {
                    Ok(()) => eprintln!("{} Stopping after the current step...", "!".yellow().bold()),
                    Err(e) => tracing::warn!(job = %job_id, error = %e, "termination not delivered"),
                }
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
        printed = print_progress(&worker, &job_id, printed, format)?;
    }

    let report = handle.wait().await?;
    print_progress(&worker, &job_id, printed, format)?;
    print_report(&report, format)?;

    match report.outcome {
        JobOutcome::Finished => Ok(()),
        JobOutcome::Terminated { step, total_steps } => {
            bail!("job terminated before step {step} of {total_steps}")
        }
        JobOutcome::Failed(e) => Err(e).context("merge failed"),
    }
}

/// Print progress updates not shown yet. Returns how many have been shown.
fn print_progress(
    worker: &MergeWorker,
    job_id: &JobId,
    printed: usize,
    format: OutputFormat,
) -> anyhow::Result<usize> {
    let Some(record) = worker.status(job_id) else {
        return Ok(printed);
    };
    for update in record.progress.iter().skip(printed) {
        match format {
            OutputFormat::Text => println!("  {}", update.message),
            OutputFormat::Json => println!("{}", serde_json::to_string(update)?),
        }
    }
    Ok(record.progress.len())
}

/// Machine-readable summary of a finished job.
fn report_json(report: &JobReport) -> serde_json::Value {
    let (step, error) = match &report.outcome {
        JobOutcome::Finished => (None, None),
        JobOutcome::Terminated { step, .. } => (Some(*step), None),
        JobOutcome::Failed(e) => (None, Some(json!({ "kind": e.kind(), "message": e.to_string() }))),
    };
    json!({
        "job_id": report.job_id.to_string(),
        "user_id": report.user_id.to_string(),
        "status": report.outcome.status(),
        "steps_completed": report.steps_completed,
        "total_steps": report.total_steps,
        "terminated_at_step": step,
        "error": error,
        "leases_released": report.cleanup.released,
        "unlock_failures": report.cleanup.unlock_failures.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
        "teardown_error": report.cleanup.teardown_error,
        "elapsed_ms": u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
    })
}

fn print_report(report: &JobReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(&report_json(report))?);
        return Ok(());
    }
    let id = report.job_id.short_id();
    match &report.outcome {
        JobOutcome::Finished => println!(
            "{} Job {} finished: {} of {} mapsets merged in {:.1?}",
            "✓".green().bold(),
            id.yellow(),
            report.steps_completed,
            report.total_steps,
            report.elapsed
        ),
        JobOutcome::Terminated { step, total_steps } => println!(
            "{} Job {} terminated at step {} of {}",
            "■".yellow().bold(),
            id.yellow(),
            step,
            total_steps
        ),
        JobOutcome::Failed(e) => println!(
            "{} Job {} failed ({}): {}",
            "✗".red().bold(),
            id.yellow(),
            e.kind(),
            e
        ),
    }
    println!("  Leases released: {}", report.cleanup.released);
    for key in &report.cleanup.unlock_failures {
        println!("  {} {}", "unlock failed:".red(), key);
    }
    if let Some(err) = &report.cleanup.teardown_error {
        println!("  {} {}", "teardown failed:".red(), err);
    }
    Ok(())
}

fn cmd_leases(args: LeasesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let leases = FileLeaseService::open(&args.lease_dir)
        .with_context(|| format!("opening lease directory {}", args.lease_dir.display()))?;
    let records = leases.list()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No live leases.");
        return Ok(());
    }
    let now = chrono::Utc::now();
    for record in &records {
        let remaining = (record.expires_at - now).num_seconds().max(0);
        println!(
            "{}  holder {}  expires in {}s",
            record.key.to_string().bold(),
            record.holder.to_string().dimmed(),
            remaining
        );
    }
    Ok(())
}

fn cmd_config(config: &MergeConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
