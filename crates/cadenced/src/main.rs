use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cadence_core::{CadenceConfig, DaemonConfig, DispatchPolicy, JobConfig};
use cadence_scheduler::{Daemon, JobEntry};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod command;

use command::CommandJob;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CADENCE_GIT_SHA"), ")");

/// cadenced - run shell commands on schedules, gated by named conditions
#[derive(Parser, Debug)]
#[command(name = "cadenced", version = VERSION, long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.cadence/cadence.toml)
    #[arg(short, long, env = "CADENCE_CONFIG")]
    config: Option<String>,

    /// Overlap policy: allow_overlap or skip_if_running (overrides config)
    #[arg(long)]
    dispatch: Option<DispatchPolicy>,

    /// Seconds between brief-report log lines; 0 disables (overrides config)
    #[arg(long)]
    report_interval: Option<u64>,

    /// Log the brief report as a single JSON document
    #[arg(long)]
    json_report: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (config, load_error) = match CadenceConfig::load(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) if args.check => return Err(anyhow::Error::new(e).context("config is invalid")),
        Err(e) => (CadenceConfig::default(), Some(e)),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = load_error {
        warn!("Config load failed ({}), using defaults", e);
    }

    if args.check {
        return check_jobs(&config.jobs);
    }

    let daemon = Arc::new(Daemon::new(daemon_config(&args, &config)));
    let registered = register_jobs(&daemon, &config.jobs);
    info!(registered, declared = config.jobs.len(), "jobs registered");

    let runner = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move { daemon.start().await })
    };

    let report_secs = args
        .report_interval
        .unwrap_or(config.logging.report_interval_secs);
    let reporter = (report_secs > 0).then(|| {
        let daemon = Arc::clone(&daemon);
        let json = args.json_report;
        tokio::spawn(async move {
            let period = Duration::from_secs(report_secs);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                log_report(&daemon, json);
            }
        })
    });

    shutdown_signal().await?;
    info!("shutdown signal received");

    daemon.stop().await;
    if let Some(reporter) = reporter {
        reporter.abort();
    }
    runner.await.context("scheduler loop task failed")?;

    log_report(&daemon, args.json_report);
    Ok(())
}

/// Daemon settings from the config file with command-line overrides applied.
fn daemon_config(args: &Args, config: &CadenceConfig) -> DaemonConfig {
    let mut daemon = config.daemon.clone();
    if let Some(policy) = args.dispatch {
        daemon.dispatch = policy;
    }
    daemon
}

/// Commit one [`CommandJob`] per declared job. Invalid jobs are logged and
/// skipped so one bad entry does not keep the rest from running.
fn register_jobs(daemon: &Daemon, jobs: &[JobConfig]) -> usize {
    let mut registered = 0;
    for job in jobs {
        match daemon.commit(JobEntry::new(CommandJob::from_config(job))) {
            Ok(entry) => {
                registered += 1;
                if let Some(next) = entry.next_time() {
                    info!(job = %job.name, next = %next, "job scheduled");
                }
            }
            Err(e) => error!(job = %job.name, "job rejected: {e}"),
        }
    }
    registered
}

fn check_jobs(jobs: &[JobConfig]) -> anyhow::Result<()> {
    let mut invalid = 0;
    for job in jobs {
        match cadence_scheduler::schedule::validate(&job.schedule) {
            Ok(_) => println!("ok       {}", job.name),
            Err(e) => {
                invalid += 1;
                println!("invalid  {}: {e}", job.name);
            }
        }
    }
    if invalid > 0 {
        anyhow::bail!("{invalid} of {} job(s) invalid", jobs.len());
    }
    println!("{} job(s) valid", jobs.len());
    Ok(())
}

fn log_report(daemon: &Daemon, json: bool) {
    let report = daemon.brief_report();
    if json {
        match serde_json::to_string(&report) {
            Ok(doc) => info!(report = %doc, "brief report"),
            Err(e) => warn!("brief report serialization failed: {e}"),
        }
        return;
    }
    for job in &report.jobs {
        info!(job = %job.name, "{}", job.message);
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}
