use std::io::{self, BufWriter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dyncheck::{AddError, CheckLog, Host, HostRegistry, HttpProber, ReportView, Trigger};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::Command;
use crate::config::Config;
use crate::output::{self, CheckLine, Failure, print_json};

/// Run one CLI command against the configured stores, returning the exit status
pub async fn run(command: Command, config: Config) -> Result<u8> {
    match command {
        Command::Hosts => {
            let registry = open_registry(&config)?;
            print_json(registry.list())?;
            Ok(0)
        }
        Command::Add { host } => add_host(&config, &host),
        Command::Check { host } => check(&config, host).await,
        Command::Tail { lines, text } => {
            let log = open_log(&config).await?;
            if text {
                for line in ReportView::new(&log).recent_stream(lines).await? {
                    println!("{line}");
                }
            } else {
                print_json(&log.tail(lines).await?)?;
            }
            Ok(0)
        }
        Command::Series { points } => {
            let log = open_log(&config).await?;
            print_json(&ReportView::new(&log).response_time_series(points).await?)?;
            Ok(0)
        }
        Command::Summary { records } => {
            let log = open_log(&config).await?;
            let summary = ReportView::new(&log).summary(records, config.degraded_after()).await?;
            print_json(&summary)?;
            Ok(0)
        }
        Command::Watch { interval, hosts } => watch(&config, interval, hosts).await,
        Command::Export => {
            let log = open_log(&config).await?;
            let rows = log.export_csv(BufWriter::new(io::stdout())).await?;
            info!(rows, "Exported check log");
            Ok(0)
        }
        Command::Config => {
            print!("{config}");
            Ok(0)
        }
    }
}

fn open_registry(config: &Config) -> Result<HostRegistry> {
    let path = config.hosts_path();
    HostRegistry::load(&path, &config.schedule.default_host)
        .with_context(|| format!("Failed to load host list {}", path.display()))
}

async fn open_log(config: &Config) -> Result<Arc<CheckLog>> {
    let log = CheckLog::open(config.log_path(), config.storage.pool_size).await?;
    Ok(Arc::new(log))
}

async fn build_trigger(config: &Config) -> Result<Trigger> {
    let log = open_log(config).await?;
    let prober = HttpProber::new(config.probe_settings())?;
    Ok(Trigger::new(Arc::new(prober), log, config.timeout())
        .record_unreachable(config.probe.record_unreachable))
}

/// Hosts named on the command line, or every monitored host
fn select_hosts(config: &Config, requested: Vec<String>) -> Result<Result<Vec<Host>, Failure>> {
    if requested.is_empty() {
        return Ok(Ok(open_registry(config)?.list().to_vec()));
    }

    let mut hosts = Vec::with_capacity(requested.len());
    for candidate in requested {
        match Host::parse(&candidate) {
            Ok(host) => hosts.push(host),
            Err(err) => return Ok(Err(Failure::from_add(&candidate, &err))),
        }
    }
    Ok(Ok(hosts))
}

fn add_host(config: &Config, candidate: &str) -> Result<u8> {
    let mut registry = open_registry(config)?;
    match registry.add(candidate) {
        Ok(host) => {
            print_json(&serde_json::json!({ "added": host, "hosts": registry.len() }))?;
            Ok(0)
        }
        Err(AddError::Persist(err)) => Err(err).context("Host was not added"),
        Err(err) => {
            print_json(&Failure::from_add(candidate, &err))?;
            Ok(output::EXIT_ADD_REJECTED)
        }
    }
}

async fn check(config: &Config, host: Option<String>) -> Result<u8> {
    let hosts = match select_hosts(config, host.into_iter().collect())? {
        Ok(hosts) => hosts,
        Err(failure) => {
            print_json(&failure)?;
            return Ok(output::EXIT_ADD_REJECTED);
        }
    };

    let trigger = build_trigger(config).await?;
    let mut code = 0;

    for host in &hosts {
        match trigger.fire(host).await {
            Ok(result) => {
                let health = result.health(config.degraded_after());
                print_json(&CheckLine { result: &result, health })?;
            }
            Err(err) => {
                print_json(&Failure::from_cycle(host.as_str(), &err))?;
                if code == 0 {
                    code = output::exit_code_for(&err);
                }
            }
        }
    }

    Ok(code)
}

async fn watch(config: &Config, interval: Option<u64>, requested: Vec<String>) -> Result<u8> {
    let hosts = match select_hosts(config, requested)? {
        Ok(hosts) => hosts,
        Err(failure) => {
            print_json(&failure)?;
            return Ok(output::EXIT_ADD_REJECTED);
        }
    };
    if hosts.is_empty() {
        anyhow::bail!("No hosts to watch");
    }

    let period = interval.map(Duration::from_secs).unwrap_or_else(|| config.interval());
    if period.is_zero() {
        anyhow::bail!("Interval must be at least one second");
    }

    let trigger = build_trigger(config).await?;
    let (tx, mut rx) = mpsc::channel(hosts.len().max(16));
    let handle = trigger.start_periodic(hosts, period, tx);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut interrupted = false;

    loop {
        tokio::select! {
            report = rx.recv() => {
                let Some(report) = report else { break };
                match report.outcome {
                    Ok(result) => {
                        let health = result.health(config.degraded_after());
                        print_json(&CheckLine { result: &result, health })?;
                    }
                    Err(err) => print_json(&Failure::from_cycle(report.host.as_str(), &err))?,
                }
            }
            signal = &mut shutdown, if !interrupted => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Stopping after the current check");
                interrupted = true;
                handle.cancel();
            }
        }
    }

    handle.stopped().await;
    Ok(0)
}
