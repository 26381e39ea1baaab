use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::checklog::CheckLog;
use crate::error::{CycleError, ProbeError};
use crate::prober::Probe;
use crate::types::{CheckResult, Host};

/// Outcome of one fired check, as delivered by a periodic trigger
#[derive(Debug)]
pub struct CycleReport {
    pub host: Host,
    pub outcome: Result<CheckResult, CycleError>,
}

/// Decides when checks run: on request or on a fixed interval
///
/// Each fired check is exactly one probe followed by at most one append.
/// Failures are handed back to the caller and never retried here.
#[derive(Clone)]
pub struct Trigger {
    prober: Arc<dyn Probe>,
    log: Arc<CheckLog>,
    timeout: Duration,
    record_unreachable: bool,
}

impl Trigger {
    pub fn new(prober: Arc<dyn Probe>, log: Arc<CheckLog>, timeout: Duration) -> Self {
        Self { prober, log, timeout, record_unreachable: false }
    }

    /// Also log checks where the host resolved but did not answer
    pub fn record_unreachable(mut self, enabled: bool) -> Self {
        self.record_unreachable = enabled;
        self
    }

    /// Run one check now: probe, then append the result
    pub async fn fire(&self, host: &Host) -> Result<CheckResult, CycleError> {
        match self.prober.check(host, self.timeout).await {
            Ok(result) => {
                self.log.append(&result).await?;
                info!(
                    host = %host,
                    ip = %result.resolved_ip,
                    status = ?result.status_code,
                    seconds = result.response_time_seconds,
                    "Check recorded"
                );
                Ok(result)
            }
            Err(ProbeError::Unreachable { attempt, reason }) if self.record_unreachable => {
                warn!(host = %host, %reason, "Host unreachable, recording without status");
                self.log.append(&attempt).await?;
                Err(ProbeError::Unreachable { attempt, reason }.into())
            }
            Err(e) => {
                warn!(host = %host, error = %e, "Check failed");
                Err(e.into())
            }
        }
    }

    /// Check `hosts` in turn every `period` until the handle is cancelled
    ///
    /// The first round starts immediately. One report per check is sent on
    /// `reports`; the worker stops when the receiver goes away.
    pub fn start_periodic(
        &self,
        hosts: Vec<Host>,
        period: Duration,
        reports: mpsc::Sender<CycleReport>,
    ) -> PeriodicHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let trigger = self.clone();

        let join = tokio::spawn(async move {
            let mut timer = interval(period.max(Duration::from_millis(1)));
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(hosts = hosts.len(), period_secs = period.as_secs_f64(), "Periodic checks started");

            'rounds: loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {}
                }

                for host in &hosts {
                    let outcome = trigger.fire(host).await;
                    if reports.send(CycleReport { host: host.clone(), outcome }).await.is_err() {
                        debug!("Report receiver dropped");
                        break 'rounds;
                    }
                    // an in-flight check always completes; stop before the next one
                    if token.is_cancelled() {
                        break 'rounds;
                    }
                }
            }

            info!("Periodic checks stopped");
        });

        PeriodicHandle { cancel, join }
    }
}

/// Handle to a running periodic trigger
pub struct PeriodicHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PeriodicHandle {
    /// Stop before the next check; a check already running is not aborted
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker to exit
    pub async fn stopped(self) {
        if let Err(e) = self.join.await {
            error!("Periodic trigger task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now_timestamp;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Answers by host name without touching the network
    #[derive(Default)]
    struct ScriptedProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn check(&self, host: &Host, _timeout: Duration) -> Result<CheckResult, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ip = IpAddr::from([192, 0, 2, 1]);
            let attempt = CheckResult::new(host.clone(), ip);
            match host.as_str() {
                "missing.test" => Err(ProbeError::DnsFailure {
                    host: host.to_string(),
                    reason: "not found".to_string(),
                }),
                "down.test" => Err(ProbeError::Unreachable {
                    attempt: Box::new(attempt.no_response(Duration::from_millis(1500))),
                    reason: "connection refused".to_string(),
                }),
                "broken.test" => Ok(attempt.responded(503, Duration::from_millis(80))),
                _ => Ok(attempt.responded(200, Duration::from_millis(40))),
            }
        }
    }

    async fn setup(dir: &TempDir) -> (Arc<ScriptedProbe>, Arc<CheckLog>, Trigger) {
        let probe = Arc::new(ScriptedProbe::default());
        let log = Arc::new(CheckLog::open(dir.path().join("checks.db"), 2).await.unwrap());
        let trigger = Trigger::new(probe.clone(), log.clone(), Duration::from_secs(5));
        (probe, log, trigger)
    }

    fn host(name: &str) -> Host {
        Host::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_fire_records_success() {
        let dir = TempDir::new().unwrap();
        let (probe, log, trigger) = setup(&dir).await;

        let result = trigger.fire(&host("ok.test")).await.unwrap();
        assert_eq!(result.status_code, Some(200));
        assert_eq!(log.all().await.unwrap(), vec![result]);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fire_records_unhealthy_status() {
        let dir = TempDir::new().unwrap();
        let (_, log, trigger) = setup(&dir).await;

        let result = trigger.fire(&host("broken.test")).await.unwrap();
        assert_eq!(result.status_code, Some(503));
        assert_eq!(log.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dns_failure_not_recorded() {
        let dir = TempDir::new().unwrap();
        let (probe, log, trigger) = setup(&dir).await;

        let err = trigger.fire(&host("missing.test")).await.unwrap_err();
        assert!(matches!(err, CycleError::Probe(ProbeError::DnsFailure { .. })));
        assert!(log.is_empty().await.unwrap());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_not_recorded_by_default() {
        let dir = TempDir::new().unwrap();
        let (probe, log, trigger) = setup(&dir).await;

        let err = trigger.fire(&host("down.test")).await.unwrap_err();
        assert!(matches!(err, CycleError::Probe(ProbeError::Unreachable { .. })));
        assert!(log.is_empty().await.unwrap());
        // no retries
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_recorded_when_enabled() {
        let dir = TempDir::new().unwrap();
        let (_, log, trigger) = setup(&dir).await;
        let trigger = trigger.record_unreachable(true);

        let before = now_timestamp();
        let err = trigger.fire(&host("down.test")).await.unwrap_err();
        assert!(matches!(err, CycleError::Probe(ProbeError::Unreachable { .. })));

        let rows = log.all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status_code, None);
        assert_eq!(rows[0].response_time_seconds, 1.5);
        assert!(rows[0].timestamp >= before);
    }

    #[tokio::test]
    async fn test_periodic_reports_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let (_, log, trigger) = setup(&dir).await;
        let (tx, mut rx) = mpsc::channel(64);

        let handle = trigger.start_periodic(
            vec![host("ok.test"), host("missing.test")],
            Duration::from_millis(20),
            tx,
        );

        let mut reports = Vec::new();
        while reports.len() < 4 {
            let report = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("Timeout waiting for report")
                .expect("Channel closed");
            reports.push(report);
        }

        handle.cancel();
        handle.stopped().await;

        while let Ok(report) = rx.try_recv() {
            reports.push(report);
        }

        assert_eq!(reports[0].host.as_str(), "ok.test");
        assert_eq!(reports[1].host.as_str(), "missing.test");
        assert!(reports[0].outcome.is_ok());
        assert!(reports[1].outcome.is_err());

        let successes = reports.iter().filter(|r| r.outcome.is_ok()).count();
        assert_eq!(log.len().await.unwrap(), successes);

        // nothing fires after the worker has stopped
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(log.len().await.unwrap(), successes);
    }

    #[tokio::test]
    async fn test_periodic_stops_when_receiver_dropped() {
        let dir = TempDir::new().unwrap();
        let (_, _log, trigger) = setup(&dir).await;
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let handle = trigger.start_periodic(vec![host("ok.test")], Duration::from_millis(10), tx);
        tokio::time::timeout(Duration::from_secs(5), handle.stopped())
            .await
            .expect("worker should stop once nobody listens");
    }
}
