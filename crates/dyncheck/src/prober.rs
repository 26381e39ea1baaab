use std::error::Error as _;
use std::net::{IpAddr, Ipv6Addr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::error::ProbeError;
use crate::types::{CheckResult, Host};

/// Default time allowed for name resolution
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe trait for host reachability checks
#[async_trait]
pub trait Probe: Send + Sync {
    /// Resolve `host` and issue one HTTP request bounded by `timeout`
    ///
    /// Any HTTP response, whatever its status, is a successful probe.
    async fn check(&self, host: &Host, timeout: Duration) -> Result<CheckResult, ProbeError>;
}

/// Settings for [`HttpProber`]
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// TCP port for the HTTP request
    pub port: u16,

    /// Upper bound on name resolution, independent of the request timeout
    pub dns_timeout: Duration,

    /// Route requests through proxies named in `HTTP_PROXY` and friends
    pub use_env_proxy: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { port: 80, dns_timeout: DEFAULT_DNS_TIMEOUT, use_env_proxy: true }
    }
}

/// Resolve-then-GET prober over plain HTTP
///
/// The request is addressed by hostname, so the HTTP client resolves the
/// name again on its own. The address reported in the result is the one
/// from the explicit resolution step.
pub struct HttpProber {
    client: reqwest::Client,
    settings: ProbeSettings,
}

impl HttpProber {
    pub fn new(settings: ProbeSettings) -> Result<Self, ProbeError> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("dyncheck/", env!("CARGO_PKG_VERSION")));
        if !settings.use_env_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(ProbeError::Client)?;

        Ok(Self { client, settings })
    }

    /// Resolve a host, preferring IPv4 like `gethostbyname`
    pub async fn resolve(&self, host: &Host) -> Result<IpAddr, ProbeError> {
        let dns_failure = |reason: String| ProbeError::DnsFailure { host: host.to_string(), reason };

        let lookup = tokio::net::lookup_host((host.as_str(), self.settings.port));
        let addrs: Vec<IpAddr> = match timeout(self.settings.dns_timeout, lookup).await {
            Ok(Ok(addrs)) => addrs.map(|addr| addr.ip()).collect(),
            Ok(Err(e)) => return Err(dns_failure(e.to_string())),
            Err(_) => {
                return Err(dns_failure(format!(
                    "resolution timed out after {}s",
                    self.settings.dns_timeout.as_secs_f64()
                )));
            }
        };

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| dns_failure("no addresses returned".to_string()))
    }

    /// URL probed for a host
    pub fn url_for(&self, host: &Host) -> String {
        let authority = if host.as_str().parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", host)
        } else {
            host.to_string()
        };

        match self.settings.port {
            80 => format!("http://{}/", authority),
            port => format!("http://{}:{}/", authority, port),
        }
    }
}

#[async_trait]
impl Probe for HttpProber {
    #[instrument(skip(self, host), fields(host = %host))]
    async fn check(&self, host: &Host, timeout: Duration) -> Result<CheckResult, ProbeError> {
        let ip = self.resolve(host).await?;
        debug!(%ip, "Resolved host");

        let attempt = CheckResult::new(host.clone(), ip);
        let url = self.url_for(host);

        let start = Instant::now();
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(mut response) => {
                let status = response.status().as_u16();
                let mut body_bytes = 0usize;
                // drain without buffering; only the timing matters
                loop {
                    match response.chunk().await {
                        Ok(Some(chunk)) => body_bytes += chunk.len(),
                        Ok(None) => break,
                        Err(e) => {
                            debug!(error = %e, body_bytes, "Response body was cut short");
                            break;
                        }
                    }
                }
                let elapsed = start.elapsed();
                debug!(status, body_bytes, elapsed_ms = elapsed.as_millis() as u64, "Received response");
                Ok(attempt.responded(status, elapsed))
            }
            Err(e) => {
                let elapsed = start.elapsed();
                let reason = if e.is_timeout() {
                    format!("timed out after {}s", timeout.as_secs_f64())
                } else {
                    error_chain(&e)
                };
                debug!(%reason, "No response");
                Err(ProbeError::Unreachable { attempt: Box::new(attempt.no_response(elapsed)), reason })
            }
        }
    }
}

/// Flatten an error and its sources into one line
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prober(port: u16) -> HttpProber {
        HttpProber::new(ProbeSettings { port, use_env_proxy: false, ..ProbeSettings::default() })
            .unwrap()
    }

    #[test]
    fn test_url_for_default_port() {
        let host = Host::parse("home.dyndns.org").unwrap();
        assert_eq!(prober(80).url_for(&host), "http://home.dyndns.org/");
    }

    #[test]
    fn test_url_for_custom_port_and_ipv6() {
        let p = prober(8080);
        assert_eq!(p.url_for(&Host::parse("127.0.0.1").unwrap()), "http://127.0.0.1:8080/");
        assert_eq!(p.url_for(&Host::parse("::1").unwrap()), "http://[::1]:8080/");
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let ip = prober(80).resolve(&Host::parse("127.0.0.1").unwrap()).await.unwrap();
        assert_eq!(ip, IpAddr::from([127, 0, 0, 1]));
    }

    #[tokio::test]
    async fn test_resolve_invalid_tld_fails() {
        let err = prober(80)
            .resolve(&Host::parse("nonexistent.invalid").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::DnsFailure { ref host, .. } if host == "nonexistent.invalid"));
        assert_eq!(err.kind(), "dns_failure");
    }
}
