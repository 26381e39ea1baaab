use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::AddError;

/// Wall-clock format used for stored and rendered timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A monitored hostname
///
/// Always non-empty and free of surrounding whitespace. No other
/// normalisation is applied, so `Example.org` and `example.org` are
/// different hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    /// Trim a candidate hostname and reject it when nothing is left
    pub fn parse(candidate: &str) -> Result<Self, AddError> {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Err(AddError::EmptyHost);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Host {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Health of a host as seen by one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Up,
    Degraded,
    Unhealthy,
    Down,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Up => write!(f, "up"),
            Health::Degraded => write!(f, "degraded"),
            Health::Unhealthy => write!(f, "unhealthy"),
            Health::Down => write!(f, "down"),
        }
    }
}

/// Outcome of one probe, as stored in the check log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Local time the check was taken, second precision
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,

    /// Host that was probed
    pub host: Host,

    /// Address the host resolved to
    pub resolved_ip: String,

    /// HTTP status code, `None` when no response was received
    pub status_code: Option<u16>,

    /// Request duration in seconds, millisecond precision
    pub response_time_seconds: f64,
}

impl CheckResult {
    /// Start a result for a host that resolved to `ip`
    pub fn new(host: Host, ip: IpAddr) -> Self {
        Self {
            timestamp: now_timestamp(),
            host,
            resolved_ip: ip.to_string(),
            status_code: None,
            response_time_seconds: 0.0,
        }
    }

    /// Record a received HTTP response
    pub fn responded(mut self, status_code: u16, elapsed: Duration) -> Self {
        self.status_code = Some(status_code);
        self.response_time_seconds = round_seconds(elapsed);
        self
    }

    /// Record a request that ended without any HTTP response
    pub fn no_response(mut self, elapsed: Duration) -> Self {
        self.status_code = None;
        self.response_time_seconds = round_seconds(elapsed);
        self
    }

    /// Classify this result; 2xx and 3xx count as healthy
    pub fn health(&self, degraded_after: Duration) -> Health {
        match self.status_code {
            None => Health::Down,
            Some(code) if (200..400).contains(&code) => {
                if self.response_time_seconds > degraded_after.as_secs_f64() {
                    Health::Degraded
                } else {
                    Health::Up
                }
            }
            Some(_) => Health::Unhealthy,
        }
    }
}

/// Current local time truncated to whole seconds
pub fn now_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Parse a timestamp written with [`TIMESTAMP_FORMAT`]
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
}

/// Seconds rounded to three decimals
pub fn round_seconds(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
