use std::path::PathBuf;

use thiserror::Error;

use crate::types::CheckResult;

/// Failure to read or write the persisted host list
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read host list {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("host list {path} is not a JSON array of strings: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("failed to write host list {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("failed to encode host list {path}: {source}")]
    Serialize { path: PathBuf, source: serde_json::Error },
}

/// Rejected `HostRegistry::add` request; nothing is written
#[derive(Debug, Error)]
pub enum AddError {
    #[error("host name is empty")]
    EmptyHost,

    #[error("host {0} is already monitored")]
    DuplicateHost(String),

    #[error(transparent)]
    Persist(#[from] StoreError),
}

/// Failure of a single probe
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The name did not resolve; nothing was sent over the network
    #[error("host not found: {host} ({reason})")]
    DnsFailure { host: String, reason: String },

    /// The name resolved but no HTTP response came back
    #[error("host unreachable: {} ({reason})", .attempt.host)]
    Unreachable {
        /// The attempt with its resolved address and elapsed time, no status
        attempt: Box<CheckResult>,
        reason: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ProbeError {
    /// Stable identifier for structured output
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::DnsFailure { .. } => "dns_failure",
            ProbeError::Unreachable { .. } => "unreachable",
            ProbeError::Client(_) => "client",
        }
    }
}

/// Check log storage failure
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open check log {path}: {source}")]
    Open { path: PathBuf, source: libsql::Error },

    #[error("failed to create check log directory {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },

    #[error("check log migration failed: {0}")]
    Migrate(#[source] libsql::Error),

    /// A record could not be appended; monitoring history is being lost
    #[error("failed to append check result: {0}")]
    Write(#[source] libsql::Error),

    #[error("failed to read check log: {0}")]
    Read(#[source] libsql::Error),

    #[error("check log connection pool error: {0}")]
    Pool(String),

    #[error("malformed check log row {id}: {reason}")]
    Malformed { id: i64, reason: String },

    #[error("failed to export check log: {0}")]
    Export(#[source] std::io::Error),
}

/// Failure of one trigger cycle (probe then append)
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Log(#[from] LogError),
}
