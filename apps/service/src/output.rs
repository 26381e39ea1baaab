//! Structured stdout output for scripting.
//!
//! Single results are one JSON document; streams are one JSON object per
//! line. Failures the user should act on are printed the same way and
//! mapped to a distinct exit code.

use std::process::ExitCode;

use dyncheck::{AddError, CheckResult, CycleError, Health, ProbeError};
use serde::Serialize;

pub const EXIT_ADD_REJECTED: u8 = 2;
pub const EXIT_DNS_FAILURE: u8 = 3;
pub const EXIT_UNREACHABLE: u8 = 4;
pub const EXIT_FAILURE: u8 = 1;

/// A recorded check together with its classification
#[derive(Debug, Serialize)]
pub struct CheckLine<'a> {
    #[serde(flatten)]
    pub result: &'a CheckResult,
    pub health: Health,
}

/// A failed operation in machine-readable form
#[derive(Debug, Serialize)]
pub struct Failure {
    pub host: String,
    pub error: &'static str,
    pub message: String,
}

impl Failure {
    pub fn from_add(candidate: &str, err: &AddError) -> Self {
        let error = match err {
            AddError::EmptyHost => "empty_host",
            AddError::DuplicateHost(_) => "duplicate_host",
            AddError::Persist(_) => "persist",
        };
        Self { host: candidate.trim().to_string(), error, message: err.to_string() }
    }

    pub fn from_cycle(host: &str, err: &CycleError) -> Self {
        let error = match err {
            CycleError::Probe(probe) => probe.kind(),
            CycleError::Log(_) => "log_write",
        };
        Self { host: host.to_string(), error, message: err.to_string() }
    }
}

/// Exit status for a failed check cycle
pub fn exit_code_for(err: &CycleError) -> u8 {
    match err {
        CycleError::Probe(ProbeError::DnsFailure { .. }) => EXIT_DNS_FAILURE,
        CycleError::Probe(ProbeError::Unreachable { .. }) => EXIT_UNREACHABLE,
        CycleError::Probe(ProbeError::Client(_)) | CycleError::Log(_) => EXIT_FAILURE,
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub fn exit(code: u8) -> ExitCode {
    if code == 0 { ExitCode::SUCCESS } else { ExitCode::from(code) }
}
