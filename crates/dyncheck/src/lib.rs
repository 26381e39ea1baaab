//! dyncheck - check-and-record engine for dynamic-DNS hosts
//!
//! This library resolves monitored hostnames, probes them over plain HTTP,
//! appends every outcome to a durable check log and derives report views
//! from that log. Presentation is left to the caller.

pub mod error;
pub mod checklog;
pub mod prober;
pub mod registry;
pub mod report;
pub mod trigger;
pub mod types;

// Re-export main types
pub use error::{AddError, CycleError, LogError, ProbeError, StoreError};
pub use checklog::CheckLog;
pub use prober::{HttpProber, Probe, ProbeSettings};
pub use registry::HostRegistry;
pub use report::{ReportView, SeriesPoint, Summary};
pub use trigger::{CycleReport, PeriodicHandle, Trigger};
pub use types::{CheckResult, Health, Host};

/// Hostname used to bootstrap an empty host registry
pub const DEFAULT_HOST: &str = "mijnserver.dyndns.org";

/// Default HTTP probe timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;
