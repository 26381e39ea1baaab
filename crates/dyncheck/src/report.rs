//! Read-only views derived from the check log.
//!
//! Nothing here holds state; every call reads the log as it is at that
//! moment. The slice helpers are exposed for callers that already hold
//! records.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::checklog::CheckLog;
use crate::error::LogError;
use crate::types::{CheckResult, Health, TIMESTAMP_FORMAT};

/// One point of the response-time chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub response_time_seconds: f64,
}

/// Health counts and timing over a window of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub records: usize,
    pub by_health: BTreeMap<String, usize>,
    pub min_seconds: Option<f64>,
    pub mean_seconds: Option<f64>,
    pub max_seconds: Option<f64>,
}

/// Report views over a [`CheckLog`]
pub struct ReportView<'a> {
    log: &'a CheckLog,
}

impl<'a> ReportView<'a> {
    pub fn new(log: &'a CheckLog) -> Self {
        Self { log }
    }

    /// Display lines for the last `n` records, newest first
    pub async fn recent_stream(&self, n: usize) -> Result<Vec<String>, LogError> {
        Ok(render_stream(&self.log.tail(n).await?))
    }

    /// Response times of the last `n` records, oldest first
    pub async fn response_time_series(&self, n: usize) -> Result<Vec<SeriesPoint>, LogError> {
        Ok(series_from(&self.log.tail(n).await?))
    }

    /// Health counts and timing stats over the last `n` records
    pub async fn summary(&self, n: usize, degraded_after: Duration) -> Result<Summary, LogError> {
        Ok(summarize(&self.log.tail(n).await?, degraded_after))
    }
}

/// `timestamp | host | resolved_ip | status_code | response_time_seconds`
pub fn render_line(record: &CheckResult) -> String {
    let status = record.status_code.map_or_else(|| "-".to_string(), |code| code.to_string());
    format!(
        "{} | {} | {} | {} | {:.3}",
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.host,
        record.resolved_ip,
        status,
        record.response_time_seconds
    )
}

/// Render oldest-first records as newest-first lines
pub fn render_stream(records: &[CheckResult]) -> Vec<String> {
    records.iter().rev().map(render_line).collect()
}

pub fn series_from(records: &[CheckResult]) -> Vec<SeriesPoint> {
    records
        .iter()
        .map(|r| SeriesPoint { timestamp: r.timestamp, response_time_seconds: r.response_time_seconds })
        .collect()
}

/// Timing stats only consider records that received a response
pub fn summarize(records: &[CheckResult], degraded_after: Duration) -> Summary {
    let mut by_health = BTreeMap::new();
    for record in records {
        *by_health.entry(record.health(degraded_after).to_string()).or_insert(0) += 1;
    }

    let timings: Vec<f64> = records
        .iter()
        .filter(|r| r.health(degraded_after) != Health::Down)
        .map(|r| r.response_time_seconds)
        .collect();

    let (min_seconds, mean_seconds, max_seconds) = if timings.is_empty() {
        (None, None, None)
    } else {
        let sum: f64 = timings.iter().sum();
        let mean = (sum / timings.len() as f64 * 1000.0).round() / 1000.0;
        (
            timings.iter().copied().reduce(f64::min),
            Some(mean),
            timings.iter().copied().reduce(f64::max),
        )
    };

    Summary { records: records.len(), by_health, min_seconds, mean_seconds, max_seconds }
}

fn serialize_timestamp<S: serde::Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Host, parse_timestamp};

    fn record(second: u32, status_code: Option<u16>, seconds: f64) -> CheckResult {
        CheckResult {
            timestamp: parse_timestamp(&format!("2024-05-01 10:00:{second:02}")).unwrap(),
            host: Host::parse("home.dyndns.org").unwrap(),
            resolved_ip: "192.0.2.10".to_string(),
            status_code,
            response_time_seconds: seconds,
        }
    }

    #[test]
    fn test_render_line() {
        assert_eq!(
            render_line(&record(5, Some(200), 0.1)),
            "2024-05-01 10:00:05 | home.dyndns.org | 192.0.2.10 | 200 | 0.100"
        );
        assert_eq!(
            render_line(&record(6, None, 5.0)),
            "2024-05-01 10:00:06 | home.dyndns.org | 192.0.2.10 | - | 5.000"
        );
    }

    #[test]
    fn test_render_stream_is_newest_first() {
        let lines = render_stream(&[record(1, Some(200), 0.1), record(2, Some(404), 0.2)]);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2024-05-01 10:00:02"));
        assert!(lines[1].starts_with("2024-05-01 10:00:01"));
    }

    #[test]
    fn test_series_keeps_order() {
        let points = series_from(&[record(1, Some(200), 0.3), record(2, Some(200), 0.1)]);
        let times: Vec<f64> = points.iter().map(|p| p.response_time_seconds).collect();
        assert_eq!(times, [0.3, 0.1]);

        let json = serde_json::to_value(&points[0]).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01 10:00:01");
    }

    #[test]
    fn test_summarize() {
        let records = [
            record(1, Some(200), 0.1),
            record(2, Some(200), 0.3),
            record(3, Some(500), 0.2),
            record(4, None, 5.0),
            record(5, Some(200), 3.0),
        ];
        let summary = summarize(&records, Duration::from_secs(2));

        assert_eq!(summary.records, 5);
        assert_eq!(summary.by_health["up"], 2);
        assert_eq!(summary.by_health["unhealthy"], 1);
        assert_eq!(summary.by_health["down"], 1);
        assert_eq!(summary.by_health["degraded"], 1);
        assert_eq!(summary.min_seconds, Some(0.1));
        assert_eq!(summary.max_seconds, Some(3.0));
        assert_eq!(summary.mean_seconds, Some(0.9));
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[], Duration::from_secs(2));
        assert_eq!(summary.records, 0);
        assert!(summary.by_health.is_empty());
        assert_eq!(summary.mean_seconds, None);
    }
}
