//! Append-only check log backed by a local SQLite database.
//!
//! Every probe result becomes one row of `check_log`. Rows are only ever
//! inserted, so earlier records are never rewritten. Appends go through a
//! single writer connection guarded by a mutex; reads use pooled
//! connections and see whatever has been committed at query time.

mod migrations;
mod pool;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use libsql::params::Params;
use libsql::{Connection, Row, Value};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::LogError;
use crate::types::{CheckResult, Host, TIMESTAMP_FORMAT, parse_timestamp};
use pool::{LibsqlManager, LibsqlPool};

/// Column order of the CSV export
pub const CSV_HEADER: &str = "timestamp,host,ip,status,response_time";

/// How long an append waits for another handle's write to finish
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "id, timestamp, host, ip, status, response_time";

/// Durable, ordered record of check results
pub struct CheckLog {
    path: PathBuf,
    pool: LibsqlPool,
    writer: Mutex<Connection>,
}

impl CheckLog {
    /// Open (or create) the log at `path` and apply schema migrations
    pub async fn open(path: impl Into<PathBuf>, pool_size: usize) -> Result<Self, LogError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| LogError::CreateDir { path: parent.to_path_buf(), source })?;
        }

        let open_err = |source| LogError::Open { path: path.clone(), source };
        let database = libsql::Builder::new_local(&path).build().await.map_err(open_err)?;
        let writer = database.connect().map_err(open_err)?;

        // other processes may hold the write lock; wait for them instead of failing
        let busy_timeout = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT.as_millis());
        writer.query(&busy_timeout, ()).await.map_err(open_err)?;
        // WAL lets readers proceed while an append is in progress
        writer.query("PRAGMA journal_mode=WAL", ()).await.map_err(open_err)?;
        migrations::run_migrations(&writer).await.map_err(LogError::Migrate)?;

        let pool = LibsqlPool::builder(LibsqlManager::new(database))
            .max_size(pool_size.max(1))
            .build()
            .map_err(|e| LogError::Pool(e.to_string()))?;

        debug!(path = %path.display(), "Opened check log");
        Ok(Self { path, pool, writer: Mutex::new(writer) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one result as the newest record
    ///
    /// The log does not deduplicate: appending the same result twice
    /// stores two rows.
    pub async fn append(&self, result: &CheckResult) -> Result<(), LogError> {
        let values = vec![
            Value::Text(result.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            Value::Text(result.host.to_string()),
            Value::Text(result.resolved_ip.clone()),
            result.status_code.map_or(Value::Null, |code| Value::Integer(i64::from(code))),
            Value::Real(result.response_time_seconds),
        ];

        let writer = self.writer.lock().await;
        writer
            .execute(
                "INSERT INTO check_log (timestamp, host, ip, status, response_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                Params::Positional(values),
            )
            .await
            .map_err(|e| {
                error!(host = %result.host, error = %e, "Check result was not recorded");
                LogError::Write(e)
            })?;

        debug!(host = %result.host, status = ?result.status_code, "Appended check result");
        Ok(())
    }

    /// The most recent `n` records, oldest first
    pub async fn tail(&self, n: usize) -> Result<Vec<CheckResult>, LogError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM (
                SELECT {SELECT_COLUMNS} FROM check_log ORDER BY id DESC LIMIT ?1
            ) ORDER BY id ASC"
        );
        self.query_results(&sql, Params::Positional(vec![Value::Integer(limit)])).await
    }

    /// Every record, oldest first
    pub async fn all(&self) -> Result<Vec<CheckResult>, LogError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM check_log ORDER BY id ASC");
        self.query_results(&sql, Params::None).await
    }

    /// Number of records currently stored
    pub async fn len(&self) -> Result<usize, LogError> {
        let conn = self.connection().await?;
        let mut rows =
            conn.query("SELECT COUNT(*) FROM check_log", ()).await.map_err(LogError::Read)?;

        let count = match rows.next().await.map_err(LogError::Read)? {
            Some(row) => row.get::<i64>(0).map_err(LogError::Read)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub async fn is_empty(&self) -> Result<bool, LogError> {
        Ok(self.len().await? == 0)
    }

    /// Write the whole log as CSV, returning the number of data rows
    pub async fn export_csv<W: Write>(&self, mut out: W) -> Result<usize, LogError> {
        let records = self.all().await?;

        writeln!(out, "{}", CSV_HEADER).map_err(LogError::Export)?;
        for record in &records {
            writeln!(out, "{}", csv_row(record)).map_err(LogError::Export)?;
        }
        out.flush().map_err(LogError::Export)?;

        Ok(records.len())
    }

    async fn connection(&self) -> Result<deadpool::managed::Object<LibsqlManager>, LogError> {
        self.pool.get().await.map_err(|e| LogError::Pool(e.to_string()))
    }

    async fn query_results(&self, sql: &str, params: Params) -> Result<Vec<CheckResult>, LogError> {
        let conn = self.connection().await?;
        let mut rows = conn.query(sql, params).await.map_err(LogError::Read)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(LogError::Read)? {
            results.push(result_from_row(&row)?);
        }
        Ok(results)
    }
}

fn result_from_row(row: &Row) -> Result<CheckResult, LogError> {
    let id: i64 = row.get(0).map_err(LogError::Read)?;
    let malformed = |reason: String| LogError::Malformed { id, reason };

    let timestamp: String = row.get(1).map_err(LogError::Read)?;
    let host: String = row.get(2).map_err(LogError::Read)?;
    let resolved_ip: String = row.get(3).map_err(LogError::Read)?;
    let status: Option<i64> = row.get(4).map_err(LogError::Read)?;
    let response_time_seconds: f64 = row.get(5).map_err(LogError::Read)?;

    Ok(CheckResult {
        timestamp: parse_timestamp(&timestamp)
            .map_err(|e| malformed(format!("timestamp {timestamp:?}: {e}")))?,
        host: Host::parse(&host).map_err(|_| malformed("empty host".to_string()))?,
        resolved_ip,
        status_code: status
            .map(u16::try_from)
            .transpose()
            .map_err(|_| malformed(format!("status {status:?} out of range")))?,
        response_time_seconds,
    })
}

fn csv_row(record: &CheckResult) -> String {
    [
        record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        csv_field(record.host.as_str()),
        csv_field(&record.resolved_ip),
        record.status_code.map(|code| code.to_string()).unwrap_or_default(),
        record.response_time_seconds.to_string(),
    ]
    .join(",")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
