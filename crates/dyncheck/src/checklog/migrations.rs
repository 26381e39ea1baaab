use chrono::Utc;
use libsql::{Connection, params};

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Bring the check log schema up to date
pub async fn run_migrations(conn: &Connection) -> Result<(), libsql::Error> {
    // Create schema_migrations table first (tracks applied migrations)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("Check log schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Migrating check log from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Create check_log table").await?;
    }

    Ok(())
}

async fn get_current_version(conn: &Connection) -> Result<i32, libsql::Error> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(
    conn: &Connection,
    version: i32,
    description: &str,
) -> Result<(), libsql::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        params![version, Utc::now().timestamp(), description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// v1: one row per recorded check, id gives append order
async fn run_migration_v1(conn: &Connection) -> Result<(), libsql::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS check_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            host TEXT NOT NULL,
            ip TEXT NOT NULL,
            status INTEGER,
            response_time REAL NOT NULL
        )",
        (),
    )
    .await?;
    Ok(())
}
