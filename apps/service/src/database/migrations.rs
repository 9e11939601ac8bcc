use anyhow::Result;
use chrono::Utc;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 2;

/// Run database migrations
pub async fn run_migrations(conn: &Connection) -> Result<()> {
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
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Monitors, results and activity log").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Result query indexes").await?;
    }

    tracing::info!("Database migrations completed (now at version {})", SCHEMA_VERSION);
    Ok(())
}

async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, Utc::now().timestamp(), description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Timestamps are unix milliseconds; tuple lists and assertions are JSON text
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monitors (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            name TEXT NOT NULL,
            method TEXT NOT NULL DEFAULT 'GET',
            url TEXT NOT NULL,
            headers TEXT NOT NULL DEFAULT '[]',
            query_params TEXT NOT NULL DEFAULT '[]',
            body TEXT,
            variables TEXT NOT NULL DEFAULT '[]',
            env TEXT NOT NULL DEFAULT '[]',
            assertions TEXT NOT NULL DEFAULT '[]',
            frequency INTEGER NOT NULL DEFAULT 60,
            timeout_ms INTEGER,
            status TEXT NOT NULL DEFAULT 'active',
            locations TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (account_id, name)
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS monitor_results (
            id TEXT PRIMARY KEY,
            monitor_id TEXT NOT NULL,
            account_id TEXT NOT NULL,
            mode TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            url TEXT NOT NULL,
            method TEXT NOT NULL,
            protocol TEXT NOT NULL DEFAULT '',
            ip TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT '',
            code INTEGER,
            err TEXT NOT NULL DEFAULT '',
            wait_time REAL NOT NULL DEFAULT 0,
            dns_time REAL NOT NULL DEFAULT 0,
            tcp_time REAL NOT NULL DEFAULT 0,
            tls_time REAL NOT NULL DEFAULT 0,
            upload_time REAL NOT NULL DEFAULT 0,
            ttfb REAL NOT NULL DEFAULT 0,
            download_time REAL NOT NULL DEFAULT 0,
            total_time REAL NOT NULL DEFAULT 0,
            assert_results TEXT NOT NULL DEFAULT '[]',
            blobs TEXT NOT NULL DEFAULT 'pending',
            FOREIGN KEY (monitor_id) REFERENCES monitors(id) ON DELETE CASCADE
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_log (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            monitor_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            data TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_monitors_account ON monitors(account_id, created_at DESC)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_monitors_status ON monitors(status)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_activity_account ON activity_log(account_id, created_at DESC)", ()).await?;

    Ok(())
}

async fn run_migration_v2(conn: &Connection) -> Result<()> {
    conn.execute("CREATE INDEX IF NOT EXISTS idx_results_monitor_created ON monitor_results(account_id, monitor_id, created_at DESC)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_results_account_created ON monitor_results(account_id, created_at DESC)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_results_location ON monitor_results(location)", ()).await?;

    tracing::info!("Added result query indexes");
    Ok(())
}
