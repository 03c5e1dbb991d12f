//! Table provisioning for the sensor database

use sqlx::PgPool;

use super::StorageError;

/// Time-series tables and their DDL, in creation order
const TABLES: &[(&str, &str)] = &[
    (
        "temperatures",
        "CREATE TABLE IF NOT EXISTS temperatures (
            id SERIAL,
            value REAL NOT NULL,
            location TEXT NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (id, timestamp)
        )",
    ),
    (
        "pump_run_times",
        "CREATE TABLE IF NOT EXISTS pump_run_times (
            id SERIAL,
            run_time INTEGER NOT NULL,
            current REAL NOT NULL,
            low_current BOOLEAN NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (id, timestamp)
        )",
    ),
    (
        "pump_run_times_critical",
        "CREATE TABLE IF NOT EXISTS pump_run_times_critical (
            id SERIAL,
            run_time INTEGER NOT NULL,
            current REAL NOT NULL,
            low_current BOOLEAN NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (id, timestamp)
        )",
    ),
    (
        "device_heartbeats",
        "CREATE TABLE IF NOT EXISTS device_heartbeats (
            id SERIAL,
            device_id VARCHAR(255) NOT NULL,
            pump BOOLEAN NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (id, timestamp)
        )",
    ),
];

/// Names of the provisioned tables
pub fn table_names() -> impl Iterator<Item = &'static str> {
    TABLES.iter().map(|(name, _)| *name)
}

/// Create any missing tables, converting them to hypertables when the
/// TimescaleDB extension is installed.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    for &(name, ddl) in TABLES {
        sqlx::query(ddl).execute(pool).await?;
        tracing::debug!(table = name, "Table ensured");
    }

    let timescale: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'timescaledb')",
    )
    .fetch_one(pool)
    .await?;

    if !timescale {
        tracing::info!("TimescaleDB not installed, keeping plain tables");
        return Ok(());
    }

    for name in table_names() {
        sqlx::query("SELECT create_hypertable($1::regclass, 'timestamp', if_not_exists => TRUE)")
            .bind(name)
            .execute(pool)
            .await?;
        tracing::debug!(table = name, "Hypertable ensured");
    }

    Ok(())
}
