use rusqlite::Connection;
use tracing::info;

use crate::database::DatabaseError;

/// Run SQLite migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    info!("Running SQLite migrations");

    create_examinations_table(conn)?;
    create_statistics_tables(conn)?;

    info!("SQLite migrations completed successfully");
    Ok(())
}

/// Create the examinations table and its period index
fn create_examinations_table(conn: &Connection) -> Result<(), DatabaseError> {
    info!("Creating examinations table if not exists");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS examinations (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            patient_id TEXT NOT NULL,
            measurement_date TEXT NOT NULL,
            measured_at TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            clinical TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_examinations_period
        ON examinations (kind, year, month, measured_at);"
    ).map_err(|e| DatabaseError::MigrationError(format!("Failed to create examinations table: {}", e)))?;

    Ok(())
}

/// Create the monthly rollup table and the per-bucket patient set
fn create_statistics_tables(conn: &Connection) -> Result<(), DatabaseError> {
    info!("Creating monthly statistics tables if not exist");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS monthly_statistics (
            kind TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            total_examinations INTEGER NOT NULL DEFAULT 0,
            unique_patients INTEGER NOT NULL DEFAULT 0,
            controlled_examinations INTEGER NOT NULL DEFAULT 0,
            uncontrolled_examinations INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (kind, year, month)
        );
        CREATE TABLE IF NOT EXISTS monthly_statistics_patients (
            kind TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            patient_id TEXT NOT NULL,
            PRIMARY KEY (kind, year, month, patient_id)
        );"
    ).map_err(|e| DatabaseError::MigrationError(format!("Failed to create statistics tables: {}", e)))?;

    Ok(())
}
