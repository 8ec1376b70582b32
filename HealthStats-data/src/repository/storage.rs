use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use crate::models::examination::ExaminationRecord;
use crate::models::statistics::{MonthlyStatistics, StatisticsIncrement};
use crate::database::DatabasePool;
use super::errors::RepositoryError;

const EXAMINATION_COLUMNS: &str =
    "id, kind, patient_id, measurement_date, measured_at, year, month, clinical, created_at";

const STATISTICS_COLUMNS: &str =
    "kind, year, month, total_examinations, unique_patients, controlled_examinations, uncontrolled_examinations, updated_at";

/// Database storage operations for examination records and rollups
pub struct DatabaseStorage;

impl DatabaseStorage {
    /// Store an examination record in the database
    pub async fn store_examination(pool: &DatabasePool, record: &ExaminationRecord) -> Result<(), RepositoryError> {
        debug!("Storing examination in database: id={}, kind={}", record.id, record.kind);

        match pool {
            DatabasePool::SQLite(pool) => {
                let conn = pool.get()?;
                let clinical = serde_json::to_string(&record.clinical)?;

                conn.execute(
                    "INSERT INTO examinations
                     (id, kind, patient_id, measurement_date, measured_at, year, month, clinical, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        &record.id,
                        &record.kind,
                        &record.patient_id,
                        &record.measurement_date,
                        &record.measured_at,
                        record.year,
                        record.month,
                        clinical,
                        &record.created_at,
                    ],
                )?;

                Ok(())
            }
        }
    }

    /// Delete an examination record; returns whether a row was removed
    pub async fn delete_examination(pool: &DatabasePool, id: &str) -> Result<bool, RepositoryError> {
        debug!("Deleting examination from database: id={}", id);

        match pool {
            DatabasePool::SQLite(pool) => {
                let conn = pool.get()?;
                let removed = conn.execute("DELETE FROM examinations WHERE id = ?1", [id])?;
                Ok(removed > 0)
            }
        }
    }

    /// Get an examination record by ID
    pub async fn get_examination(pool: &DatabasePool, id: &str) -> Result<Option<ExaminationRecord>, RepositoryError> {
        debug!("Getting examination by ID from database: id={}", id);

        match pool {
            DatabasePool::SQLite(pool) => {
                let conn = pool.get()?;

                let query = format!("SELECT {} FROM examinations WHERE id = ?1", EXAMINATION_COLUMNS);
                let row = conn
                    .query_row(&query, [id], read_examination_row)
                    .optional()?;

                row.map(into_examination).transpose()
            }
        }
    }

    /// Get the examinations of one kind in a period, oldest measurement first
    pub async fn get_examinations_for_period(
        pool: &DatabasePool,
        kind: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<ExaminationRecord>, RepositoryError> {
        debug!("Getting {} examinations for {}-{:02} from database", kind, year, month);

        match pool {
            DatabasePool::SQLite(pool) => {
                let conn = pool.get()?;

                let query = format!(
                    "SELECT {} FROM examinations
                     WHERE kind = ?1 AND year = ?2 AND month = ?3
                     ORDER BY measured_at ASC, created_at ASC",
                    EXAMINATION_COLUMNS
                );
                let mut stmt = conn.prepare(&query)?;
                let rows = stmt.query_map(params![kind, year, month], read_examination_row)?;

                let mut result = Vec::new();
                for row in rows {
                    result.push(into_examination(row?)?);
                }

                Ok(result)
            }
        }
    }

    /// Apply one examination to its monthly bucket inside a transaction
    pub async fn apply_increment(
        pool: &DatabasePool,
        increment: &StatisticsIncrement,
    ) -> Result<MonthlyStatistics, RepositoryError> {
        debug!(
            "Applying statistics increment in database: kind={}, period={}-{:02}",
            increment.kind, increment.year, increment.month
        );

        match pool {
            DatabasePool::SQLite(pool) => {
                let mut conn = pool.get()?;
                let tx = conn.transaction()?;

                let new_patient = tx.execute(
                    "INSERT OR IGNORE INTO monthly_statistics_patients (kind, year, month, patient_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![&increment.kind, increment.year, increment.month, &increment.patient_id],
                )?;

                let controlled = i64::from(increment.controlled == Some(true));
                let uncontrolled = i64::from(increment.controlled == Some(false));

                tx.execute(
                    "INSERT INTO monthly_statistics
                     (kind, year, month, total_examinations, unique_patients,
                      controlled_examinations, uncontrolled_examinations, updated_at)
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7)
                     ON CONFLICT(kind, year, month) DO UPDATE SET
                        total_examinations = total_examinations + 1,
                        unique_patients = unique_patients + excluded.unique_patients,
                        controlled_examinations = controlled_examinations + excluded.controlled_examinations,
                        uncontrolled_examinations = uncontrolled_examinations + excluded.uncontrolled_examinations,
                        updated_at = excluded.updated_at",
                    params![
                        &increment.kind,
                        increment.year,
                        increment.month,
                        new_patient as i64,
                        controlled,
                        uncontrolled,
                        Utc::now().to_rfc3339(),
                    ],
                )?;

                let query = format!(
                    "SELECT {} FROM monthly_statistics WHERE kind = ?1 AND year = ?2 AND month = ?3",
                    STATISTICS_COLUMNS
                );
                let bucket = tx.query_row(
                    &query,
                    params![&increment.kind, increment.year, increment.month],
                    read_statistics_row,
                )?;

                tx.commit()?;
                Ok(bucket)
            }
        }
    }

    /// Get one monthly bucket
    pub async fn get_monthly(
        pool: &DatabasePool,
        kind: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyStatistics>, RepositoryError> {
        match pool {
            DatabasePool::SQLite(pool) => {
                let conn = pool.get()?;

                let query = format!(
                    "SELECT {} FROM monthly_statistics WHERE kind = ?1 AND year = ?2 AND month = ?3",
                    STATISTICS_COLUMNS
                );
                let bucket = conn
                    .query_row(&query, params![kind, year, month], read_statistics_row)
                    .optional()?;

                Ok(bucket)
            }
        }
    }

    /// Get every bucket of a kind for a year, ordered by month
    pub async fn get_statistics_for_year(
        pool: &DatabasePool,
        kind: &str,
        year: i32,
    ) -> Result<Vec<MonthlyStatistics>, RepositoryError> {
        match pool {
            DatabasePool::SQLite(pool) => {
                let conn = pool.get()?;

                let query = format!(
                    "SELECT {} FROM monthly_statistics WHERE kind = ?1 AND year = ?2 ORDER BY month ASC",
                    STATISTICS_COLUMNS
                );
                let mut stmt = conn.prepare(&query)?;
                let rows = stmt.query_map(params![kind, year], read_statistics_row)?;

                let mut result = Vec::new();
                for row in rows {
                    result.push(row?);
                }

                Ok(result)
            }
        }
    }
}

/// Raw examination row; the clinical column is still JSON text
struct ExaminationRow {
    record: ExaminationRecord,
    clinical: String,
}

fn read_examination_row(row: &Row<'_>) -> rusqlite::Result<ExaminationRow> {
    Ok(ExaminationRow {
        record: ExaminationRecord {
            id: row.get(0)?,
            kind: row.get(1)?,
            patient_id: row.get(2)?,
            measurement_date: row.get(3)?,
            measured_at: row.get(4)?,
            year: row.get(5)?,
            month: row.get::<_, i64>(6)? as u32,
            clinical: serde_json::Value::Null,
            created_at: row.get(8)?,
        },
        clinical: row.get(7)?,
    })
}

fn into_examination(row: ExaminationRow) -> Result<ExaminationRecord, RepositoryError> {
    let mut record = row.record;
    record.clinical = serde_json::from_str(&row.clinical)?;
    Ok(record)
}

fn read_statistics_row(row: &Row<'_>) -> rusqlite::Result<MonthlyStatistics> {
    Ok(MonthlyStatistics {
        kind: row.get(0)?,
        year: row.get(1)?,
        month: row.get::<_, i64>(2)? as u32,
        total_examinations: row.get(3)?,
        unique_patients: row.get(4)?,
        controlled_examinations: row.get(5)?,
        uncontrolled_examinations: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
