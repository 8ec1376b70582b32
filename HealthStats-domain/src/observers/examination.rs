use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

use crate::entities::examination::{ExaminationKind, ExaminationRecord};
use crate::services::statistics::{StatisticsAggregator, StatisticsError};

/// Observer errors
#[derive(Debug, Error)]
pub enum ObserverError {
    /// Measurement date could not be parsed
    #[error("Malformed measurement date: {0:?}")]
    MalformedDate(String),

    /// Statistics aggregation failed after the record was stored
    #[error("Statistics aggregation failed: {0}")]
    Aggregation(#[from] StatisticsError),
}

/// Parse a measurement date into the calendar date its period comes from
/// and the UTC instant used for ordering.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and
/// RFC 3339. Values without an offset are taken as UTC, a bare date as
/// midnight. For RFC 3339 the calendar date in the given offset is used.
fn parse_measurement_date(measurement_date: &str) -> Result<(NaiveDate, DateTime<Utc>), ObserverError> {
    let value = measurement_date.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok((dt.date_naive(), dt.with_timezone(&Utc)));
    }

    let naive = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::default()))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ObserverError::MalformedDate(measurement_date.to_string()))?;

    Ok((naive.date(), Utc.from_utc_datetime(&naive)))
}

/// Derive the measurement period (year, month) from a measurement date
pub fn derive_measurement_period(measurement_date: &str) -> Result<(i32, u32), ObserverError> {
    let (date, _) = parse_measurement_date(measurement_date)?;
    Ok((date.year(), date.month()))
}

/// Lifecycle observer for one examination kind.
///
/// `on_creating` runs before the record is stored and `on_created` after;
/// the kind passed to the aggregator is the one fixed at construction.
#[derive(Clone)]
pub struct ExaminationObserver {
    kind: ExaminationKind,
    statistics: Arc<dyn StatisticsAggregator>,
}

impl ExaminationObserver {
    /// Create an observer for the given kind
    pub fn new(kind: ExaminationKind, statistics: Arc<dyn StatisticsAggregator>) -> Self {
        Self { kind, statistics }
    }

    /// Observer for hypertension examinations
    pub fn hypertension(statistics: Arc<dyn StatisticsAggregator>) -> Self {
        Self::new(ExaminationKind::Ht, statistics)
    }

    /// Observer for diabetes mellitus examinations
    pub fn diabetes(statistics: Arc<dyn StatisticsAggregator>) -> Self {
        Self::new(ExaminationKind::Dm, statistics)
    }

    pub fn kind(&self) -> ExaminationKind {
        self.kind
    }

    /// Pre-persist stage: derive year, month and the normalized measurement
    /// instant from the measurement date
    pub fn on_creating(&self, record: &mut ExaminationRecord) -> Result<(), ObserverError> {
        let (date, measured_at) = parse_measurement_date(&record.measurement_date)?;
        let (year, month) = (date.year(), date.month());
        record.set_measurement_period(year, month);
        record.set_measured_at(measured_at);

        debug!("Derived period {}-{:02} for {} examination {}", year, month, self.kind, record.id);
        Ok(())
    }

    /// Post-persist stage: hand the stored record to the aggregator
    pub async fn on_created(&self, record: &ExaminationRecord) -> Result<(), ObserverError> {
        debug!("Forwarding {} examination {} to statistics", self.kind, record.id);

        self.statistics
            .process_examination_data(record, self.kind)
            .await?;

        Ok(())
    }
}

impl std::fmt::Debug for ExaminationObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExaminationObserver")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
