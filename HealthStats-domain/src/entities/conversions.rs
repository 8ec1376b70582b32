use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::entities::examination::{ExaminationKind, ExaminationRecord};
use crate::entities::statistics::MonthlyStatistics;
use health_stats_data::models::examination::ExaminationRecord as DataExaminationRecord;
use health_stats_data::models::statistics::MonthlyStatistics as DataMonthlyStatistics;

/// Conversion functions between domain entities and data models
/// These functions follow the pattern convert_to_[target_layer]_[model_name]

/// Helper function to safely parse a string ID to UUID
///
/// When an invalid UUID is provided, it returns a descriptive error message.
pub fn parse_string_to_uuid(id: &str) -> Result<Uuid, String> {
    Uuid::parse_str(id).map_err(|_| format!("Invalid UUID format: {}", id))
}

/// Convert a finalized domain record to its storage model.
///
/// Fails if the pre-persist stage has not derived the measurement period.
pub fn convert_to_data_examination(record: &ExaminationRecord) -> Result<DataExaminationRecord, String> {
    let ((year, month), measured_at) = record
        .measurement_period()
        .zip(record.measured_at())
        .ok_or_else(|| format!("Examination {} has no derived measurement period", record.id))?;
    let measured_at = measured_at.to_rfc3339_opts(SecondsFormat::Secs, true);

    Ok(DataExaminationRecord {
        id: record.id.clone(),
        kind: record.kind.as_tag().to_string(),
        patient_id: record.patient_id.clone(),
        measurement_date: record.measurement_date.clone(),
        measured_at,
        year,
        month,
        clinical: record.clinical.clone(),
        created_at: record.created_at.unwrap_or_else(Utc::now).to_rfc3339(),
    })
}

/// Convert a stored examination back to a domain record
pub fn convert_to_domain_examination(data: DataExaminationRecord) -> Result<ExaminationRecord, String> {
    let kind: ExaminationKind = data.kind.parse()?;
    let created_at = DateTime::parse_from_rfc3339(&data.created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid created_at '{}': {}", data.created_at, e))?;

    let measured_at = DateTime::parse_from_rfc3339(&data.measured_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid measured_at '{}': {}", data.measured_at, e))?;

    let mut record = ExaminationRecord::new(data.patient_id, kind, data.measurement_date, data.clinical);
    record.id = data.id;
    record.created_at = Some(created_at);
    record.set_measurement_period(data.year, data.month);
    record.set_measured_at(measured_at);

    Ok(record)
}

/// Convert a stored rollup bucket to the domain entity
pub fn convert_to_domain_statistics(data: DataMonthlyStatistics) -> Result<MonthlyStatistics, String> {
    let kind: ExaminationKind = data.kind.parse()?;
    let count = |value: i64, field: &str| {
        u64::try_from(value).map_err(|_| format!("Negative {} in rollup: {}", field, value))
    };

    Ok(MonthlyStatistics {
        kind,
        year: data.year,
        month: data.month,
        total_examinations: count(data.total_examinations, "total_examinations")?,
        unique_patients: count(data.unique_patients, "unique_patients")?,
        controlled_examinations: count(data.controlled_examinations, "controlled_examinations")?,
        uncontrolled_examinations: count(data.uncontrolled_examinations, "uncontrolled_examinations")?,
        updated_at: data.updated_at,
    })
}
