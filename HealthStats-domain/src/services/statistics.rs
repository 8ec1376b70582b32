use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::entities::conversions;
use crate::entities::examination::{ExaminationKind, ExaminationRecord};
use crate::entities::statistics::{ControlStatus, MonthlyStatistics, YearlySummary};
use health_stats_data::models::statistics::StatisticsIncrement;
use health_stats_data::repository::{RepositoryError, StatisticsRepositoryTrait};

/// Systolic target for a controlled hypertension examination (exclusive)
const HT_SYSTOLIC_TARGET: f64 = 140.0;

/// Diastolic target for a controlled hypertension examination (exclusive)
const HT_DIASTOLIC_TARGET: f64 = 90.0;

/// HbA1c target (%) for a controlled diabetes examination (exclusive)
const DM_HBA1C_TARGET: f64 = 7.0;

/// Fasting glucose target range (mg/dL), inclusive
const DM_FASTING_GLUCOSE_RANGE: (f64, f64) = (80.0, 130.0);

/// Statistics service errors
#[derive(Debug, Error)]
pub enum StatisticsError {
    /// Record reached aggregation without a derived measurement period
    #[error("Incomplete record: {0}")]
    IncompleteRecord(String),

    /// Requested period is out of range
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Repository error
    #[error("Repository error: {0}")]
    RepositoryError(String),
}

/// Receiver of newly created examinations.
///
/// Called once per successful creation with the observer's fixed kind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatisticsAggregator: Send + Sync {
    /// Fold a persisted examination into the rollups for `kind`
    async fn process_examination_data(
        &self,
        record: &ExaminationRecord,
        kind: ExaminationKind,
    ) -> Result<(), StatisticsError>;
}

/// Assess whether an examination's readings are within target for `kind`
pub fn assess_control(kind: ExaminationKind, record: &ExaminationRecord) -> ControlStatus {
    let within = match kind {
        ExaminationKind::Ht => {
            match (record.clinical_number("systolic"), record.clinical_number("diastolic")) {
                (Some(systolic), Some(diastolic)) => {
                    Some(systolic < HT_SYSTOLIC_TARGET && diastolic < HT_DIASTOLIC_TARGET)
                }
                _ => None,
            }
        }
        ExaminationKind::Dm => {
            if let Some(hba1c) = record.clinical_number("hba1c") {
                Some(hba1c < DM_HBA1C_TARGET)
            } else {
                let (low, high) = DM_FASTING_GLUCOSE_RANGE;
                record
                    .clinical_number("fasting_glucose")
                    .map(|glucose| (low..=high).contains(&glucose))
            }
        }
    };

    match within {
        Some(true) => ControlStatus::Controlled,
        Some(false) => ControlStatus::Uncontrolled,
        None => ControlStatus::NotAssessed,
    }
}

/// Maintains monthly rollups as examinations are created
pub struct RealTimeStatisticsService<R: StatisticsRepositoryTrait> {
    repository: R,
}

impl<R: StatisticsRepositoryTrait + Send + Sync> RealTimeStatisticsService<R> {
    /// Create a new statistics service
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Map repository errors to service errors
    fn map_repo_error(&self, err: RepositoryError) -> StatisticsError {
        match err {
            RepositoryError::Validation(msg) => StatisticsError::InvalidPeriod(msg),
            _ => StatisticsError::RepositoryError(err.to_string()),
        }
    }

    /// Get the rollup for one kind and month, if anything was recorded
    pub async fn get_monthly_statistics(
        &self,
        kind: ExaminationKind,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyStatistics>, StatisticsError> {
        validate_month(month)?;

        let bucket = self.repository
            .get_monthly(kind.as_tag(), year, month)
            .await
            .map_err(|e| self.map_repo_error(e))?;

        bucket
            .map(conversions::convert_to_domain_statistics)
            .transpose()
            .map_err(StatisticsError::RepositoryError)
    }

    /// Get the yearly summary for one kind
    pub async fn get_yearly_summary(
        &self,
        kind: ExaminationKind,
        year: i32,
    ) -> Result<YearlySummary, StatisticsError> {
        let buckets = self.repository
            .get_for_year(kind.as_tag(), year)
            .await
            .map_err(|e| self.map_repo_error(e))?;

        let months = buckets
            .into_iter()
            .map(conversions::convert_to_domain_statistics)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StatisticsError::RepositoryError)?;

        Ok(YearlySummary::from_months(kind, year, months))
    }
}

#[async_trait]
impl<R: StatisticsRepositoryTrait + Send + Sync> StatisticsAggregator for RealTimeStatisticsService<R> {
    async fn process_examination_data(
        &self,
        record: &ExaminationRecord,
        kind: ExaminationKind,
    ) -> Result<(), StatisticsError> {
        let (year, month) = record.measurement_period().ok_or_else(|| {
            StatisticsError::IncompleteRecord(format!(
                "Examination {} has no derived measurement period",
                record.id
            ))
        })?;

        let status = assess_control(kind, record);
        debug!("Examination {} assessed as {:?}", record.id, status);

        let increment = StatisticsIncrement {
            kind: kind.as_tag().to_string(),
            year,
            month,
            patient_id: record.patient_id.clone(),
            controlled: status.as_flag(),
        };

        let bucket = self.repository
            .apply_increment(increment)
            .await
            .map_err(|e| self.map_repo_error(e))?;

        info!(
            "Updated {} statistics for {}-{:02}: total={}, unique_patients={}",
            kind, year, month, bucket.total_examinations, bucket.unique_patients
        );

        Ok(())
    }
}

fn validate_month(month: u32) -> Result<(), StatisticsError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(StatisticsError::InvalidPeriod(format!("Month must be between 1 and 12, got {}", month)))
    }
}

/// Create a statistics service using the repository from data layer
pub fn create_default_statistics_service(
) -> RealTimeStatisticsService<health_stats_data::repository::StatisticsRepository> {
    RealTimeStatisticsService::new(health_stats_data::repository::StatisticsRepository::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_stats_data::repository::tests::MockStatisticsRepository;
    use serde_json::json;

    fn finalized(kind: ExaminationKind, patient_id: &str, clinical: serde_json::Value) -> ExaminationRecord {
        let mut record = ExaminationRecord::new(patient_id, kind, "2024-03-15", clinical);
        record.set_measurement_period(2024, 3);
        record
    }

    #[test]
    fn test_assess_hypertension_control() {
        let controlled = finalized(ExaminationKind::Ht, "p", json!({ "systolic": 128, "diastolic": 82 }));
        let high_systolic = finalized(ExaminationKind::Ht, "p", json!({ "systolic": 140, "diastolic": 70 }));
        let high_diastolic = finalized(ExaminationKind::Ht, "p", json!({ "systolic": 120, "diastolic": 90 }));
        let partial = finalized(ExaminationKind::Ht, "p", json!({ "systolic": 120 }));
        let not_numbers = finalized(ExaminationKind::Ht, "p", json!({ "systolic": "NaN", "diastolic": "inf" }));

        assert_eq!(assess_control(ExaminationKind::Ht, &controlled), ControlStatus::Controlled);
        assert_eq!(assess_control(ExaminationKind::Ht, &high_systolic), ControlStatus::Uncontrolled);
        assert_eq!(assess_control(ExaminationKind::Ht, &high_diastolic), ControlStatus::Uncontrolled);
        assert_eq!(assess_control(ExaminationKind::Ht, &partial), ControlStatus::NotAssessed);
        assert_eq!(assess_control(ExaminationKind::Ht, &not_numbers), ControlStatus::NotAssessed);
    }

    #[test]
    fn test_assess_diabetes_control() {
        let hba1c_ok = finalized(ExaminationKind::Dm, "p", json!({ "hba1c": 6.9, "fasting_glucose": 200 }));
        let hba1c_high = finalized(ExaminationKind::Dm, "p", json!({ "hba1c": 7.0 }));
        let glucose_ok = finalized(ExaminationKind::Dm, "p", json!({ "fasting_glucose": 130 }));
        let glucose_low = finalized(ExaminationKind::Dm, "p", json!({ "fasting_glucose": 70 }));
        let nothing = finalized(ExaminationKind::Dm, "p", json!({ "hba1c": "n/a" }));
        let nan_hba1c = finalized(ExaminationKind::Dm, "p", json!({ "hba1c": "NaN", "fasting_glucose": 110 }));
        let infinite = finalized(ExaminationKind::Dm, "p", json!({ "hba1c": "-inf", "fasting_glucose": "infinity" }));

        assert_eq!(assess_control(ExaminationKind::Dm, &hba1c_ok), ControlStatus::Controlled);
        assert_eq!(assess_control(ExaminationKind::Dm, &hba1c_high), ControlStatus::Uncontrolled);
        assert_eq!(assess_control(ExaminationKind::Dm, &glucose_ok), ControlStatus::Controlled);
        assert_eq!(assess_control(ExaminationKind::Dm, &glucose_low), ControlStatus::Uncontrolled);
        assert_eq!(assess_control(ExaminationKind::Dm, &nothing), ControlStatus::NotAssessed);
        assert_eq!(assess_control(ExaminationKind::Dm, &nan_hba1c), ControlStatus::Controlled);
        assert_eq!(assess_control(ExaminationKind::Dm, &infinite), ControlStatus::NotAssessed);
    }

    #[tokio::test]
    async fn test_process_examination_updates_rollup() {
        let service = RealTimeStatisticsService::new(MockStatisticsRepository::new());

        let first = finalized(ExaminationKind::Ht, "patient-1", json!({ "systolic": 128, "diastolic": 82 }));
        let second = finalized(ExaminationKind::Ht, "patient-1", json!({ "systolic": 150, "diastolic": 95 }));
        let third = finalized(ExaminationKind::Ht, "patient-2", json!({}));

        for record in [&first, &second, &third] {
            service.process_examination_data(record, ExaminationKind::Ht).await.unwrap();
        }

        let stats = service
            .get_monthly_statistics(ExaminationKind::Ht, 2024, 3)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.total_examinations, 3);
        assert_eq!(stats.unique_patients, 2);
        assert_eq!(stats.controlled_examinations, 1);
        assert_eq!(stats.uncontrolled_examinations, 1);
    }

    #[tokio::test]
    async fn test_non_finite_readings_count_toward_total_only() {
        let service = RealTimeStatisticsService::new(MockStatisticsRepository::new());
        let record = finalized(ExaminationKind::Ht, "patient-1", json!({ "systolic": "NaN", "diastolic": "inf" }));

        service.process_examination_data(&record, ExaminationKind::Ht).await.unwrap();

        let stats = service.get_monthly_statistics(ExaminationKind::Ht, 2024, 3).await.unwrap().unwrap();
        assert_eq!(stats.total_examinations, 1);
        assert_eq!(stats.controlled_examinations, 0);
        assert_eq!(stats.uncontrolled_examinations, 0);
    }

    #[tokio::test]
    async fn test_process_uses_given_kind_not_record_kind() {
        let service = RealTimeStatisticsService::new(MockStatisticsRepository::new());
        let record = finalized(ExaminationKind::Ht, "patient-1", json!({}));

        service.process_examination_data(&record, ExaminationKind::Dm).await.unwrap();

        assert!(service.get_monthly_statistics(ExaminationKind::Dm, 2024, 3).await.unwrap().is_some());
        assert!(service.get_monthly_statistics(ExaminationKind::Ht, 2024, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_rejects_record_without_period() {
        let repository = MockStatisticsRepository::new();
        let service = RealTimeStatisticsService::new(repository.clone());
        let record = ExaminationRecord::new("patient-1", ExaminationKind::Dm, "2024-03-15", json!({}));

        let result = service.process_examination_data(&record, ExaminationKind::Dm).await;

        assert!(matches!(result, Err(StatisticsError::IncompleteRecord(_))));
        assert_eq!(repository.increment_count(), 0);
    }

    #[tokio::test]
    async fn test_repository_failure_propagates() {
        let service = RealTimeStatisticsService::new(MockStatisticsRepository::new().with_increment_failure());
        let record = finalized(ExaminationKind::Dm, "patient-1", json!({}));

        let result = service.process_examination_data(&record, ExaminationKind::Dm).await;
        assert!(matches!(result, Err(StatisticsError::RepositoryError(_))));
    }

    #[tokio::test]
    async fn test_yearly_summary() {
        let service = RealTimeStatisticsService::new(MockStatisticsRepository::new());

        let mut january = ExaminationRecord::new("patient-1", ExaminationKind::Dm, "2024-01-09", json!({ "hba1c": 6.1 }));
        january.set_measurement_period(2024, 1);
        let march = finalized(ExaminationKind::Dm, "patient-1", json!({ "hba1c": 8.2 }));

        service.process_examination_data(&march, ExaminationKind::Dm).await.unwrap();
        service.process_examination_data(&january, ExaminationKind::Dm).await.unwrap();

        let summary = service.get_yearly_summary(ExaminationKind::Dm, 2024).await.unwrap();
        assert_eq!(summary.months.iter().map(|m| m.month).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(summary.total_examinations, 2);
        assert_eq!(summary.controlled_examinations, 1);
        assert_eq!(summary.uncontrolled_examinations, 1);
    }

    #[tokio::test]
    async fn test_invalid_month_is_rejected() {
        let service = RealTimeStatisticsService::new(MockStatisticsRepository::new());

        let result = service.get_monthly_statistics(ExaminationKind::Ht, 2024, 0).await;
        assert!(matches!(result, Err(StatisticsError::InvalidPeriod(_))));
    }
}
