use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{AggregationFailurePolicy, PipelineConfig};
use crate::entities::conversions;
use crate::entities::examination::{ExaminationKind, ExaminationRecord};
use crate::observers::{ExaminationObserver, ObserverError};
use crate::services::statistics::StatisticsAggregator;
use health_stats_data::repository::{ExaminationRepositoryTrait, RepositoryError};

/// Examination service errors
#[derive(Debug, Error)]
pub enum ExaminationServiceError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Record kind does not match the service's kind
    #[error("Kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: ExaminationKind,
        actual: ExaminationKind,
    },

    /// Measurement date could not be parsed
    #[error("Malformed measurement date: {0}")]
    MalformedDate(String),

    /// Statistics aggregation failed and the creation was aborted
    #[error("Statistics aggregation failed: {0}")]
    AggregationError(String),

    /// Statistics aggregation failed and the stored record could not be
    /// removed; the record remains stored without a rollup entry
    #[error("Statistics aggregation failed ({aggregation}) and examination {id} could not be removed: {cleanup}")]
    AbortIncomplete {
        id: String,
        aggregation: String,
        cleanup: String,
    },

    /// Not found error
    #[error("Examination not found: {0}")]
    NotFound(String),

    /// Repository error
    #[error("Repository error: {0}")]
    RepositoryError(String),
}

/// Trait for examination intake operations
#[async_trait]
pub trait ExaminationServiceTrait {
    /// Kind of examination this service accepts
    fn kind(&self) -> ExaminationKind;

    /// Run a new record through the intake pipeline and persist it
    async fn create_examination(&self, record: ExaminationRecord)
        -> Result<ExaminationRecord, ExaminationServiceError>;

    /// Get an examination by ID
    async fn get_examination(&self, id: &str) -> Result<ExaminationRecord, ExaminationServiceError>;

    /// List examinations measured in the given year and month
    async fn list_examinations(&self, year: i32, month: u32)
        -> Result<Vec<ExaminationRecord>, ExaminationServiceError>;
}

/// Examination intake service: the call site that drives the observer
/// stages around persistence
pub struct ExaminationService<R: ExaminationRepositoryTrait> {
    repository: R,
    observer: ExaminationObserver,
    failure_policy: AggregationFailurePolicy,
}

impl<R: ExaminationRepositoryTrait + Send + Sync> ExaminationService<R> {
    /// Create a new examination service with the default failure policy
    pub fn new(repository: R, observer: ExaminationObserver) -> Self {
        Self {
            repository,
            observer,
            failure_policy: AggregationFailurePolicy::default(),
        }
    }

    /// Set the aggregation failure policy
    pub fn with_failure_policy(mut self, policy: AggregationFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Map repository errors to service errors
    fn map_repo_error(&self, err: RepositoryError) -> ExaminationServiceError {
        match err {
            RepositoryError::NotFound(msg) => ExaminationServiceError::NotFound(msg),
            RepositoryError::Validation(msg) => ExaminationServiceError::ValidationError(msg),
            _ => ExaminationServiceError::RepositoryError(err.to_string()),
        }
    }

    /// Apply the failure policy after aggregation failed for a stored record
    async fn handle_aggregation_failure(
        &self,
        record: ExaminationRecord,
        err: ObserverError,
    ) -> Result<ExaminationRecord, ExaminationServiceError> {
        match self.failure_policy {
            AggregationFailurePolicy::Abort => {
                error!("Statistics aggregation failed for examination {}, aborting creation: {}", record.id, err);

                if let Err(e) = self.repository.delete(&record.id).await {
                    error!("Failed to remove examination {} after aggregation failure: {}", record.id, e);
                    return Err(ExaminationServiceError::AbortIncomplete {
                        id: record.id,
                        aggregation: err.to_string(),
                        cleanup: e.to_string(),
                    });
                }

                Err(ExaminationServiceError::AggregationError(err.to_string()))
            }
            AggregationFailurePolicy::Isolate => {
                warn!("Statistics aggregation failed for examination {}, keeping record: {}", record.id, err);
                Ok(record)
            }
        }
    }
}

#[async_trait]
impl<R: ExaminationRepositoryTrait + Send + Sync> ExaminationServiceTrait for ExaminationService<R> {
    fn kind(&self) -> ExaminationKind {
        self.observer.kind()
    }

    async fn create_examination(&self, mut record: ExaminationRecord)
        -> Result<ExaminationRecord, ExaminationServiceError>
    {
        if record.kind != self.kind() {
            return Err(ExaminationServiceError::KindMismatch {
                expected: self.kind(),
                actual: record.kind,
            });
        }

        // Ids must be fetchable through get_examination later
        conversions::parse_string_to_uuid(&record.id)
            .map_err(ExaminationServiceError::ValidationError)?;

        // Creating: derive the period before anything is stored
        self.observer.on_creating(&mut record).map_err(|e| match e {
            ObserverError::MalformedDate(value) => ExaminationServiceError::MalformedDate(value),
            other => ExaminationServiceError::ValidationError(other.to_string()),
        })?;
        record.created_at = Some(Utc::now());

        let data_record = conversions::convert_to_data_examination(&record)
            .map_err(ExaminationServiceError::ValidationError)?;

        self.repository.create(data_record)
            .await
            .map_err(|e| self.map_repo_error(e))?;

        // Created: the record is stored, notify the aggregator
        let notified = self.observer.on_created(&record).await;
        if let Err(err) = notified {
            return self.handle_aggregation_failure(record, err).await;
        }

        info!("Created {} examination {} for patient {}", self.kind(), record.id, record.patient_id);
        Ok(record)
    }

    async fn get_examination(&self, id: &str) -> Result<ExaminationRecord, ExaminationServiceError> {
        conversions::parse_string_to_uuid(id)
            .map_err(ExaminationServiceError::ValidationError)?;

        let data_record = self.repository.get_by_id(id)
            .await
            .map_err(|e| self.map_repo_error(e))?
            .filter(|r| r.kind == self.kind().as_tag())
            .ok_or_else(|| ExaminationServiceError::NotFound(
                format!("{} examination with ID {} not found", self.kind(), id)
            ))?;

        conversions::convert_to_domain_examination(data_record)
            .map_err(ExaminationServiceError::RepositoryError)
    }

    async fn list_examinations(&self, year: i32, month: u32)
        -> Result<Vec<ExaminationRecord>, ExaminationServiceError>
    {
        if !(1..=12).contains(&month) {
            return Err(ExaminationServiceError::ValidationError(
                format!("Month must be between 1 and 12, got {}", month),
            ));
        }

        let data_records = self.repository.get_for_period(self.kind().as_tag(), year, month)
            .await
            .map_err(|e| self.map_repo_error(e))?;

        data_records
            .into_iter()
            .map(conversions::convert_to_domain_examination)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ExaminationServiceError::RepositoryError)
    }
}

/// Create an examination service for `kind` using the repository from the
/// data layer and the failure policy from `.env` / the environment
pub fn create_default_examination_service(
    kind: ExaminationKind,
    statistics: Arc<dyn StatisticsAggregator>,
) -> Result<impl ExaminationServiceTrait + Send + Sync, crate::config::ConfigError> {
    let config = PipelineConfig::load()?;
    let repository = health_stats_data::repository::ExaminationRepository::new();
    let observer = ExaminationObserver::new(kind, statistics);

    Ok(ExaminationService::new(repository, observer).with_failure_policy(config.failure_policy))
}
