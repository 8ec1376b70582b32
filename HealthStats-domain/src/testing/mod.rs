// Testing utilities and mock implementations for the domain layer
// This module is only available in tests or when the "mock" feature is enabled

// Re-export useful test mocks from the data layer
pub use health_stats_data::repository::tests::{MockExaminationRepository, MockStatisticsRepository};

use std::sync::Mutex;
use async_trait::async_trait;

use crate::entities::examination::{ExaminationKind, ExaminationRecord};
use crate::services::statistics::{StatisticsAggregator, StatisticsError};

/// Aggregator that records every call it receives
#[derive(Debug, Default)]
pub struct RecordingAggregator {
    calls: Mutex<Vec<(ExaminationRecord, ExaminationKind)>>,
    should_fail: bool,
}

impl RecordingAggregator {
    /// Create a new recording aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the aggregator to fail every call (calls are still recorded)
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<(ExaminationRecord, ExaminationKind)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StatisticsAggregator for RecordingAggregator {
    async fn process_examination_data(
        &self,
        record: &ExaminationRecord,
        kind: ExaminationKind,
    ) -> Result<(), StatisticsError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((record.clone(), kind));
        }

        if self.should_fail {
            Err(StatisticsError::RepositoryError(
                "Statistics error - aggregator is configured to fail".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}
