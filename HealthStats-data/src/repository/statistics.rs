use async_trait::async_trait;
use tracing::debug;

use crate::models::statistics::{MonthlyStatistics, StatisticsIncrement};
use crate::database::{get_db_pool, DatabasePool};
use super::errors::RepositoryError;
use super::in_memory::InMemoryStatisticsStorage;
use super::storage::DatabaseStorage;

/// Repository trait for monthly statistics rollups
#[async_trait]
pub trait StatisticsRepositoryTrait {
    /// Apply one examination to its bucket and return the updated bucket
    async fn apply_increment(&self, increment: StatisticsIncrement) -> Result<MonthlyStatistics, RepositoryError>;

    /// Get the bucket for a kind and period
    async fn get_monthly(&self, kind: &str, year: i32, month: u32) -> Result<Option<MonthlyStatistics>, RepositoryError>;

    /// Get all buckets of a kind for a year, ordered by month
    async fn get_for_year(&self, kind: &str, year: i32) -> Result<Vec<MonthlyStatistics>, RepositoryError>;
}

/// Repository for monthly statistics, with the same backend selection as
/// [`super::ExaminationRepository`]
#[derive(Debug, Clone, Default)]
pub struct StatisticsRepository {
    pool: Option<DatabasePool>,
    storage: InMemoryStatisticsStorage,
}

impl StatisticsRepository {
    /// Create a repository backed by the global pool when it is initialized
    pub fn new() -> Self {
        Self {
            pool: None,
            storage: InMemoryStatisticsStorage::new(),
        }
    }

    /// Create a repository bound to a specific pool
    pub fn with_pool(pool: DatabasePool) -> Self {
        Self {
            pool: Some(pool),
            storage: InMemoryStatisticsStorage::new(),
        }
    }

    fn database(&self) -> Option<DatabasePool> {
        if let Some(pool) = &self.pool {
            return Some(pool.clone());
        }
        match get_db_pool() {
            Ok(pool) => Some(pool),
            Err(e) => {
                debug!("Database not available ({}), using in-memory statistics", e);
                None
            }
        }
    }
}

#[async_trait]
impl StatisticsRepositoryTrait for StatisticsRepository {
    async fn apply_increment(&self, increment: StatisticsIncrement) -> Result<MonthlyStatistics, RepositoryError> {
        if !(1..=12).contains(&increment.month) {
            return Err(RepositoryError::Validation(format!("Month out of range: {}", increment.month)));
        }

        match self.database() {
            Some(pool) => DatabaseStorage::apply_increment(&pool, &increment).await,
            None => self.storage.apply_increment(&increment).await,
        }
    }

    async fn get_monthly(&self, kind: &str, year: i32, month: u32) -> Result<Option<MonthlyStatistics>, RepositoryError> {
        match self.database() {
            Some(pool) => DatabaseStorage::get_monthly(&pool, kind, year, month).await,
            None => self.storage.get_monthly(kind, year, month).await,
        }
    }

    async fn get_for_year(&self, kind: &str, year: i32) -> Result<Vec<MonthlyStatistics>, RepositoryError> {
        match self.database() {
            Some(pool) => DatabaseStorage::get_statistics_for_year(&pool, kind, year).await,
            None => self.storage.get_for_year(kind, year).await,
        }
    }
}

/// Mock statistics repository for testing
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory statistics repository that counts increments and can be
    /// made to fail them
    #[derive(Debug, Clone, Default)]
    pub struct MockStatisticsRepository {
        storage: InMemoryStatisticsStorage,
        fail_increment: Arc<AtomicBool>,
        increments: Arc<AtomicUsize>,
    }

    impl MockStatisticsRepository {
        /// Create a new empty mock repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure the mock to fail every increment
        pub fn with_increment_failure(self) -> Self {
            self.fail_increment.store(true, Ordering::SeqCst);
            self
        }

        /// Number of increments applied successfully
        pub fn increment_count(&self) -> usize {
            self.increments.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatisticsRepositoryTrait for MockStatisticsRepository {
        async fn apply_increment(&self, increment: StatisticsIncrement) -> Result<MonthlyStatistics, RepositoryError> {
            if self.fail_increment.load(Ordering::SeqCst) {
                return Err(RepositoryError::Database(
                    "Repository error - mock is configured to fail increments".to_string().into(),
                ));
            }
            let bucket = self.storage.apply_increment(&increment).await?;
            self.increments.fetch_add(1, Ordering::SeqCst);
            Ok(bucket)
        }

        async fn get_monthly(&self, kind: &str, year: i32, month: u32) -> Result<Option<MonthlyStatistics>, RepositoryError> {
            self.storage.get_monthly(kind, year, month).await
        }

        async fn get_for_year(&self, kind: &str, year: i32) -> Result<Vec<MonthlyStatistics>, RepositoryError> {
            self.storage.get_for_year(kind, year).await
        }
    }
}

#[cfg(test)]
mod storage_tests {
    use super::*;
    use crate::database::create_in_memory_pool;

    fn increment(patient_id: &str, month: u32, controlled: Option<bool>) -> StatisticsIncrement {
        StatisticsIncrement {
            kind: "ht".to_string(),
            year: 2024,
            month,
            patient_id: patient_id.to_string(),
            controlled,
        }
    }

    async fn exercise_rollup(repository: &StatisticsRepository) {
        repository.apply_increment(increment("p-1", 3, Some(true))).await.unwrap();
        repository.apply_increment(increment("p-1", 3, Some(false))).await.unwrap();
        let bucket = repository.apply_increment(increment("p-2", 3, None)).await.unwrap();

        assert_eq!(bucket.total_examinations, 3);
        assert_eq!(bucket.unique_patients, 2);
        assert_eq!(bucket.controlled_examinations, 1);
        assert_eq!(bucket.uncontrolled_examinations, 1);

        repository.apply_increment(increment("p-1", 1, Some(true))).await.unwrap();

        let year = repository.get_for_year("ht", 2024).await.unwrap();
        assert_eq!(year.iter().map(|b| b.month).collect::<Vec<_>>(), vec![1, 3]);

        assert!(repository.get_monthly("dm", 2024, 3).await.unwrap().is_none());
        assert!(repository.get_for_year("ht", 2023).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rollup_in_sqlite() {
        let pool = create_in_memory_pool().unwrap();
        let repository = StatisticsRepository::with_pool(pool);

        exercise_rollup(&repository).await;
    }

    #[tokio::test]
    async fn test_rollup_in_memory() {
        let repository = StatisticsRepository::new();

        exercise_rollup(&repository).await;
    }

    #[tokio::test]
    async fn test_month_out_of_range_is_rejected() {
        let repository = StatisticsRepository::new();

        let result = repository.apply_increment(increment("p-1", 13, None)).await;
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[test]
    fn test_mock_counts_increments() {
        let mock = tests::MockStatisticsRepository::new();

        tokio_test::block_on(mock.apply_increment(increment("p-1", 5, None))).unwrap();
        assert_eq!(mock.increment_count(), 1);

        let failing = tests::MockStatisticsRepository::new().with_increment_failure();
        assert!(tokio_test::block_on(failing.apply_increment(increment("p-1", 5, None))).is_err());
        assert_eq!(failing.increment_count(), 0);
    }
}
