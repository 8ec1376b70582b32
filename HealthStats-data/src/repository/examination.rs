use async_trait::async_trait;
use tracing::debug;

use crate::models::examination::ExaminationRecord;
use crate::database::{get_db_pool, DatabasePool};
use super::errors::RepositoryError;
use super::in_memory::InMemoryExaminationStorage;
use super::storage::DatabaseStorage;

/// Repository trait for examination records
#[async_trait]
pub trait ExaminationRepositoryTrait {
    /// Persist a finalized examination record
    async fn create(&self, record: ExaminationRecord) -> Result<ExaminationRecord, RepositoryError>;

    /// Remove an examination record; returns whether it existed
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;

    /// Get an examination record by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<ExaminationRecord>, RepositoryError>;

    /// Get the records of one kind measured in the given year and month
    async fn get_for_period(
        &self,
        kind: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<ExaminationRecord>, RepositoryError>;
}

/// Repository for examination records.
///
/// Uses an explicitly supplied pool, otherwise the global pool, otherwise
/// in-memory storage. Database errors are returned to the caller rather
/// than retried against memory.
#[derive(Debug, Clone, Default)]
pub struct ExaminationRepository {
    pool: Option<DatabasePool>,
    storage: InMemoryExaminationStorage,
}

impl ExaminationRepository {
    /// Create a repository backed by the global pool when it is initialized
    pub fn new() -> Self {
        Self {
            pool: None,
            storage: InMemoryExaminationStorage::new(),
        }
    }

    /// Create a repository bound to a specific pool
    pub fn with_pool(pool: DatabasePool) -> Self {
        Self {
            pool: Some(pool),
            storage: InMemoryExaminationStorage::new(),
        }
    }

    fn database(&self) -> Option<DatabasePool> {
        if let Some(pool) = &self.pool {
            return Some(pool.clone());
        }
        match get_db_pool() {
            Ok(pool) => Some(pool),
            Err(e) => {
                debug!("Database not available ({}), using in-memory storage", e);
                None
            }
        }
    }
}

#[async_trait]
impl ExaminationRepositoryTrait for ExaminationRepository {
    async fn create(&self, record: ExaminationRecord) -> Result<ExaminationRecord, RepositoryError> {
        match self.database() {
            Some(pool) => {
                DatabaseStorage::store_examination(&pool, &record).await?;
                Ok(record)
            }
            None => self.storage.store(&record).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        match self.database() {
            Some(pool) => DatabaseStorage::delete_examination(&pool, id).await,
            None => self.storage.delete(id).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ExaminationRecord>, RepositoryError> {
        match self.database() {
            Some(pool) => DatabaseStorage::get_examination(&pool, id).await,
            None => self.storage.get_by_id(id).await,
        }
    }

    async fn get_for_period(
        &self,
        kind: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<ExaminationRecord>, RepositoryError> {
        match self.database() {
            Some(pool) => DatabaseStorage::get_examinations_for_period(&pool, kind, year, month).await,
            None => self.storage.get_for_period(kind, year, month).await,
        }
    }
}

/// Mock examination repository for testing
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// In-memory repository whose writes can be made to fail on demand
    #[derive(Debug, Clone, Default)]
    pub struct MockExaminationRepository {
        storage: InMemoryExaminationStorage,
        fail_create: Arc<AtomicBool>,
        fail_delete: Arc<AtomicBool>,
    }

    impl MockExaminationRepository {
        /// Create a new empty mock repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure the mock to fail every create
        pub fn with_create_failure(self) -> Self {
            self.fail_create.store(true, Ordering::SeqCst);
            self
        }

        /// Configure the mock to fail every delete
        pub fn with_delete_failure(self) -> Self {
            self.fail_delete.store(true, Ordering::SeqCst);
            self
        }

        /// Number of records currently stored
        pub async fn count(&self) -> usize {
            self.storage.count().await.unwrap_or(0)
        }
    }

    #[async_trait]
    impl ExaminationRepositoryTrait for MockExaminationRepository {
        async fn create(&self, record: ExaminationRecord) -> Result<ExaminationRecord, RepositoryError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(RepositoryError::Database(
                    "Repository error - mock is configured to fail creation".to_string().into(),
                ));
            }
            self.storage.store(&record).await
        }

        async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(RepositoryError::Database(
                    "Repository error - mock is configured to fail deletion".to_string().into(),
                ));
            }
            self.storage.delete(id).await
        }

        async fn get_by_id(&self, id: &str) -> Result<Option<ExaminationRecord>, RepositoryError> {
            self.storage.get_by_id(id).await
        }

        async fn get_for_period(
            &self,
            kind: &str,
            year: i32,
            month: u32,
        ) -> Result<Vec<ExaminationRecord>, RepositoryError> {
            self.storage.get_for_period(kind, year, month).await
        }
    }
}

#[cfg(test)]
mod storage_tests {
    use super::*;
    use crate::database::create_in_memory_pool;
    use serde_json::json;

    fn record(id: &str, kind: &str, measurement_date: &str, month: u32) -> ExaminationRecord {
        ExaminationRecord {
            id: id.to_string(),
            kind: kind.to_string(),
            patient_id: "patient-1".to_string(),
            measurement_date: measurement_date.to_string(),
            measured_at: format!("{}T00:00:00Z", measurement_date),
            year: 2024,
            month,
            clinical: json!({ "systolic": 128, "diastolic": 82 }),
            created_at: "2024-03-20T10:00:00+00:00".to_string(),
        }
    }

    async fn exercise_repository(repository: &ExaminationRepository) {
        repository.create(record("b", "ht", "2024-03-15", 3)).await.unwrap();
        repository.create(record("a", "ht", "2024-03-02", 3)).await.unwrap();
        repository.create(record("c", "dm", "2024-03-10", 3)).await.unwrap();
        repository.create(record("d", "ht", "2024-04-01", 4)).await.unwrap();

        let stored = repository.get_by_id("b").await.unwrap().unwrap();
        assert_eq!(stored, record("b", "ht", "2024-03-15", 3));

        let march: Vec<String> = repository
            .get_for_period("ht", 2024, 3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(march, vec!["a".to_string(), "b".to_string()]);

        assert!(repository.delete("b").await.unwrap());
        assert!(!repository.delete("b").await.unwrap());
        assert!(repository.get_by_id("b").await.unwrap().is_none());
    }

    async fn exercise_ordering(repository: &ExaminationRepository) {
        // Raw dates in mixed formats; only the normalized instants sort correctly
        let mut late = record("late", "ht", "2024-03-15 10:00:00", 3);
        late.measured_at = "2024-03-15T10:00:00Z".to_string();
        let mut early = record("early", "ht", "2024-03-15T09:00:00", 3);
        early.measured_at = "2024-03-15T09:00:00Z".to_string();
        let mut earliest = record("earliest", "ht", "2024-03-15T12:30:00+05:00", 3);
        earliest.measured_at = "2024-03-15T07:30:00Z".to_string();

        repository.create(late).await.unwrap();
        repository.create(early).await.unwrap();
        repository.create(earliest).await.unwrap();

        let ids: Vec<String> = repository
            .get_for_period("ht", 2024, 3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["earliest", "early", "late"]);
    }

    #[tokio::test]
    async fn test_period_listing_follows_measured_at_in_sqlite() {
        let pool = create_in_memory_pool().unwrap();
        exercise_ordering(&ExaminationRepository::with_pool(pool)).await;
    }

    #[tokio::test]
    async fn test_period_listing_follows_measured_at_in_memory() {
        exercise_ordering(&ExaminationRepository::new()).await;
    }

    #[tokio::test]
    async fn test_repository_in_sqlite() {
        let pool = create_in_memory_pool().unwrap();
        let repository = ExaminationRepository::with_pool(pool);

        exercise_repository(&repository).await;
    }

    #[tokio::test]
    async fn test_repository_in_memory() {
        let repository = ExaminationRepository::new();

        exercise_repository(&repository).await;
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let pool = create_in_memory_pool().unwrap();
        let repository = ExaminationRepository::with_pool(pool);

        repository.create(record("dup", "ht", "2024-03-15", 3)).await.unwrap();
        let result = repository.create(record("dup", "ht", "2024-03-15", 3)).await;
        assert!(matches!(result, Err(RepositoryError::Sqlite(_))));
    }

    #[tokio::test]
    async fn test_mock_create_failure() {
        let repository = tests::MockExaminationRepository::new().with_create_failure();

        assert!(repository.create(record("x", "dm", "2024-03-15", 3)).await.is_err());
        assert_eq!(repository.count().await, 0);
    }
}
