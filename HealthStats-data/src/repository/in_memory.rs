use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use chrono::Utc;

use crate::models::examination::ExaminationRecord;
use crate::models::statistics::{MonthlyStatistics, StatisticsIncrement};
use super::errors::RepositoryError;

/// Key of a monthly rollup bucket: (kind, year, month)
type BucketKey = (String, i32, u32);

/// In-memory storage for examination records
#[derive(Debug, Clone, Default)]
pub struct InMemoryExaminationStorage {
    examinations: Arc<Mutex<HashMap<String, ExaminationRecord>>>,
}

impl InMemoryExaminationStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record in memory, rejecting duplicate ids
    pub async fn store(&self, record: &ExaminationRecord) -> Result<ExaminationRecord, RepositoryError> {
        let mut store = self.examinations.lock()?;
        if store.contains_key(&record.id) {
            return Err(RepositoryError::Validation(format!("Duplicate examination id: {}", record.id)));
        }
        store.insert(record.id.clone(), record.clone());
        Ok(record.clone())
    }

    /// Remove a record; returns whether it existed
    pub async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let mut store = self.examinations.lock()?;
        Ok(store.remove(id).is_some())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<ExaminationRecord>, RepositoryError> {
        let store = self.examinations.lock()?;
        Ok(store.get(id).cloned())
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<usize, RepositoryError> {
        let store = self.examinations.lock()?;
        Ok(store.len())
    }

    /// Records of one kind in a period, oldest measurement first
    pub async fn get_for_period(
        &self,
        kind: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<ExaminationRecord>, RepositoryError> {
        let store = self.examinations.lock()?;

        let mut records: Vec<ExaminationRecord> = store
            .values()
            .filter(|r| r.kind == kind && r.year == year && r.month == month)
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            a.measured_at
                .cmp(&b.measured_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        Ok(records)
    }
}

#[derive(Debug, Default)]
struct StatisticsState {
    buckets: HashMap<BucketKey, MonthlyStatistics>,
    patients: HashMap<BucketKey, HashSet<String>>,
}

/// In-memory storage for monthly statistics
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatisticsStorage {
    state: Arc<Mutex<StatisticsState>>,
}

impl InMemoryStatisticsStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one examination to its bucket under a single lock
    pub async fn apply_increment(&self, increment: &StatisticsIncrement) -> Result<MonthlyStatistics, RepositoryError> {
        let mut state = self.state.lock()?;
        let key: BucketKey = (increment.kind.clone(), increment.year, increment.month);

        let new_patient = state
            .patients
            .entry(key.clone())
            .or_default()
            .insert(increment.patient_id.clone());

        let bucket = state.buckets.entry(key).or_insert_with(|| MonthlyStatistics {
            kind: increment.kind.clone(),
            year: increment.year,
            month: increment.month,
            total_examinations: 0,
            unique_patients: 0,
            controlled_examinations: 0,
            uncontrolled_examinations: 0,
            updated_at: String::new(),
        });

        bucket.total_examinations += 1;
        if new_patient {
            bucket.unique_patients += 1;
        }
        match increment.controlled {
            Some(true) => bucket.controlled_examinations += 1,
            Some(false) => bucket.uncontrolled_examinations += 1,
            None => {}
        }
        bucket.updated_at = Utc::now().to_rfc3339();

        Ok(bucket.clone())
    }

    pub async fn get_monthly(&self, kind: &str, year: i32, month: u32) -> Result<Option<MonthlyStatistics>, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state.buckets.get(&(kind.to_string(), year, month)).cloned())
    }

    /// All buckets of a kind for a year, ordered by month
    pub async fn get_for_year(&self, kind: &str, year: i32) -> Result<Vec<MonthlyStatistics>, RepositoryError> {
        let state = self.state.lock()?;

        let mut buckets: Vec<MonthlyStatistics> = state
            .buckets
            .values()
            .filter(|b| b.kind == kind && b.year == year)
            .cloned()
            .collect();
        buckets.sort_by_key(|b| b.month);

        Ok(buckets)
    }
}
