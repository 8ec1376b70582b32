use std::fs;

use serde_json::json;
use tempfile::TempDir;

use health_stats_data::database::{create_sqlite_pool, DatabaseConfig, DatabaseError};
use health_stats_data::models::examination::ExaminationRecord;
use health_stats_data::models::statistics::StatisticsIncrement;
use health_stats_data::repository::{
    ExaminationRepository, ExaminationRepositoryTrait, StatisticsRepository, StatisticsRepositoryTrait,
};

fn file_config(path: &str) -> DatabaseConfig {
    DatabaseConfig {
        sqlite_path: Some(path.to_string()),
        pool_size: 2,
        max_connections: 4,
        timeout_seconds: 5,
        ..DatabaseConfig::default()
    }
}

fn examination(id: &str) -> ExaminationRecord {
    ExaminationRecord {
        id: id.to_string(),
        kind: "ht".to_string(),
        patient_id: "patient-1".to_string(),
        measurement_date: "2024-03-15 08:30:00".to_string(),
        measured_at: "2024-03-15T08:30:00Z".to_string(),
        year: 2024,
        month: 3,
        clinical: json!({ "systolic": 132, "diastolic": 84 }),
        created_at: "2024-03-15T08:31:00+00:00".to_string(),
    }
}

#[tokio::test]
async fn file_database_survives_a_new_pool() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("health_stats.db");
    let config = file_config(db_path.to_str().unwrap());

    {
        let pool = create_sqlite_pool(&config).unwrap();
        let examinations = ExaminationRepository::with_pool(pool.clone());
        let statistics = StatisticsRepository::with_pool(pool);

        examinations.create(examination("exam-1")).await.unwrap();
        statistics
            .apply_increment(StatisticsIncrement {
                kind: "ht".to_string(),
                year: 2024,
                month: 3,
                patient_id: "patient-1".to_string(),
                controlled: Some(true),
            })
            .await
            .unwrap();
    }

    assert!(db_path.exists());

    // Reopening runs the migrations again against the existing file
    let reopened = create_sqlite_pool(&config).unwrap();
    let examinations = ExaminationRepository::with_pool(reopened.clone());
    let statistics = StatisticsRepository::with_pool(reopened);

    let stored = examinations.get_by_id("exam-1").await.unwrap().unwrap();
    assert_eq!(stored, examination("exam-1"));

    let bucket = statistics.get_monthly("ht", 2024, 3).await.unwrap().unwrap();
    assert_eq!(bucket.total_examinations, 1);
    assert_eq!(bucket.unique_patients, 1);
    assert_eq!(bucket.controlled_examinations, 1);
}

#[test]
fn unusable_directory_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let db_path = blocker.join("data").join("health_stats.db");
    let result = create_sqlite_pool(&file_config(db_path.to_str().unwrap()));

    assert!(matches!(result, Err(DatabaseError::DirectoryError { .. })));
}
