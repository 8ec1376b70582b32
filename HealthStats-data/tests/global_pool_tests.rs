use std::env;

use tempfile::TempDir;

use health_stats_data::database::{
    get_connection_info, get_db_pool, initialize_database_pool, DatabaseConfig, DatabaseError,
};
use health_stats_data::models::statistics::StatisticsIncrement;
use health_stats_data::repository::{StatisticsRepository, StatisticsRepositoryTrait};

// This binary owns the process-wide pool and environment, so everything
// that touches them lives in a single test.
#[tokio::test]
async fn global_pool_is_initialized_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("global").join("health_stats.db");

    env::set_var("DB_TYPE", "sqlite");
    env::set_var("DB_SQLITE_PATH", db_path.to_str().unwrap());
    env::set_var("DB_POOL_SIZE", "2");
    env::set_var("DB_MAX_CONNECTIONS", "3");
    env::set_var("DB_TIMEOUT_SECONDS", "not-a-number");

    let config = DatabaseConfig::from_env().unwrap();
    assert_eq!(config.sqlite_path.as_deref(), db_path.to_str());
    assert_eq!(config.pool_size, 2);
    assert_eq!(config.max_connections, 3);
    assert_eq!(config.timeout_seconds, DatabaseConfig::default().timeout_seconds);

    assert!(matches!(get_db_pool(), Err(DatabaseError::PoolNotInitialized)));
    initialize_database_pool().unwrap();
    assert!(get_db_pool().is_ok());
    assert!(db_path.exists());

    let info = get_connection_info().unwrap();
    assert!(info.contains("health_stats.db"), "unexpected connection info: {info}");

    assert!(matches!(initialize_database_pool(), Err(DatabaseError::PoolAlreadyInitialized)));

    // Repositories without an explicit pool pick up the global one
    let writer = StatisticsRepository::new();
    writer
        .apply_increment(StatisticsIncrement {
            kind: "dm".to_string(),
            year: 2024,
            month: 6,
            patient_id: "patient-9".to_string(),
            controlled: None,
        })
        .await
        .unwrap();

    let reader = StatisticsRepository::new();
    let bucket = reader.get_monthly("dm", 2024, 6).await.unwrap().unwrap();
    assert_eq!(bucket.total_examinations, 1);

    env::set_var("DB_TYPE", "postgres");
    assert!(matches!(DatabaseConfig::from_env(), Err(DatabaseError::UnsupportedDatabaseType(_))));
}
