// HealthStats Domain
// This crate contains the examination intake pipeline and statistics rollups

// Domain entities
pub mod entities;

// Lifecycle observers run around persistence
pub mod observers;

// Services that implement business logic
pub mod services;

// Pipeline configuration
pub mod config;

// Logging setup
pub mod telemetry;

// Re-export the database module from health_stats_data for convenience
pub use health_stats_data::database;

// Testing utilities - only available in tests or with the mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;
