pub mod examination;
pub mod statistics;

// Domain services
// This module contains business logic implementations.

// Re-export service traits and factory functions
pub use examination::{
    create_default_examination_service, ExaminationService, ExaminationServiceError, ExaminationServiceTrait,
};
pub use statistics::{
    assess_control, create_default_statistics_service, RealTimeStatisticsService, StatisticsAggregator,
    StatisticsError,
};
