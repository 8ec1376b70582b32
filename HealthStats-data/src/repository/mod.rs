// Repository module structure
pub mod errors;
mod examination;
mod in_memory;
mod statistics;
mod storage;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use examination::{ExaminationRepository, ExaminationRepositoryTrait};
pub use statistics::{StatisticsRepository, StatisticsRepositoryTrait};

// Re-export mock repositories for both testing and when mock feature is enabled
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    pub use super::examination::tests::MockExaminationRepository;
    pub use super::statistics::tests::MockStatisticsRepository;
}
