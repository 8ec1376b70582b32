// Domain entities and value objects
pub mod conversions;
pub mod examination;
pub mod statistics;

// Re-export common types for easier imports
pub use examination::{ExaminationKind, ExaminationRecord};
pub use statistics::{ControlStatus, MonthlyStatistics, YearlySummary};
