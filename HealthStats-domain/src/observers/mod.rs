// Lifecycle observers for examination records
pub mod examination;

pub use examination::{derive_measurement_period, ExaminationObserver, ObserverError};
