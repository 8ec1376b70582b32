// Data storage models
pub mod examination;
pub mod statistics;
