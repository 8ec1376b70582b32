//! Pipeline configuration loaded from the environment

use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// What the examination service does when statistics aggregation fails
/// after the record has been stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationFailurePolicy {
    /// Remove the stored record and fail the creation
    #[default]
    Abort,
    /// Keep the record, log the failure, report success
    Isolate,
}

impl FromStr for AggregationFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(AggregationFailurePolicy::Abort),
            "isolate" => Ok(AggregationFailurePolicy::Isolate),
            other => Err(format!("Unknown aggregation failure policy: {}", other)),
        }
    }
}

/// Intake pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub failure_policy: AggregationFailurePolicy,
}

impl PipelineConfig {
    /// Read configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let failure_policy = match env::var("STATS_FAILURE_POLICY") {
            Ok(value) => value.parse::<AggregationFailurePolicy>().map_err(|_| ConfigError::InvalidValue {
                key: "STATS_FAILURE_POLICY".to_string(),
                value,
            })?,
            Err(_) => AggregationFailurePolicy::default(),
        };

        info!("Pipeline configuration: failure_policy={:?}", failure_policy);

        Ok(Self { failure_policy })
    }

    /// Load `.env` if present, then read the environment
    pub fn load() -> Result<Self, ConfigError> {
        if dotenv::dotenv().is_err() {
            warn!(".env file not found or couldn't be read. Using environment variables.");
        }
        Self::from_env()
    }
}
