use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of examination, fixed per observer and per service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaminationKind {
    /// Hypertension examination
    Ht,
    /// Diabetes mellitus examination
    Dm,
}

impl ExaminationKind {
    /// Tag used on the wire and in storage ("ht" or "dm")
    pub fn as_tag(&self) -> &'static str {
        match self {
            ExaminationKind::Ht => "ht",
            ExaminationKind::Dm => "dm",
        }
    }
}

impl fmt::Display for ExaminationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for ExaminationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ht" => Ok(ExaminationKind::Ht),
            "dm" => Ok(ExaminationKind::Dm),
            other => Err(format!("Unknown examination kind: {}", other)),
        }
    }
}

/// An examination record moving through the intake pipeline.
///
/// `year`, `derived_month` and `measured_at` cannot be supplied by callers:
/// they start empty and are filled in from `measurement_date` by the
/// observer's pre-persist stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExaminationRecord {
    /// Unique identifier for the examination
    pub id: String,

    /// Patient the examination belongs to
    pub patient_id: String,

    /// Examination kind
    pub kind: ExaminationKind,

    /// When the measurement was taken, as supplied by the request layer
    pub measurement_date: String,

    /// Year of the measurement date
    #[serde(skip_deserializing)]
    year: Option<i32>,

    /// Month (1-12) of the measurement date
    #[serde(skip_deserializing)]
    derived_month: Option<u32>,

    /// Measurement instant in UTC; listings are ordered by it
    #[serde(skip_deserializing)]
    measured_at: Option<DateTime<Utc>>,

    /// Clinical fields; opaque to the pipeline except for control assessment
    #[serde(default)]
    pub clinical: serde_json::Value,

    /// When the record was persisted
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ExaminationRecord {
    /// Create a not-yet-persisted record with a fresh id
    pub fn new(
        patient_id: impl Into<String>,
        kind: ExaminationKind,
        measurement_date: impl Into<String>,
        clinical: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            patient_id: patient_id.into(),
            kind,
            measurement_date: measurement_date.into(),
            year: None,
            derived_month: None,
            measured_at: None,
            clinical,
            created_at: None,
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn derived_month(&self) -> Option<u32> {
        self.derived_month
    }

    /// The derived (year, month) pair, once the pre-persist stage has run
    pub fn measurement_period(&self) -> Option<(i32, u32)> {
        self.year.zip(self.derived_month)
    }

    pub fn measured_at(&self) -> Option<DateTime<Utc>> {
        self.measured_at
    }

    pub(crate) fn set_measurement_period(&mut self, year: i32, month: u32) {
        self.year = Some(year);
        self.derived_month = Some(month);
    }

    pub(crate) fn set_measured_at(&mut self, measured_at: DateTime<Utc>) {
        self.measured_at = Some(measured_at);
    }

    /// Read a numeric clinical field. Finite numbers and numeric strings
    /// are accepted; anything else (including "NaN" and "inf") counts as
    /// absent.
    pub fn clinical_number(&self, field: &str) -> Option<f64> {
        let value = match self.clinical.get(field)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }
}
