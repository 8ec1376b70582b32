use serde::{Deserialize, Serialize};

/// Storage model for an examination record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExaminationRecord {
    /// Unique identifier for the examination
    pub id: String,

    /// Examination kind tag ("ht" or "dm")
    pub kind: String,

    /// Patient the examination belongs to
    pub patient_id: String,

    /// Measurement date as supplied by the caller
    pub measurement_date: String,

    /// Measurement instant normalized to UTC (`YYYY-MM-DDTHH:MM:SSZ`), used for ordering
    pub measured_at: String,

    /// Year derived from the measurement date
    pub year: i32,

    /// Month (1-12) derived from the measurement date
    pub month: u32,

    /// Clinical fields, stored verbatim
    pub clinical: serde_json::Value,

    /// When the record was persisted (RFC 3339)
    pub created_at: String,
}
