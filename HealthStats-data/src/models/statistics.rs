use serde::{Deserialize, Serialize};

/// Storage model for one monthly rollup bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyStatistics {
    /// Examination kind tag ("ht" or "dm")
    pub kind: String,

    pub year: i32,

    pub month: u32,

    /// Number of examinations recorded in the bucket
    pub total_examinations: i64,

    /// Number of distinct patients seen in the bucket
    pub unique_patients: i64,

    /// Examinations assessed as controlled
    pub controlled_examinations: i64,

    /// Examinations assessed as uncontrolled
    pub uncontrolled_examinations: i64,

    /// Last time the bucket changed (RFC 3339)
    pub updated_at: String,
}

/// A single examination's contribution to a monthly bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsIncrement {
    pub kind: String,
    pub year: i32,
    pub month: u32,
    pub patient_id: String,

    /// `Some(true)` controlled, `Some(false)` uncontrolled, `None` not assessed
    pub controlled: Option<bool>,
}
