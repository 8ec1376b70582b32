use serde::{Deserialize, Serialize};

use super::examination::ExaminationKind;

/// Control assessment of a single examination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlStatus {
    /// Readings within target
    Controlled,
    /// Readings outside target
    Uncontrolled,
    /// Required clinical fields missing
    NotAssessed,
}

impl ControlStatus {
    /// Storage flag: `Some(true)` controlled, `Some(false)` uncontrolled
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ControlStatus::Controlled => Some(true),
            ControlStatus::Uncontrolled => Some(false),
            ControlStatus::NotAssessed => None,
        }
    }
}

/// Rollup of one kind's examinations for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStatistics {
    pub kind: ExaminationKind,
    pub year: i32,
    pub month: u32,

    /// Examinations recorded in the month
    pub total_examinations: u64,

    /// Distinct patients examined in the month
    pub unique_patients: u64,

    /// Examinations assessed as controlled
    pub controlled_examinations: u64,

    /// Examinations assessed as uncontrolled
    pub uncontrolled_examinations: u64,

    /// Last time the rollup changed (RFC 3339)
    pub updated_at: String,
}

impl MonthlyStatistics {
    /// Share of assessed examinations that were controlled
    pub fn control_rate(&self) -> Option<f64> {
        let assessed = self.controlled_examinations + self.uncontrolled_examinations;
        if assessed == 0 {
            None
        } else {
            Some(self.controlled_examinations as f64 / assessed as f64)
        }
    }
}

/// A year of monthly rollups for one kind.
///
/// Unique patients are only meaningful per month, so the yearly totals
/// leave them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlySummary {
    pub kind: ExaminationKind,
    pub year: i32,

    /// Months with at least one examination, in calendar order
    pub months: Vec<MonthlyStatistics>,

    pub total_examinations: u64,
    pub controlled_examinations: u64,
    pub uncontrolled_examinations: u64,
}

impl YearlySummary {
    /// Sum monthly rollups into a yearly summary
    pub fn from_months(kind: ExaminationKind, year: i32, months: Vec<MonthlyStatistics>) -> Self {
        let total_examinations = months.iter().map(|m| m.total_examinations).sum();
        let controlled_examinations = months.iter().map(|m| m.controlled_examinations).sum();
        let uncontrolled_examinations = months.iter().map(|m| m.uncontrolled_examinations).sum();

        Self {
            kind,
            year,
            months,
            total_examinations,
            controlled_examinations,
            uncontrolled_examinations,
        }
    }
}
