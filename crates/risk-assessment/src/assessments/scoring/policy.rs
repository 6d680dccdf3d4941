use serde::{Deserialize, Serialize};

use super::grade::GradeScale;

pub const DEFAULT_THRESHOLD_HIGH: u8 = 80;
pub const DEFAULT_THRESHOLD_MEDIUM: u8 = 50;

/// Three-level risk classification. A higher score percentage means lower risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRating {
    Low,
    Medium,
    High,
}

impl RiskRating {
    pub fn label(&self) -> &'static str {
        match self {
            RiskRating::Low => "Бага эрсдэл",
            RiskRating::Medium => "Дунд эрсдэл",
            RiskRating::High => "Өндөр эрсдэл",
        }
    }
}

/// Percentage cut-offs: `>= high` is LOW risk, `>= medium` is MEDIUM, anything else HIGH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub high: f64,
    pub medium: f64,
}

impl Thresholds {
    pub fn new(high: u8, medium: u8) -> Self {
        Self {
            high: f64::from(high),
            medium: f64::from(medium),
        }
    }

    pub fn rate(&self, percentage: f64) -> RiskRating {
        if percentage >= self.high {
            RiskRating::Low
        } else if percentage >= self.medium {
            RiskRating::Medium
        } else {
            RiskRating::High
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_HIGH, DEFAULT_THRESHOLD_MEDIUM)
    }
}

/// Settings for the overall (cross-type) result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    pub overall_thresholds: Thresholds,
    pub overall_grade_scale: Option<GradeScale>,
}

impl ScoringPolicy {
    pub fn with_grades(mut self, scale: GradeScale) -> Self {
        self.overall_grade_scale = Some(scale);
        self
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            overall_thresholds: Thresholds::default(),
            overall_grade_scale: None,
        }
    }
}
