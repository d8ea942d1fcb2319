//! Day classification. A day carries two independent labels: a categorical
//! intensity level derived from fixed hour boundaries, and a display color
//! taken from the user's threshold table. They are not reconciled, a user who
//! paints a five-minute cutoff bright green still gets a `low` level tag.

use serde::{Deserialize, Serialize};

use crate::config::{Rgba, Threshold};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    None,
    Low,
    Medium,
    High,
    Highest,
}

impl IntensityLevel {
    /// Fixed boundaries: 0h, under 1h, under 2h, under 4h, 4h and above.
    /// Deliberately independent of the user threshold table.
    pub fn from_seconds(seconds: u64) -> Self {
        if seconds == 0 {
            Self::None
        } else if seconds < 3600 {
            Self::Low
        } else if seconds < 7200 {
            Self::Medium
        } else if seconds < 14400 {
            Self::High
        } else {
            Self::Highest
        }
    }

    /// Fallback opacity a renderer applies when a day has no resolved color.
    pub fn opacity(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Low => 0.3,
            Self::Medium => 0.5,
            Self::High => 0.7,
            Self::Highest => 1.0,
        }
    }
}

/// Classifies a day's total seconds. The color comes from the threshold with
/// the largest cutoff at or below the total, whatever order the table is
/// stored in. A table with the zero-cutoff baseline always yields a color;
/// `None` only occurs for a pathological empty table and means "use the
/// caller's default palette".
pub fn classify(seconds: u64, thresholds: &[Threshold]) -> (IntensityLevel, Option<Rgba>) {
    let color = thresholds
        .iter()
        .filter(|t| t.seconds <= seconds)
        .max_by_key(|t| t.seconds)
        .map(|t| t.color);
    (IntensityLevel::from_seconds(seconds), color)
}
