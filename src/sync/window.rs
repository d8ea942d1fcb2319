//! Builds the gap-free day sequence the widget renders: exactly one entry per
//! calendar day of the trailing window, oldest first, ending at the supplied
//! reference day. Days the unified dataset knows nothing about become
//! zero-second entries instead of holes.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Rgba, Threshold, WindowLength},
    utils::time::date_key,
};

use super::{
    intensity::{IntensityLevel, classify},
    merge::UnifiedUsage,
};

/// One published row. Never mutated after the pass that produced it; the next
/// pass replaces the whole series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageDay {
    pub date: NaiveDate,
    pub seconds: u64,
    pub intensity: IntensityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgba>,
}

/// The reference day comes from the caller, not from the wall clock, so two
/// calls with the same inputs always produce the same sequence.
pub fn build_window(
    unified: &UnifiedUsage,
    length: WindowLength,
    thresholds: &[Threshold],
    today: NaiveDate,
) -> Vec<UsageDay> {
    let days = length.days();
    let mut window = Vec::with_capacity(days as usize);

    for offset in (0..days).rev() {
        // Subtraction can only leave the calendar at the edge of chrono's
        // representable range; such offsets are skipped.
        let Some(date) = today.checked_sub_days(Days::new(offset as u64)) else {
            continue;
        };

        let seconds = unified
            .get(&date_key(date))
            .map(|day| day.total_seconds)
            .unwrap_or(0);
        let (intensity, color) = classify(seconds, thresholds);

        window.push(UsageDay {
            date,
            seconds,
            intensity,
            color,
        });
    }

    window
}
