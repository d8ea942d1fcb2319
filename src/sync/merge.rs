//! Combines the datasets of all successfully loaded sources into one unified
//! per-day dataset. The merge is a key-wise integer sum, which keeps it
//! commutative and associative, so the order sources were loaded in can never
//! change the published series.

use std::collections::HashMap;

use super::payload::{DailyEntry, RawDailyUsage};

pub type UnifiedUsage = HashMap<String, UnifiedDay>;

/// One calendar day summed across every source that reported it. The total is
/// tracked independently of the breakdowns, it is never derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedDay {
    pub total_seconds: u64,
    pub language_time: Option<HashMap<String, u64>>,
    pub repo_time: Option<HashMap<String, u64>>,
    pub file_time: Option<HashMap<String, u64>>,
}

impl From<DailyEntry> for UnifiedDay {
    fn from(entry: DailyEntry) -> Self {
        Self {
            total_seconds: entry.total_time,
            language_time: entry.language_time,
            repo_time: entry.repo_time,
            file_time: entry.file_time,
        }
    }
}

pub fn merge_sources(sources: impl IntoIterator<Item = RawDailyUsage>) -> UnifiedUsage {
    let mut unified = UnifiedUsage::new();
    for source in sources {
        for (date, entry) in source {
            let day = unified.entry(date).or_default();
            day.total_seconds = day.total_seconds.saturating_add(entry.total_time);
            day.language_time = merge_breakdown(day.language_time.take(), entry.language_time);
            day.repo_time = merge_breakdown(day.repo_time.take(), entry.repo_time);
            day.file_time = merge_breakdown(day.file_time.take(), entry.file_time);
        }
    }
    unified
}

/// Absent plus absent stays absent, a single present map passes through
/// unchanged, two present maps are summed key-wise.
fn merge_breakdown(
    current: Option<HashMap<String, u64>>,
    incoming: Option<HashMap<String, u64>>,
) -> Option<HashMap<String, u64>> {
    match (current, incoming) {
        (None, None) => None,
        (Some(m), None) | (None, Some(m)) => Some(m),
        (Some(mut acc), Some(incoming)) => {
            for (key, seconds) in incoming {
                let slot = acc.entry(key).or_insert(0);
                *slot = slot.saturating_add(seconds);
            }
            Some(acc)
        }
    }
}
