//! Decoding of the tracking extension's log format. The log is one json
//! object with a `dailyData` map keyed by `YYYY-MM-DD`. Only `totalTime` is
//! mandatory per day; the breakdown maps and any fields added by newer
//! extension versions are optional and ignored respectively.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("malformed tracking payload: {0}")]
pub struct MalformedPayload(#[from] serde_json::Error);

/// A raw per-source dataset, keyed by the source's own date strings.
pub type RawDailyUsage = HashMap<String, DailyEntry>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPayload {
    pub daily_data: RawDailyUsage,
}

/// One day as a single source reports it. The breakdowns are independent
/// categorizations of the same total, not a partition of it, so an absent map
/// stays absent instead of being zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub total_time: u64,
    #[serde(default)]
    pub language_time: Option<HashMap<String, u64>>,
    #[serde(default)]
    pub repo_time: Option<HashMap<String, u64>>,
    #[serde(default)]
    pub file_time: Option<HashMap<String, u64>>,
}

pub fn parse_payload(bytes: &[u8]) -> Result<TrackingPayload, MalformedPayload> {
    Ok(serde_json::from_slice(bytes)?)
}
