//! Upgrade from the legacy configuration schema, which tracked a single file
//! path instead of a source list. The transform is pure; [super::FileConfigStore]
//! invokes it once when the current schema fails to decode and persists the
//! result, so it never runs twice for the same file.

use std::path::PathBuf;

use serde::Deserialize;

use crate::config::{
    AppConfig, DataSource, Rgba, Threshold, WindowLength, default_thresholds,
    source_name_from_path,
};

/// The old on-disk layout. `filePath` is the schema marker: a document without
/// it is not a legacy configuration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConfig {
    #[serde(default)]
    days_count: WindowLength,
    file_path: String,
    #[serde(default)]
    thresholds: Vec<LegacyThreshold>,
}

#[derive(Debug, Deserialize)]
struct LegacyThreshold {
    seconds: u64,
    color: Rgba,
    #[serde(rename = "isEditable")]
    is_editable: bool,
}

pub fn parse_legacy(bytes: &[u8]) -> Result<LegacyConfig, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub fn migrate(legacy: LegacyConfig) -> AppConfig {
    let sources = if legacy.file_path.is_empty() {
        vec![]
    } else {
        let path = PathBuf::from(legacy.file_path);
        vec![DataSource::new(source_name_from_path(&path), path)]
    };

    let thresholds = if legacy.thresholds.is_empty() {
        default_thresholds()
    } else {
        legacy
            .thresholds
            .into_iter()
            .map(|t| Threshold {
                seconds: t.seconds,
                color: t.color,
                editable: t.is_editable,
            })
            .collect()
    };

    AppConfig {
        window_length: legacy.days_count,
        first_launch: sources.is_empty(),
        sources,
        thresholds,
    }
}
