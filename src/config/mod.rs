//! User configuration: tracked sources, the threshold table and the window
//! length. Persisted as a single json file. The [ConfigStore] trait is the
//! seam through which the sync engine reads settings, so tests can substitute
//! their own store.

pub mod migrate;

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Device-rgb color with an alpha channel, all components in 0..=1. The field
/// layout matches what the widget renderer expects to find in the published
/// series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    pub const fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

impl FromStr for Rgba {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Can't parse '{s}' as a color: {e}"))?;
        let (rgb, alpha) = match components.as_slice() {
            [r, g, b] => ([*r, *g, *b], 1.0),
            [r, g, b, a] => ([*r, *g, *b], *a),
            _ => return Err(anyhow!("Expected 'r,g,b' or 'r,g,b,a', got '{s}'")),
        };
        let color = Rgba::new(rgb[0], rgb[1], rgb[2], alpha);
        if [color.red, color.green, color.blue, color.alpha]
            .iter()
            .any(|v| !(0.0..=1.0).contains(v))
        {
            return Err(anyhow!("Color components must be within 0..=1, got '{s}'"));
        }
        Ok(color)
    }
}

/// One rule of the user-editable cutoff table. The day's display color comes
/// from the rule with the largest cutoff that is still below or at the day's
/// total seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub seconds: u64,
    pub color: Rgba,
    pub editable: bool,
}

const GRAY: Rgba = Rgba::new(0.5, 0.5, 0.5, 0.3);

const fn green(alpha: f64) -> Rgba {
    Rgba::new(0.0, 1.0, 0.0, alpha)
}

/// The fixed six-rule table restored by `threshold reset`. The zero-cutoff
/// baseline is not editable so classification always has a match.
pub fn default_thresholds() -> Vec<Threshold> {
    vec![
        Threshold {
            seconds: 0,
            color: GRAY,
            editable: false,
        },
        Threshold {
            seconds: 3600,
            color: green(0.3),
            editable: true,
        },
        Threshold {
            seconds: 7200,
            color: green(0.5),
            editable: true,
        },
        Threshold {
            seconds: 14400,
            color: green(0.7),
            editable: true,
        },
        Threshold {
            seconds: 21600,
            color: green(1.0),
            editable: true,
        },
        Threshold {
            seconds: 28800,
            color: green(1.0),
            editable: true,
        },
    ]
}

/// Trailing window rendered by the widget. Stored as a plain day count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum WindowLength {
    #[default]
    Thirty,
    Sixty,
    Ninety,
}

impl WindowLength {
    pub fn days(self) -> u32 {
        match self {
            WindowLength::Thirty => 30,
            WindowLength::Sixty => 60,
            WindowLength::Ninety => 90,
        }
    }
}

impl TryFrom<u32> for WindowLength {
    type Error = anyhow::Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            30 => Ok(WindowLength::Thirty),
            60 => Ok(WindowLength::Sixty),
            90 => Ok(WindowLength::Ninety),
            v => Err(anyhow!("Window length must be 30, 60 or 90, got {v}")),
        }
    }
}

impl From<WindowLength> for u32 {
    fn from(value: WindowLength) -> Self {
        value.days()
    }
}

/// One user-configured tracking log. The path is opaque to the sync engine,
/// only the source accessor interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: Uuid,
    pub name: String,
    pub path: PathBuf,
    pub enabled: bool,
}

impl DataSource {
    pub fn new(name: String, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            path,
            enabled: true,
        }
    }
}

/// Derives a display name for a source that the user didn't name explicitly.
pub fn source_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|v| v.to_str())
        .map(str::to_owned)
        .unwrap_or_else(|| "Imported source".to_owned())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub window_length: WindowLength,
    pub sources: Vec<DataSource>,
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<Threshold>,
    #[serde(default)]
    pub first_launch: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_length: WindowLength::default(),
            sources: vec![],
            thresholds: default_thresholds(),
            first_launch: true,
        }
    }
}

impl AppConfig {
    pub fn enabled_sources(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// The threshold table as the classifier expects it. Classification
    /// requires a zero-cutoff baseline, so a table that lost it (hand-edited
    /// config) is replaced with the default one.
    pub fn threshold_table(&self) -> Vec<Threshold> {
        if self.thresholds.iter().any(|t| t.seconds == 0) {
            self.thresholds.clone()
        } else {
            default_thresholds()
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<AppConfig>;

    fn save(&self, config: &AppConfig) -> Result<()>;
}

/// The main realization of [ConfigStore], backed by a json file in the
/// application directory.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<AppConfig> {
        let bytes = match std::fs::read(&self.path) {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AppConfig::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<AppConfig>(&bytes) {
            Ok(config) => Ok(config),
            Err(current_err) => match migrate::parse_legacy(&bytes) {
                Ok(legacy) => {
                    info!("Migrating legacy single-file configuration");
                    let migrated = migrate::migrate(legacy);
                    self.save(&migrated)?;
                    Ok(migrated)
                }
                Err(_) => {
                    warn!(
                        "Configuration could not be decoded ({current_err}), using defaults"
                    );
                    Ok(AppConfig::default())
                }
            },
        }
    }

    fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(config)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use std::path::PathBuf;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{
        AppConfig, ConfigStore, DataSource, FileConfigStore, Rgba, WindowLength,
        default_thresholds,
    };

    #[test]
    fn save_load_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let store = FileConfigStore::new(dir.path().join("config.json"));

        let mut config = AppConfig::default();
        config.window_length = WindowLength::Ninety;
        config.sources.push(DataSource::new(
            "cursor".into(),
            PathBuf::from("/tmp/codingTimeData.json"),
        ));
        config.first_launch = false;

        store.save(&config)?;
        assert_eq!(store.load()?, config);
        Ok(())
    }

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let store = FileConfigStore::new(dir.path().join("config.json"));

        let config = store.load()?;
        assert_eq!(config, AppConfig::default());
        assert!(config.first_launch);
        Ok(())
    }

    #[test]
    fn corrupt_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, b"{not json")?;

        let store = FileConfigStore::new(path);
        assert_eq!(store.load()?, AppConfig::default());
        Ok(())
    }

    #[test]
    fn threshold_table_restores_missing_baseline() {
        let mut config = AppConfig::default();
        config.thresholds.retain(|t| t.seconds != 0);

        let table = config.threshold_table();
        assert_eq!(table, default_thresholds());
    }

    #[test]
    fn window_length_rejects_unknown_day_counts() {
        assert!(WindowLength::try_from(30).is_ok());
        assert!(WindowLength::try_from(60).is_ok());
        assert!(WindowLength::try_from(90).is_ok());
        assert!(WindowLength::try_from(45).is_err());
        assert!(WindowLength::try_from(0).is_err());
    }

    #[test]
    fn rgba_from_str() {
        let color: Rgba = "0, 1, 0, 0.5".parse().unwrap();
        assert_eq!(color, Rgba::new(0.0, 1.0, 0.0, 0.5));

        let opaque: Rgba = "0.2,0.4,0.6".parse().unwrap();
        assert_eq!(opaque.alpha, 1.0);

        assert!("1,2,3".parse::<Rgba>().is_err());
        assert!("0.5".parse::<Rgba>().is_err());
        assert!("red".parse::<Rgba>().is_err());
    }
}
