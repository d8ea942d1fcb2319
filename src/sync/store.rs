//! The shared store the widget renderer reads. A publish is a complete
//! replacement of the series: the new document is written next to the store
//! under an exclusive lock and swapped in with a rename, so a reader holding
//! a shared lock never observes a half-written series.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;

use super::window::UsageDay;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSeries {
    pub days: Vec<UsageDay>,
    pub last_updated: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn publish(&self, series: &UsageSeries) -> Result<()>;

    async fn load(&self) -> Result<Option<UsageSeries>>;
}

/// The main realization of [UsageStore], a json file in the application
/// directory.
pub struct FileUsageStore {
    path: PathBuf,
}

impl FileUsageStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl UsageStore for FileUsageStore {
    async fn publish(&self, series: &UsageSeries) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(series)?;

        let staged_path = self.path.with_extension("json.tmp");
        let mut staged = File::create(&staged_path).await?;
        staged.lock_exclusive()?;
        let written = async {
            staged.write_all(&bytes).await?;
            staged.flush().await?;
            Ok::<_, anyhow::Error>(())
        }
        .await;
        staged.unlock_async().await?;
        written?;
        drop(staged);

        tokio::fs::rename(&staged_path, &self.path).await?;
        debug!("Published {} days to {:?}", series.days.len(), self.path);
        Ok(())
    }

    async fn load(&self) -> Result<Option<UsageSeries>> {
        let file = match File::open(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        file.lock_shared()?;
        let mut reader = file;
        let mut bytes = Vec::new();
        let read = reader.read_to_end(&mut bytes).await;
        reader.unlock_async().await?;
        read?;

        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
