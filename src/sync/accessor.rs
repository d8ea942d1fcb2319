//! Seam for resolving a source's opaque locator into payload bytes. Each call
//! is independently scoped: access is acquired, the bytes are read, access is
//! released. The engine only sees bytes or a typed failure, never the
//! platform's file-permission machinery.

use std::{io::ErrorKind, path::Path};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("source file not found")]
    NotFound,
    #[error("access to source file was denied")]
    AccessDenied,
    #[error("failed to read source file: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceAccessor: Send + Sync {
    async fn resolve(&self, locator: &Path) -> Result<Vec<u8>, AccessError>;
}

/// Resolves locators as plain paths on the local filesystem.
pub struct LocalFileAccessor;

#[async_trait]
impl SourceAccessor for LocalFileAccessor {
    async fn resolve(&self, locator: &Path) -> Result<Vec<u8>, AccessError> {
        match tokio::fs::read(locator).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AccessError::NotFound),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(AccessError::AccessDenied),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod accessor_tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::{AccessError, LocalFileAccessor, SourceAccessor};

    #[tokio::test]
    async fn reads_existing_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("codingTimeData.json");
        tokio::fs::write(&path, br#"{ "dailyData": {} }"#).await?;

        let bytes = LocalFileAccessor.resolve(&path).await?;
        assert_eq!(bytes, br#"{ "dailyData": {} }"#);
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_not_found() -> Result<()> {
        let dir = tempdir()?;

        let result = LocalFileAccessor.resolve(&dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(AccessError::NotFound)));
        Ok(())
    }
}
