//! File-backed tag transport
//!
//! Every `--tag` path is one tag in range. A regular file is a writable tag
//! holding its contents as the payload, a read-only file is a locked tag,
//! and a directory is a tag that cannot hold a message at all. A path that
//! doesn't exist yet is a blank writable tag.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use spark_core::{TagCapability, TagId, TagMessage, TagTransport, TransportError};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileTagTransport {
    paths: Vec<PathBuf>,
}

impl FileTagTransport {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    fn path(&self, tag: &TagId) -> Result<&Path, TransportError> {
        self.paths
            .iter()
            .find(|p| p.display().to_string() == tag.0)
            .map(PathBuf::as_path)
            .ok_or_else(|| TransportError::Failed(format!("tag {} is out of range", tag)))
    }
}

fn io_error(e: std::io::Error) -> TransportError {
    TransportError::Failed(e.to_string())
}

#[async_trait]
impl TagTransport for FileTagTransport {
    fn is_available(&self) -> bool {
        true
    }

    async fn discover(&self) -> Result<Vec<TagId>, TransportError> {
        Ok(self
            .paths
            .iter()
            .map(|p| TagId::new(p.display().to_string()))
            .collect())
    }

    async fn connect(&self, tag: &TagId) -> Result<(), TransportError> {
        let path = self.path(tag)?;
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => Err(
                TransportError::Failed(format!("{} does not exist", parent.display())),
            ),
            _ => Ok(()),
        }
    }

    async fn query_capability(&self, tag: &TagId) -> Result<TagCapability, TransportError> {
        let path = self.path(tag)?;
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(TagCapability::NotSupported),
            Ok(meta) if meta.permissions().readonly() => Ok(TagCapability::ReadOnly),
            Ok(_) => Ok(TagCapability::ReadWrite),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TagCapability::ReadWrite),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn read_message(&self, tag: &TagId) -> Result<Option<TagMessage>, TransportError> {
        let path = self.path(tag)?;
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(TagMessage::from_payload(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn write_message(&self, tag: &TagId, message: &TagMessage) -> Result<(), TransportError> {
        let path = self.path(tag)?;
        let bytes = message
            .records
            .first()
            .map(|record| record.payload.as_slice())
            .unwrap_or_default();
        tokio::fs::write(path, bytes).await.map_err(io_error)?;
        debug!(path = %path.display(), len = bytes.len(), "Tag file written");
        Ok(())
    }

    async fn release(&self) {
        debug!(tags = self.paths.len(), "Tag files released");
    }
}
