use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::AsyncReadExt;
use mongodb::gridfs::GridFsBucket;

use crate::db::Database;

/// Uploaded files addressed by their storage path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

/// Report uploads kept in a GridFS bucket next to the dashboard tables.
/// The file name in the bucket is the upload path.
pub struct GridFsStore {
    bucket: GridFsBucket,
}

impl GridFsStore {
    pub fn new(db: &Database) -> Self {
        Self {
            bucket: db.database().gridfs_bucket(None),
        }
    }
}

#[async_trait]
impl ObjectStore for GridFsStore {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let mut stream = self
            .bucket
            .open_download_stream_by_name(path)
            .await
            .with_context(|| format!("Failed to open stored file {path}"))?;

        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .await
            .with_context(|| format!("Failed to read stored file {path}"))?;

        log::debug!("fetched {} bytes from {}", bytes.len(), path);
        Ok(bytes)
    }
}
