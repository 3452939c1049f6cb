//! Filesystem quote store
//!
//! Layout:
//!
//! ```text
//! <data_dir>/
//!   <sha256-hex>.bin   one file per stored blob
//!   latest.json        pointer to the most recent blob
//! ```

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use qs_machine::{PersistError, QuoteStore};

const LATEST_FILE: &str = "latest.json";

/// Contents of `latest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestQuote {
    pub checksum: String,
    pub size: usize,
    pub stored_at: DateTime<Utc>,
}

/// Content-addressed blob directory
#[derive(Debug, Clone)]
pub struct FsQuoteStore {
    dir: PathBuf,
}

impl FsQuoteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the blob stored under `key`
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", key))
    }

    /// Write `blob` under `key` and point `latest.json` at it
    pub async fn put(&self, key: &str, blob: &[u8]) -> Result<(), PersistError> {
        validate_key(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.blob_path(key);
        write_atomic(&path, blob).await?;

        let latest = LatestQuote {
            checksum: key.to_string(),
            size: blob.len(),
            stored_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&latest)
            .map_err(|e| PersistError::Serialization(e.to_string()))?;
        write_atomic(&self.dir.join(LATEST_FILE), &json).await?;

        log::info!("[Store] Saved {} ({} bytes)", path.display(), blob.len());
        Ok(())
    }

    /// Read a stored blob
    pub async fn load(&self, key: &str) -> Result<Vec<u8>, PersistError> {
        validate_key(key)?;
        Ok(tokio::fs::read(self.blob_path(key)).await?)
    }

    /// The most recently stored blob, if any
    pub async fn latest(&self) -> Result<Option<LatestQuote>, PersistError> {
        let bytes = match tokio::fs::read(self.dir.join(LATEST_FILE)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PersistError::Serialization(e.to_string()))
    }
}

impl QuoteStore for FsQuoteStore {
    fn store<'a>(&'a self, key: &'a str, blob: &'a [u8]) -> BoxFuture<'a, Result<(), PersistError>> {
        self.put(key, blob).boxed()
    }
}

/// Keys are lowercase hex digests; anything else could escape the directory
fn validate_key(key: &str) -> Result<(), PersistError> {
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(());
    }
    Err(PersistError::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid store key: {:?}", key),
    )))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
