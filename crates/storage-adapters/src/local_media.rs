//! # Local media storage
//!
//! Content-addressed files on disk: the SHA-256 of the upload is its
//! reference, stored under a sharded path `ab/cd/<hash>`. Identical uploads
//! share one file.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use domains::{MediaRef, MediaStorage};
use mime::Mime;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

pub struct LocalMediaStorage {
    /// Root directory for all uploads (e.g., "./data/media")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media")
    url_prefix: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    fn sharded_path(&self, hash: &str) -> anyhow::Result<PathBuf> {
        if hash.len() < 4 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            anyhow::bail!("malformed media reference {hash:?}");
        }
        let mut path = self.root_path.clone();
        path.push(&hash[0..2]);
        path.push(&hash[2..4]);
        path.push(hash);
        Ok(path)
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, data: Bytes, content_type: &Mime) -> anyhow::Result<MediaRef> {
        let hash = hex::encode(Sha256::digest(&data));
        let target = self.sharded_path(&hash)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        if fs::try_exists(&target).await? {
            debug!(%hash, "media already stored");
        } else {
            fs::write(&target, &data).await?;
            debug!(%hash, %content_type, bytes = data.len(), "media stored");
        }
        Ok(hash)
    }

    async fn delete(&self, media: &str) -> anyhow::Result<()> {
        let target = self.sharded_path(media)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn url(&self, media: &str) -> String {
        match media.get(0..4) {
            Some(prefix) => format!("{}/{}/{}/{}", self.url_prefix, &prefix[0..2], &prefix[2..4], media),
            None => format!("{}/{}", self.url_prefix, media),
        }
    }
}
