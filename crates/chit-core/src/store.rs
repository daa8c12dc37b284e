//! Receipt image storage
//!
//! Uploaded images land on disk under a generated name; the database only
//! ever holds the serving URL. Names combine a timestamp with a content
//! hash prefix, so re-uploads of the same bytes still get distinct files.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

/// On-disk store for uploaded receipt images
#[derive(Clone)]
pub struct ReceiptStore {
    dir: PathBuf,
}

/// A stored image: the on-disk filename and the URL it serves at
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub filename: String,
    pub url: String,
}

impl ReceiptStore {
    /// Open a store rooted at the given directory, creating it if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write image bytes and return the filename and serving URL
    pub fn save(&self, bytes: &[u8], original_name: &str) -> Result<StoredImage> {
        if bytes.is_empty() {
            return Err(Error::InvalidData("Empty image upload".to_string()));
        }

        let digest = Sha256::digest(bytes);
        let filename = format!(
            "{}_{}.{}",
            Utc::now().format("%Y%m%d%H%M%S%f"),
            hex::encode(&digest[..6]),
            extension_of(original_name),
        );

        let path = self.dir.join(&filename);
        std::fs::write(&path, bytes)?;
        debug!(file = %filename, bytes = bytes.len(), "Stored receipt image");

        Ok(StoredImage {
            url: format!("/receipts/{}", filename),
            filename,
        })
    }
}

/// Sanitized extension from the client-supplied name; never trusted as a path
fn extension_of(original_name: &str) -> String {
    let ext: String = original_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_lowercase();

    if ext.is_empty() || ext == original_name.to_lowercase() {
        "jpg".to_string()
    } else {
        ext
    }
}
