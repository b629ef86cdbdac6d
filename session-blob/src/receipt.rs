use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{RemoteKey, UploadId};

/// Receipt returned after an archive has been stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub key: RemoteKey,
    pub size_bytes: u64,
    pub etag: Option<String>,
    pub saved_at: i64,
    pub upload: UploadInfo,
}

/// Information about how the archive was uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadInfo {
    /// Single put request
    Single {
        content_encoding: Option<String>,
        accelerated: bool,
    },
    /// Multipart upload
    Multipart {
        upload_id: UploadId,
        part_size: u64,
        parts: u32,
    },
}

impl UploadInfo {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart { .. })
    }
}

impl SaveReceipt {
    /// Create a new save receipt stamped with the current time
    pub fn new(key: RemoteKey, size_bytes: u64, upload: UploadInfo) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        Self {
            key,
            size_bytes,
            etag: None,
            saved_at: now,
            upload,
        }
    }

    /// Set etag
    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Receipt returned after an archive has been restored to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractReceipt {
    pub key: RemoteKey,
    pub destination: PathBuf,
    pub size_bytes: u64,
    pub etag: Option<String>,
}
