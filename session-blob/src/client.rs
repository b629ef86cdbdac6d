use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ByteStream, StoreResult, UploadId};

/// Primitive object-store operations the session store is built on.
///
/// Implementations own authentication, signing, retries and transport.
/// `head_object` must report a missing key as [`crate::StoreError::NotFound`].
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// List the bucket; used only as a connectivity probe
    async fn list_bucket(&self, bucket: &str) -> StoreResult<ProbeStatus>;

    /// Get object metadata without content
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead>;

    /// Store an object by streaming a local file
    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutResult>;

    /// Get an object as a stream
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObject>;

    /// Delete an object
    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Initialize a multipart upload
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        acl: ObjectAcl,
        content_type: &str,
    ) -> StoreResult<UploadId>;

    /// Upload one part and return its entity tag
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        body: Bytes,
    ) -> StoreResult<String>;

    /// Complete multipart upload. `parts` must be in ascending part order.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &UploadId,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<PutResult>;

    /// Abort multipart upload and discard its parts
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &UploadId,
    ) -> StoreResult<()>;
}

/// Transport status of the list probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStatus {
    pub status_code: u16,
}

impl ProbeStatus {
    pub fn new(status_code: u16) -> Self {
        Self { status_code }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Metadata about a stored object
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<i64>,
}

/// Single-shot put of a local file
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    /// File streamed as the request body
    pub source: PathBuf,
    pub content_length: u64,
    pub content_type: String,
    pub content_encoding: Option<String>,
    /// Transfer acceleration hint; backends without it ignore the flag
    pub accelerate: bool,
}

/// Result of a successful put or multipart completion
#[derive(Debug, Clone, Default)]
pub struct PutResult {
    pub etag: Option<String>,
}

/// Result of a get operation
pub struct GetObject {
    pub stream: ByteStream,
    pub size_bytes: Option<u64>,
    pub etag: Option<String>,
}

/// Canned ACL applied when a multipart upload is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectAcl {
    #[default]
    Private,
}

impl ObjectAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
        }
    }
}

/// Completed part for multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}
