use std::sync::Arc;
use tracing::{debug, warn};

use crate::chunker::PendingPart;
use crate::client::{CompletedPart, ObjectAcl, ObjectStoreClient, PutResult};
use crate::{StoreError, StoreResult, UploadId};

/// An initiated multipart upload that must end in `complete` or `abort`.
///
/// `complete` aborts by itself when the store refuses to assemble. Dropping
/// a session that was never finished leaves the upload orphaned on the store
/// and logs a warning with its id.
pub struct MultipartSession {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
    key: String,
    upload_id: UploadId,
    parts: Vec<CompletedPart>,
    uploaded_bytes: u64,
    finished: bool,
}

impl MultipartSession {
    /// Initiate a private multipart upload
    pub async fn begin(
        client: Arc<dyn ObjectStoreClient>,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StoreResult<Self> {
        let upload_id = client
            .create_multipart_upload(bucket, key, ObjectAcl::Private, content_type)
            .await?;
        debug!(%upload_id, key, "multipart upload initiated");

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id,
            parts: Vec::new(),
            uploaded_bytes: 0,
            finished: false,
        })
    }

    pub fn upload_id(&self) -> &UploadId {
        &self.upload_id
    }

    /// Parts acknowledged so far, in upload order
    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    /// Upload the next part. Parts must arrive numbered 1, 2, 3, ...
    pub async fn upload(&mut self, part: PendingPart) -> StoreResult<()> {
        let expected = self.parts.len() as u32 + 1;
        if part.number != expected {
            return Err(StoreError::invalid(format!(
                "part {} uploaded out of order, expected {}",
                part.number, expected
            )));
        }

        let size = part.data.len() as u64;
        let etag = self
            .client
            .upload_part(&self.bucket, &self.key, &self.upload_id, part.number, part.data)
            .await?;
        debug!(upload_id = %self.upload_id, part = part.number, size, "part acknowledged");

        self.parts.push(CompletedPart {
            part_number: part.number,
            etag,
        });
        self.uploaded_bytes += size;
        Ok(())
    }

    /// Assemble the uploaded parts into the final object
    pub async fn complete(mut self) -> StoreResult<PutResult> {
        if self.parts.is_empty() {
            self.abort_inner().await;
            return Err(StoreError::transfer(&self.key, "no parts uploaded"));
        }

        let parts = self.parts.clone();
        match self
            .client
            .complete_multipart_upload(&self.bucket, &self.key, &self.upload_id, parts)
            .await
        {
            Ok(result) => {
                self.finished = true;
                Ok(result)
            }
            Err(err) => {
                self.abort_inner().await;
                Err(err)
            }
        }
    }

    /// Discard the upload. Failures are logged, never returned, so the
    /// caller's original error is what surfaces.
    pub async fn abort(mut self) {
        self.abort_inner().await;
    }

    async fn abort_inner(&mut self) {
        self.finished = true;
        match self
            .client
            .abort_multipart_upload(&self.bucket, &self.key, &self.upload_id)
            .await
        {
            Ok(()) => debug!(upload_id = %self.upload_id, key = %self.key, "multipart upload aborted"),
            Err(err) => warn!(
                upload_id = %self.upload_id,
                key = %self.key,
                error = %err,
                "failed to abort multipart upload; parts may be orphaned"
            ),
        }
    }
}

impl Drop for MultipartSession {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                upload_id = %self.upload_id,
                key = %self.key,
                parts = self.parts.len(),
                "multipart upload dropped before completion"
            );
        }
    }
}
