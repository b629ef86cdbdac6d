use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::chunker::{planned_parts, ChunkAccumulator};
use crate::client::{ObjectStoreClient, PutObjectRequest};
use crate::config::ARCHIVE_CONTENT_TYPE;
use crate::multipart::MultipartSession;
use crate::{
    ByteStream, ExtractReceipt, RemoteKey, SaveReceipt, StoreConfig, StoreError, StoreResult, TransferRules,
    UploadInfo,
};

/// Read buffer used when streaming a local archive
const READ_BUFFER: usize = 256 * 1024;

/// How an archive goes up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStrategy {
    SingleShot,
    Multipart,
}

impl TransferStrategy {
    /// Single-shot up to and including the threshold, multipart above it
    pub fn select(size_bytes: u64, rules: &TransferRules) -> Self {
        if size_bytes <= rules.multipart_threshold_bytes {
            Self::SingleShot
        } else {
            Self::Multipart
        }
    }
}

/// Moves archive bytes between local files and the object store
pub(crate) struct TransferEngine<'a> {
    client: &'a Arc<dyn ObjectStoreClient>,
    config: &'a StoreConfig,
}

impl<'a> TransferEngine<'a> {
    pub(crate) fn new(client: &'a Arc<dyn ObjectStoreClient>, config: &'a StoreConfig) -> Self {
        Self { client, config }
    }

    /// Upload a local archive under `key`
    pub(crate) async fn upload(&self, key: &RemoteKey, source: &Path) -> StoreResult<SaveReceipt> {
        let size_bytes = tokio::fs::metadata(source).await?.len();
        let strategy = TransferStrategy::select(size_bytes, &self.config.rules);
        self.config.phase(
            "save",
            format_args!("{} bytes to {} via {:?}", size_bytes, key, strategy),
        );

        match strategy {
            TransferStrategy::SingleShot => self.single_shot(key, source, size_bytes).await,
            TransferStrategy::Multipart => self.multipart(key, source, size_bytes).await,
        }
    }

    async fn single_shot(&self, key: &RemoteKey, source: &Path, size_bytes: u64) -> StoreResult<SaveReceipt> {
        let rules = &self.config.rules;
        let request = PutObjectRequest {
            bucket: self.config.bucket.clone(),
            key: key.as_str().to_string(),
            source: source.to_path_buf(),
            content_length: size_bytes,
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
            content_encoding: rules.content_encoding.clone(),
            accelerate: rules.accelerate,
        };

        let result = self.client.put_object(request).await?;
        self.config.phase("save", format_args!("put {} complete", key));

        let mut receipt = SaveReceipt::new(
            key.clone(),
            size_bytes,
            UploadInfo::Single {
                content_encoding: rules.content_encoding.clone(),
                accelerated: rules.accelerate,
            },
        );
        if let Some(etag) = result.etag {
            receipt = receipt.with_etag(etag);
        }
        Ok(receipt)
    }

    async fn multipart(&self, key: &RemoteKey, source: &Path, size_bytes: u64) -> StoreResult<SaveReceipt> {
        let rules = &self.config.rules;
        let planned = planned_parts(size_bytes, rules.part_size);
        if planned > u64::from(rules.max_parts) {
            return Err(StoreError::invalid(format!(
                "archive of {} bytes needs {} parts, limit is {}",
                size_bytes, planned, rules.max_parts
            )));
        }
        let part_size = usize::try_from(rules.part_size)
            .map_err(|_| StoreError::config("part_size does not fit in memory"))?;

        // open before initiating so a missing file leaves nothing behind
        let file = File::open(source).await?;

        let mut session = MultipartSession::begin(
            Arc::clone(self.client),
            &self.config.bucket,
            key.as_str(),
            ARCHIVE_CONTENT_TYPE,
        )
        .await?;
        let upload_id = session.upload_id().clone();
        self.config.phase(
            "save",
            format_args!("multipart {} started, {} parts planned", upload_id, planned),
        );

        if let Err(err) = Self::feed_parts(&mut session, file, part_size).await {
            warn!(%upload_id, key = %key, error = %err, "multipart upload failed, aborting");
            session.abort().await;
            return Err(err);
        }

        let uploaded = session.uploaded_bytes();
        if uploaded != size_bytes {
            session.abort().await;
            return Err(StoreError::transfer(
                key.as_str(),
                format!("archive changed during upload: expected {} bytes, read {}", size_bytes, uploaded),
            ));
        }

        let parts = session.parts().len() as u32;
        let result = session.complete().await?;
        self.config.phase(
            "save",
            format_args!("multipart {} completed with {} parts", upload_id, parts),
        );

        let mut receipt = SaveReceipt::new(
            key.clone(),
            size_bytes,
            UploadInfo::Multipart {
                upload_id,
                part_size: rules.part_size,
                parts,
            },
        );
        if let Some(etag) = result.etag {
            receipt = receipt.with_etag(etag);
        }
        Ok(receipt)
    }

    /// Read the file in order and upload each part as soon as it is cut.
    /// The next read only starts after the previous part was acknowledged.
    async fn feed_parts(session: &mut MultipartSession, file: File, part_size: usize) -> StoreResult<()> {
        let mut reader = ReaderStream::with_capacity(file, READ_BUFFER);
        let mut chunks = ChunkAccumulator::new(part_size);

        while let Some(read) = reader.next().await {
            chunks.push(&read?)?;
            while let Some(part) = chunks.take_ready() {
                session.upload(part).await?;
            }
        }
        if let Some(last) = chunks.finish()? {
            session.upload(last).await?;
        }
        Ok(())
    }

    /// Stream `key` into a new file at `destination`
    pub(crate) async fn download(&self, key: &RemoteKey, destination: &Path) -> StoreResult<ExtractReceipt> {
        let object = self.client.get_object(&self.config.bucket, key.as_str()).await?;
        self.config.phase(
            "extract",
            format_args!("streaming {} ({:?} bytes) to {}", key, object.size_bytes, destination.display()),
        );

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(destination).await?;

        match write_stream(&mut file, object.stream).await {
            Ok(written) => {
                drop(file);
                if let Some(expected) = object.size_bytes {
                    if expected != written {
                        remove_partial(destination).await;
                        return Err(StoreError::transfer(
                            key.as_str(),
                            format!("expected {} bytes, received {}", expected, written),
                        ));
                    }
                }
                self.config.phase("extract", format_args!("{} bytes written", written));
                Ok(ExtractReceipt {
                    key: key.clone(),
                    destination: destination.to_path_buf(),
                    size_bytes: written,
                    etag: object.etag,
                })
            }
            Err(err) => {
                drop(file);
                remove_partial(destination).await;
                Err(err)
            }
        }
    }
}

/// Copy a byte stream into `file`; returns once data is flushed and synced
async fn write_stream(file: &mut File, mut stream: ByteStream) -> StoreResult<u64> {
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

async fn remove_partial(destination: &Path) {
    if let Err(err) = tokio::fs::remove_file(destination).await {
        warn!(path = %destination.display(), error = %err, "could not remove partial archive");
    }
}
