use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::client::{
    CompletedPart, GetObject, ObjectAcl, ObjectHead, ObjectStoreClient, ProbeStatus, PutObjectRequest, PutResult,
};
use crate::{StoreError, StoreResult, UploadId};

const READ_CHUNK: usize = 64 * 1024;

/// One primitive call as seen by the in-memory client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    ListBucket { bucket: String },
    Head { key: String },
    Put {
        key: String,
        content_length: u64,
        content_type: String,
        content_encoding: Option<String>,
        accelerate: bool,
    },
    Get { key: String },
    Delete { key: String },
    CreateMultipart { key: String, acl: ObjectAcl, content_type: String },
    UploadPart { key: String, part_number: u32, size: usize },
    Complete { key: String, part_numbers: Vec<u32> },
    Abort { key: String },
}

/// Failure injected into the in-memory client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// List probe raises (auth rejection)
    ProbeRejected,
    /// List probe answers with this status instead of 200
    ProbeStatus(u16),
    /// Head raises a non-404 error
    Head,
    Put,
    /// Get raises before any byte is sent
    Get,
    /// Get stream yields its first chunk, then fails
    GetInterrupted,
    /// Get declares the full length but sends only the first half
    GetTruncated,
    Delete,
    /// Upload of this part number raises
    Part(u32),
    Complete,
    Abort,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
}

#[derive(Debug, Default)]
struct PendingUpload {
    key: String,
    content_type: String,
    parts: BTreeMap<u32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    uploads: HashMap<String, PendingUpload>,
    calls: Vec<ClientCall>,
    faults: Vec<Fault>,
}

/// In-memory object store with a call journal and fault injection.
///
/// Multipart completion enforces the same rules as S3: parts contiguous
/// from 1, ascending, and each etag matching the one issued for that part.
#[derive(Clone, Default)]
pub struct MemoryObjectClient {
    state: Arc<Mutex<State>>,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure; it stays active until [`Self::clear_faults`]
    pub fn inject(&self, fault: Fault) {
        self.state.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Every call recorded so far, oldest first
    pub fn calls(&self) -> Vec<ClientCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Content of a stored object
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.state.lock().objects.get(key).map(|o| o.data.clone())
    }

    /// Seed an object directly, bypassing the journal
    pub fn insert_object(&self, key: &str, data: impl Into<Bytes>) {
        let data = data.into();
        self.state.lock().objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: "application/zip".to_string(),
                etag: new_etag(),
            },
        );
    }

    /// Multipart uploads neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.state.lock().uploads.len()
    }

    fn record(&self, call: ClientCall) {
        self.state.lock().calls.push(call);
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.state.lock().faults.contains(fault)
    }

    fn probe_status_override(&self) -> Option<u16> {
        self.state.lock().faults.iter().find_map(|f| match f {
            Fault::ProbeStatus(status) => Some(*status),
            _ => None,
        })
    }
}

fn new_etag() -> String {
    format!("\"{}\"", Uuid::new_v4().simple())
}

fn injected(what: &str) -> StoreError {
    StoreError::backend(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("injected {} failure", what),
    ))
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectClient {
    async fn list_bucket(&self, bucket: &str) -> StoreResult<ProbeStatus> {
        self.record(ClientCall::ListBucket {
            bucket: bucket.to_string(),
        });
        if self.has_fault(&Fault::ProbeRejected) {
            return Err(StoreError::Rejected { status: 403 });
        }
        Ok(ProbeStatus::new(self.probe_status_override().unwrap_or(200)))
    }

    async fn head_object(&self, _bucket: &str, key: &str) -> StoreResult<ObjectHead> {
        self.record(ClientCall::Head { key: key.to_string() });
        if self.has_fault(&Fault::Head) {
            return Err(injected("head"));
        }
        let state = self.state.lock();
        let object = state.objects.get(key).ok_or_else(|| StoreError::not_found(key))?;
        Ok(ObjectHead {
            size_bytes: object.data.len() as u64,
            content_type: Some(object.content_type.clone()),
            etag: Some(object.etag.clone()),
            last_modified: None,
        })
    }

    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutResult> {
        self.record(ClientCall::Put {
            key: request.key.clone(),
            content_length: request.content_length,
            content_type: request.content_type.clone(),
            content_encoding: request.content_encoding.clone(),
            accelerate: request.accelerate,
        });
        if self.has_fault(&Fault::Put) {
            return Err(injected("put"));
        }

        let data = tokio::fs::read(&request.source).await?;
        if data.len() as u64 != request.content_length {
            return Err(StoreError::transfer(
                &request.key,
                format!("declared {} bytes, read {}", request.content_length, data.len()),
            ));
        }

        let etag = new_etag();
        self.state.lock().objects.insert(
            request.key,
            StoredObject {
                data: Bytes::from(data),
                content_type: request.content_type,
                etag: etag.clone(),
            },
        );
        Ok(PutResult { etag: Some(etag) })
    }

    async fn get_object(&self, _bucket: &str, key: &str) -> StoreResult<GetObject> {
        self.record(ClientCall::Get { key: key.to_string() });
        if self.has_fault(&Fault::Get) {
            return Err(injected("get"));
        }
        let object = self
            .state
            .lock()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))?;

        let size_bytes = object.data.len() as u64;
        let data = if self.has_fault(&Fault::GetTruncated) {
            object.data.slice(..object.data.len() / 2)
        } else {
            object.data
        };
        let mut chunks = (0..data.len())
            .step_by(READ_CHUNK)
            .map(|start| Ok(data.slice(start..(start + READ_CHUNK).min(data.len()))))
            .collect::<Vec<std::io::Result<Bytes>>>();
        if self.has_fault(&Fault::GetInterrupted) {
            chunks.truncate(1);
            chunks.push(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "injected get interruption",
            )));
        }

        Ok(GetObject {
            stream: Box::pin(futures::stream::iter(chunks)),
            size_bytes: Some(size_bytes),
            etag: Some(object.etag),
        })
    }

    async fn delete_object(&self, _bucket: &str, key: &str) -> StoreResult<()> {
        self.record(ClientCall::Delete { key: key.to_string() });
        if self.has_fault(&Fault::Delete) {
            return Err(injected("delete"));
        }
        self.state.lock().objects.remove(key);
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        _bucket: &str,
        key: &str,
        acl: ObjectAcl,
        content_type: &str,
    ) -> StoreResult<UploadId> {
        self.record(ClientCall::CreateMultipart {
            key: key.to_string(),
            acl,
            content_type: content_type.to_string(),
        });
        let upload_id = format!("mpu_{}", Uuid::new_v4().simple());
        self.state.lock().uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(UploadId::from_string(upload_id))
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        body: Bytes,
    ) -> StoreResult<String> {
        self.record(ClientCall::UploadPart {
            key: key.to_string(),
            part_number,
            size: body.len(),
        });
        if self.has_fault(&Fault::Part(part_number)) {
            return Err(injected("part"));
        }
        if part_number == 0 || part_number > 10_000 {
            return Err(StoreError::invalid(format!("invalid part number {}", part_number)));
        }

        let mut state = self.state.lock();
        let upload = state
            .uploads
            .get_mut(upload_id.as_str())
            .ok_or_else(|| StoreError::invalid(format!("no such upload {}", upload_id)))?;
        let etag = new_etag();
        upload.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &UploadId,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<PutResult> {
        self.record(ClientCall::Complete {
            key: key.to_string(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });
        if self.has_fault(&Fault::Complete) {
            return Err(injected("complete"));
        }

        let mut state = self.state.lock();
        let upload = state
            .uploads
            .get(upload_id.as_str())
            .ok_or_else(|| StoreError::invalid(format!("no such upload {}", upload_id)))?;

        if parts.is_empty() {
            return Err(StoreError::invalid("multipart upload needs at least one part"));
        }
        let mut assembled = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if part.part_number as usize != index + 1 {
                return Err(StoreError::invalid(format!(
                    "part {} out of order at position {}",
                    part.part_number,
                    index + 1
                )));
            }
            let (etag, data) = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| StoreError::invalid(format!("missing part {}", part.part_number)))?;
            if *etag != part.etag {
                return Err(StoreError::invalid(format!("etag mismatch for part {}", part.part_number)));
            }
            assembled.extend_from_slice(data);
        }

        let upload = state
            .uploads
            .remove(upload_id.as_str())
            .unwrap_or_default();
        let etag = format!("\"{}-{}\"", Uuid::new_v4().simple(), parts.len());
        state.objects.insert(
            upload.key,
            StoredObject {
                data: Bytes::from(assembled),
                content_type: upload.content_type,
                etag: etag.clone(),
            },
        );
        Ok(PutResult { etag: Some(etag) })
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &UploadId,
    ) -> StoreResult<()> {
        self.record(ClientCall::Abort { key: key.to_string() });
        if self.has_fault(&Fault::Abort) {
            return Err(injected("abort"));
        }
        self.state.lock().uploads.remove(upload_id.as_str());
        Ok(())
    }
}
