//! # session-blob: session archive persistence on object storage
//!
//! `session-blob` keeps exactly one zip archive per logical session in an
//! S3-compatible bucket, under the key `{remote_data_path}/{session}.zip`.
//!
//! ## Key Features
//!
//! - **Streaming-first**: archives are streamed from and to disk, never held whole in memory
//! - **Size-based strategy**: single put up to 4 GiB, 20 MiB multipart parts above that
//! - **No orphaned uploads**: a failed multipart upload is aborted before the error surfaces
//! - **Lenient lifecycle**: existence checks and deletes never raise; they report
//!   `Present`/`Absent`/`Indeterminate` instead
//! - **Storage agnostic**: works with any [`ObjectStoreClient`] (AWS SDK included; in-memory
//!   behind the default `memory` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use session_blob::prelude::*;
//! use session_blob::{S3ClientConfig, S3ObjectClient};
//!
//! # #[tokio::main]
//! # async fn main() -> StoreResult<()> {
//! let client = S3ObjectClient::connect(S3ClientConfig::from_env()).await;
//! let store = SessionStore::new(client, StoreConfig::new("sessions", "prod/auth"))?;
//!
//! store.save("work-phone", "/tmp/work-phone.zip").await?;
//! assert!(store.exists("work-phone").await);
//!
//! store.extract("work-phone", "/tmp/restored.zip").await?;
//! store.delete("work-phone").await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Session manager    │  ← decides when to save / restore
//! ├─────────────────────┤
//! │  SessionStore       │  ← validation, keys, lifecycle
//! ├─────────────────────┤
//! │  TransferEngine     │  ← single-shot / multipart, streaming
//! ├─────────────────────┤
//! │  ObjectStoreClient  │  ← storage primitives
//! └─────────────────────┘
//! ```

mod chunker;
pub mod client;
mod config;
mod error;
mod key;
#[cfg(any(test, feature = "memory"))]
mod memory_client;
mod multipart;
mod receipt;
mod s3_client;
mod store;
mod transfer;
mod types;
pub mod validator;

// Re-export main types for clean API
pub use chunker::{planned_parts, ChunkAccumulator, ChunkState, PendingPart};
pub use client::{
    CompletedPart, GetObject, ObjectAcl, ObjectHead, ObjectStoreClient, ProbeStatus, PutObjectRequest, PutResult,
};
pub use config::{StoreConfig, TransferRules, ARCHIVE_CONTENT_TYPE, DEFAULT_MULTIPART_THRESHOLD, DEFAULT_PART_SIZE};
pub use error::{StoreError, StoreResult};
pub use key::{derive_key, ARCHIVE_SUFFIX};
#[cfg(feature = "memory")]
pub use memory_client::{ClientCall, Fault, MemoryObjectClient};
pub use multipart::MultipartSession;
pub use receipt::{ExtractReceipt, SaveReceipt, UploadInfo};
pub use s3_client::{S3ClientConfig, S3ObjectClient};
pub use store::{SessionStore, SessionStoreBuilder};
pub use transfer::TransferStrategy;
pub use types::{ByteStream, ConfigCheck, DeleteOutcome, Presence, RemoteKey, SessionId, UploadId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        DeleteOutcome, ObjectStoreClient, Presence, SessionStore, StoreConfig, StoreError, StoreResult,
        TransferRules,
    };
}
