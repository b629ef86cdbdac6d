use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::client::ObjectStoreClient;
use crate::key::derive_key;
use crate::transfer::TransferEngine;
use crate::validator;
use crate::{
    DeleteOutcome, ExtractReceipt, Presence, RemoteKey, SaveReceipt, SessionId, StoreConfig, StoreError,
    StoreResult, TransferRules,
};

/// Persists one zip archive per session in a bucket.
///
/// Every operation validates the store first and quietly does nothing when
/// it is not usable. Only `save` and `extract` return transfer errors;
/// existence checks and deletes fold failures into their result values.
pub struct SessionStore {
    client: Arc<dyn ObjectStoreClient>,
    config: StoreConfig,
}

impl SessionStore {
    /// Create a store. Fails if the bucket or base path is blank.
    pub fn new<C: ObjectStoreClient + 'static>(client: C, config: StoreConfig) -> StoreResult<Self> {
        Self::with_shared_client(Arc::new(client), config)
    }

    /// Create a store around a client shared with other components
    pub fn with_shared_client(client: Arc<dyn ObjectStoreClient>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    /// Start building a store field by field
    pub fn builder() -> SessionStoreBuilder {
        SessionStoreBuilder::default()
    }

    /// Get configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Object key a session is stored under
    pub fn key_for(&self, session_id: &str) -> StoreResult<RemoteKey> {
        let id = SessionId::parse(session_id)?;
        Ok(derive_key(&self.config.remote_data_path, &id))
    }

    /// Validate for `subject` and, if usable, derive its key
    async fn prepare(&self, operation: &str, session_id: &str) -> Option<RemoteKey> {
        let check = validator::check(&self.config, Some(self.client.as_ref()), Some(session_id)).await;
        if !check.is_usable() {
            self.config.phase(operation, format_args!("skipped: {:?}", check));
            return None;
        }
        match self.key_for(session_id) {
            Ok(key) => {
                self.config.phase(operation, format_args!("key {}", key));
                Some(key)
            }
            Err(err) => {
                warn!(operation, error = %err, "invalid session identifier");
                None
            }
        }
    }

    /// Three-valued existence check
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    pub async fn presence(&self, session_id: &str) -> Presence {
        let Some(key) = self.prepare("exists", session_id).await else {
            return Presence::Indeterminate;
        };
        self.probe(&key).await
    }

    /// True only when the archive is confirmed present
    pub async fn exists(&self, session_id: &str) -> bool {
        self.presence(session_id).await.is_present()
    }

    /// Upload the archive at `archive` for `session_id`.
    ///
    /// Returns `Ok(None)` when validation short-circuits. Archives above the
    /// multipart threshold go up in parts; a failed multipart upload is
    /// aborted before the error is returned.
    #[instrument(skip(self, archive), fields(bucket = %self.config.bucket))]
    pub async fn save(&self, session_id: &str, archive: impl AsRef<Path>) -> StoreResult<Option<SaveReceipt>> {
        let Some(key) = self.prepare("save", session_id).await else {
            return Ok(None);
        };
        let receipt = TransferEngine::new(&self.client, &self.config)
            .upload(&key, archive.as_ref())
            .await?;
        info!(key = %receipt.key, size = receipt.size_bytes, multipart = receipt.upload.is_multipart(), "session archive saved");
        Ok(Some(receipt))
    }

    /// Download the archive for `session_id` into a new file at `destination`.
    ///
    /// Returns `Ok(None)` when validation short-circuits.
    #[instrument(skip(self, destination), fields(bucket = %self.config.bucket))]
    pub async fn extract(
        &self,
        session_id: &str,
        destination: impl AsRef<Path>,
    ) -> StoreResult<Option<ExtractReceipt>> {
        let Some(key) = self.prepare("extract", session_id).await else {
            return Ok(None);
        };
        let receipt = TransferEngine::new(&self.client, &self.config)
            .download(&key, destination.as_ref())
            .await?;
        info!(key = %receipt.key, size = receipt.size_bytes, "session archive extracted");
        Ok(Some(receipt))
    }

    /// Remove the archive for `session_id`. Never fails; see [`DeleteOutcome`].
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    pub async fn delete(&self, session_id: &str) -> DeleteOutcome {
        let Some(key) = self.prepare("delete", session_id).await else {
            return DeleteOutcome::Indeterminate;
        };
        self.delete_key(&key).await
    }

    /// Remove an object by exact key, e.g. an archive left under a previous
    /// key scheme. The key is required; everything after that behaves like
    /// [`Self::delete`].
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    pub async fn delete_previous_by_key(&self, remote_key: &str) -> StoreResult<DeleteOutcome> {
        if remote_key.trim().is_empty() {
            return Err(StoreError::invalid("remote key is required"));
        }
        let check = validator::check(&self.config, Some(self.client.as_ref()), Some(remote_key)).await;
        if !check.is_usable() {
            self.config.phase("delete_previous", format_args!("skipped: {:?}", check));
            return Ok(DeleteOutcome::Indeterminate);
        }
        let key = RemoteKey::from_string(remote_key.to_string());
        Ok(self.delete_key(&key).await)
    }

    async fn probe(&self, key: &RemoteKey) -> Presence {
        match self.client.head_object(&self.config.bucket, key.as_str()).await {
            Ok(_) => Presence::Present,
            Err(err) if err.is_not_found() => Presence::Absent,
            Err(err) => {
                warn!(key = %key, error = %err, "existence probe failed");
                Presence::Indeterminate
            }
        }
    }

    async fn delete_key(&self, key: &RemoteKey) -> DeleteOutcome {
        match self.probe(key).await {
            Presence::Present => {}
            Presence::Absent => {
                self.config.phase("delete", format_args!("{} not found", key));
                return DeleteOutcome::NotFound;
            }
            Presence::Indeterminate => return DeleteOutcome::Indeterminate,
        }

        match self.client.delete_object(&self.config.bucket, key.as_str()).await {
            Ok(()) => {
                info!(key = %key, "session archive deleted");
                DeleteOutcome::Deleted
            }
            Err(err) if err.is_not_found() => DeleteOutcome::NotFound,
            Err(err) => {
                warn!(key = %key, error = %err, "delete failed");
                DeleteOutcome::Indeterminate
            }
        }
    }
}

/// Field-by-field construction of a [`SessionStore`]
#[derive(Default)]
pub struct SessionStoreBuilder {
    client: Option<Arc<dyn ObjectStoreClient>>,
    bucket: String,
    remote_data_path: String,
    debug: bool,
    rules: TransferRules,
}

impl SessionStoreBuilder {
    pub fn client<C: ObjectStoreClient + 'static>(mut self, client: C) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    pub fn shared_client(mut self, client: Arc<dyn ObjectStoreClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn remote_data_path<S: Into<String>>(mut self, path: S) -> Self {
        self.remote_data_path = path.into();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn rules(mut self, rules: TransferRules) -> Self {
        self.rules = rules;
        self
    }

    /// Fails if any of bucket, base path or client is missing
    pub fn build(self) -> StoreResult<SessionStore> {
        let config = StoreConfig::new(self.bucket, self.remote_data_path)
            .with_debug(self.debug)
            .with_rules(self.rules);
        config.validate()?;
        let client = self
            .client
            .ok_or_else(|| StoreError::config("store client must be set"))?;
        SessionStore::with_shared_client(client, config)
    }
}
