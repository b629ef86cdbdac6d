use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::{StoreError, StoreResult};

/// Stream of bytes for archive content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Caller-supplied logical session name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Parse a session identifier. Empty or whitespace-only names are rejected;
    /// everything else is taken verbatim.
    pub fn parse<S: Into<String>>(id: S) -> StoreResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StoreError::invalid("session identifier must not be empty"));
        }
        Ok(Self(id))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object key inside the bucket, always `/`-separated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteKey(pub(crate) String);

impl RemoteKey {
    /// Wrap an exact key. Backslashes are normalized to `/`.
    pub fn from_string(key: String) -> Self {
        Self(key.replace('\\', "/"))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-issued identifier of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(pub String);

impl UploadId {
    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether an archive exists remotely.
///
/// `Indeterminate` means the store could not answer (misconfiguration or an
/// unexpected error); callers that only care about a yes/no should treat it
/// as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Present,
    Absent,
    Indeterminate,
}

impl Presence {
    pub fn is_present(self) -> bool {
        matches!(self, Self::Present)
    }
}

/// What a delete call ended up doing. Deletes never fail outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteOutcome {
    /// Object existed and the delete request succeeded
    Deleted,
    /// Nothing stored under the key
    NotFound,
    /// Skipped or failed; the object may or may not still exist
    Indeterminate,
}

/// Result of validating the store before an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCheck {
    /// Static checks passed and the probe reported success
    Valid,
    /// Static checks passed but the probe raised; operations still proceed
    Unverified { reason: String },
    /// Operation must not proceed
    Invalid { reason: String },
}

impl ConfigCheck {
    /// Valid or unverified
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Invalid { .. })
    }
}
