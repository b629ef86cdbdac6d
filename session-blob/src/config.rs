use serde::Deserialize;
use std::env;
use std::fmt;
use tracing::{debug, info};

use crate::{StoreError, StoreResult};

/// Archives at or below this size go up in a single put (4 GiB)
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 4 * 1024 * 1024 * 1024;

/// Size of every multipart part except the last (20 MiB)
pub const DEFAULT_PART_SIZE: u64 = 20 * 1024 * 1024;

/// Content type used for every session archive
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Configuration for a session store
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Bucket (or container) holding the archives
    pub bucket: String,

    /// Base path inside the bucket; keys are `{remote_data_path}/{session}.zip`
    pub remote_data_path: String,

    /// Emit per-phase diagnostics at info level instead of debug
    #[serde(default)]
    pub debug: bool,

    /// Transfer tuning
    #[serde(default)]
    pub rules: TransferRules,
}

/// Rules for how archives move to and from the store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferRules {
    /// Archives strictly larger than this use multipart upload
    pub multipart_threshold_bytes: u64,

    /// Part size for multipart uploads. Applies to all parts except the final one.
    pub part_size: u64,

    /// Upper bound on parts for a single archive
    pub max_parts: u32,

    /// Content-Encoding header declared on single-shot puts.
    /// The body is sent as-is; this is only metadata.
    pub content_encoding: Option<String>,

    /// Ask the store to route single-shot uploads through accelerated endpoints
    pub accelerate: bool,

    /// Run the list-bucket probe before every operation
    pub probe_connectivity: bool,
}

impl Default for TransferRules {
    fn default() -> Self {
        Self {
            multipart_threshold_bytes: DEFAULT_MULTIPART_THRESHOLD,
            part_size: DEFAULT_PART_SIZE,
            max_parts: 10_000,
            content_encoding: Some("gzip".to_string()),
            accelerate: true,
            probe_connectivity: true,
        }
    }
}

impl StoreConfig {
    /// Create a config with default transfer rules
    pub fn new<B: Into<String>, P: Into<String>>(bucket: B, remote_data_path: P) -> Self {
        Self {
            bucket: bucket.into(),
            remote_data_path: remote_data_path.into(),
            debug: false,
            rules: TransferRules::default(),
        }
    }

    /// Load from `SESSION_BLOB_BUCKET`, `SESSION_BLOB_REMOTE_PATH` and the
    /// optional `SESSION_BLOB_DEBUG`. The environment is read once, here.
    pub fn from_env() -> StoreResult<Self> {
        fn get_env(key: &str) -> StoreResult<String> {
            env::var(key).map_err(|_| StoreError::config(format!("{} environment variable required", key)))
        }

        let debug = env::var("SESSION_BLOB_DEBUG")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Ok(Self::new(get_env("SESSION_BLOB_BUCKET")?, get_env("SESSION_BLOB_REMOTE_PATH")?)
            .with_debug(debug))
    }

    /// Enable or disable phase diagnostics
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Replace transfer rules
    pub fn with_rules(mut self, rules: TransferRules) -> Self {
        self.rules = rules;
        self
    }

    /// Check the static fields. Called once when a store is built.
    pub fn validate(&self) -> StoreResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(StoreError::config("bucket must be set"));
        }
        if self.remote_data_path.trim().is_empty() {
            return Err(StoreError::config("remote_data_path must be set"));
        }
        self.rules.validate()
    }

    /// One diagnostic line for a phase of an operation. Info when `debug`
    /// is set, debug otherwise; the subscriber adds the timestamp.
    pub(crate) fn phase(&self, operation: &str, detail: fmt::Arguments<'_>) {
        if self.debug {
            info!(operation, "{}", detail);
        } else {
            debug!(operation, "{}", detail);
        }
    }
}

impl TransferRules {
    /// Create new transfer rules with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the single-shot/multipart cut-over size
    pub fn with_multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold_bytes = bytes;
        self
    }

    /// Set part size
    pub fn with_part_size(mut self, bytes: u64) -> Self {
        self.part_size = bytes;
        self
    }

    /// Set max parts
    pub fn with_max_parts(mut self, max: u32) -> Self {
        self.max_parts = max;
        self
    }

    /// Declare a different Content-Encoding, or none
    pub fn with_content_encoding(mut self, encoding: Option<&str>) -> Self {
        self.content_encoding = encoding.map(str::to_string);
        self
    }

    /// Toggle transfer acceleration hint
    pub fn with_acceleration(mut self, accelerate: bool) -> Self {
        self.accelerate = accelerate;
        self
    }

    /// Skip the live list-bucket probe
    pub fn without_probe(mut self) -> Self {
        self.probe_connectivity = false;
        self
    }

    fn validate(&self) -> StoreResult<()> {
        if self.part_size == 0 {
            return Err(StoreError::config("part_size must be greater than zero"));
        }
        if self.max_parts == 0 {
            return Err(StoreError::config("max_parts must be greater than zero"));
        }
        Ok(())
    }
}

/// Accepts `1`, `true`, `yes`, `on` in any case
pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
