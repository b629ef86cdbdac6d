use tracing::{debug, warn};

use crate::client::ObjectStoreClient;
use crate::{ConfigCheck, StoreConfig};

/// Static checks, in order: subject, bucket, base path, client.
/// Returns the first missing piece.
pub fn missing_field(config: &StoreConfig, has_client: bool, subject: Option<&str>) -> Option<&'static str> {
    if subject.map_or(true, |s| s.trim().is_empty()) {
        return Some("session identifier");
    }
    if config.bucket.trim().is_empty() {
        return Some("bucket");
    }
    if config.remote_data_path.trim().is_empty() {
        return Some("remote data path");
    }
    if !has_client {
        return Some("store client");
    }
    None
}

/// Decide whether an operation on `subject` may proceed.
///
/// After the static checks the bucket is listed. A success status is
/// `Valid`; a non-success status is `Invalid`. A probe that errors out is
/// `Unverified` and the operation proceeds anyway: listing is often denied
/// to credentials that may still read and write individual keys.
pub async fn check(
    config: &StoreConfig,
    client: Option<&dyn ObjectStoreClient>,
    subject: Option<&str>,
) -> ConfigCheck {
    let client = match (missing_field(config, client.is_some(), subject), client) {
        (None, Some(client)) => client,
        (field, _) => {
            let field = field.unwrap_or("store client");
            warn!(field, "session store not usable: missing {}", field);
            return ConfigCheck::Invalid {
                reason: format!("missing {}", field),
            };
        }
    };

    if !config.rules.probe_connectivity {
        return ConfigCheck::Valid;
    }

    match client.list_bucket(&config.bucket).await {
        Ok(status) if status.is_success() => {
            debug!(bucket = %config.bucket, status = status.status_code, "store probe succeeded");
            ConfigCheck::Valid
        }
        Ok(status) => {
            warn!(bucket = %config.bucket, status = status.status_code, "store probe returned non-success status");
            ConfigCheck::Invalid {
                reason: format!("probe status {}", status.status_code),
            }
        }
        Err(err) => {
            warn!(bucket = %config.bucket, error = %err, "store probe failed; proceeding without verification");
            ConfigCheck::Unverified {
                reason: err.to_string(),
            }
        }
    }
}
