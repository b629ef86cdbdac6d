use crate::{RemoteKey, SessionId};

/// Suffix appended to every session name
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Map a session to its object key: `{remote_data_path}/{session}.zip`.
///
/// Pure; the same inputs always give the same key. Backslashes from
/// Windows-style paths are turned into `/`. The session name is not
/// inspected, so `..` segments pass through untouched.
pub fn derive_key(remote_data_path: &str, session_id: &SessionId) -> RemoteKey {
    let base = remote_data_path.trim_end_matches(|c| c == '/' || c == '\\');
    let joined = format!("{}/{}{}", base, session_id.as_str(), ARCHIVE_SUFFIX);
    RemoteKey(joined.replace('\\', "/"))
}
