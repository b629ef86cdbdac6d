use std::path::{Path, PathBuf};

use session_blob::{
    ClientCall, DeleteOutcome, Fault, MemoryObjectClient, ObjectAcl, Presence, SessionStore, StoreConfig,
    StoreError, TransferRules, UploadInfo,
};

/// Test factory functions
fn small_rules() -> TransferRules {
    TransferRules::new()
        .with_multipart_threshold(1_000)
        .with_part_size(100)
}

fn create_store(memory: &MemoryObjectClient) -> SessionStore {
    SessionStore::new(
        memory.clone(),
        StoreConfig::new("sessions", "prod/auth").with_rules(small_rules()),
    )
    .unwrap()
}

fn write_archive(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

fn put_calls(calls: &[ClientCall]) -> usize {
    calls.iter().filter(|c| matches!(c, ClientCall::Put { .. })).count()
}

fn part_calls(calls: &[ClientCall]) -> Vec<(u32, usize)> {
    calls
        .iter()
        .filter_map(|c| match c {
            ClientCall::UploadPart { part_number, size, .. } => Some((*part_number, *size)),
            _ => None,
        })
        .collect()
}

fn count(calls: &[ClientCall], pred: impl Fn(&ClientCall) -> bool) -> usize {
    calls.iter().filter(|c| pred(c)).count()
}

/// A1. Session key follows `{base}/{session}.zip`
#[tokio::test]
async fn test_saved_under_derived_key() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 10);

    let receipt = store.save("work-phone", &archive).await.unwrap().unwrap();

    assert_eq!(receipt.key.as_str(), "prod/auth/work-phone.zip");
    assert!(memory.object("prod/auth/work-phone.zip").is_some());
}

/// A2. Small archives use exactly one put
#[tokio::test]
async fn test_small_archive_is_single_shot() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 500);

    let receipt = store.save("s1", &archive).await.unwrap().unwrap();

    let calls = memory.calls();
    assert_eq!(put_calls(&calls), 1);
    assert_eq!(count(&calls, |c| matches!(c, ClientCall::CreateMultipart { .. })), 0);
    assert!(calls.contains(&ClientCall::Put {
        key: "prod/auth/s1.zip".into(),
        content_length: 500,
        content_type: "application/zip".into(),
        content_encoding: Some("gzip".into()),
        accelerate: true,
    }));
    assert_eq!(
        receipt.upload,
        UploadInfo::Single {
            content_encoding: Some("gzip".into()),
            accelerated: true
        }
    );
}

/// A3. Archive exactly at the threshold still goes up in one put
#[tokio::test]
async fn test_threshold_is_inclusive() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 1_000);

    store.save("s1", &archive).await.unwrap();

    let calls = memory.calls();
    assert_eq!(put_calls(&calls), 1);
    assert!(part_calls(&calls).is_empty());
}

/// A4. Large archives go multipart with contiguous ordered parts
#[tokio::test]
async fn test_large_archive_parts_are_ordered() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "big.zip", 1_050);

    let receipt = store.save("big", &archive).await.unwrap().unwrap();

    let calls = memory.calls();
    assert_eq!(put_calls(&calls), 0);
    assert!(calls.contains(&ClientCall::CreateMultipart {
        key: "prod/auth/big.zip".into(),
        acl: ObjectAcl::Private,
        content_type: "application/zip".into(),
    }));

    // ceil(1050 / 100) = 11
    let parts = part_calls(&calls);
    assert_eq!(parts.len(), 11);
    assert_eq!(parts.iter().map(|(n, _)| *n).collect::<Vec<_>>(), (1..=11).collect::<Vec<_>>());
    assert!(parts[..10].iter().all(|(_, size)| *size == 100));
    assert_eq!(parts[10].1, 50);

    assert!(calls.contains(&ClientCall::Complete {
        key: "prod/auth/big.zip".into(),
        part_numbers: (1..=11).collect(),
    }));
    assert!(matches!(receipt.upload, UploadInfo::Multipart { parts: 11, part_size: 100, .. }));
    assert_eq!(memory.pending_uploads(), 0);
}

/// B1. Existence tracks save and delete
#[tokio::test]
async fn test_exists_lifecycle() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 64);

    assert_eq!(store.presence("work-phone").await, Presence::Absent);
    assert!(!store.exists("work-phone").await);

    store.save("work-phone", &archive).await.unwrap();
    assert!(store.exists("work-phone").await);
    assert!(!store.exists("other").await);

    assert_eq!(store.delete("work-phone").await, DeleteOutcome::Deleted);
    assert!(!store.exists("work-phone").await);
}

/// B2. Delete is idempotent
#[tokio::test]
async fn test_delete_twice() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 64);
    store.save("s1", &archive).await.unwrap();

    assert_eq!(store.delete("s1").await, DeleteOutcome::Deleted);
    memory.clear_calls();
    assert_eq!(store.delete("s1").await, DeleteOutcome::NotFound);
    assert_eq!(store.delete("never-saved").await, DeleteOutcome::NotFound);

    let calls = memory.calls();
    assert_eq!(count(&calls, |c| matches!(c, ClientCall::Delete { .. })), 0);
}

/// B3. Round trip is byte-identical on both upload paths
#[tokio::test]
async fn test_round_trip() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();

    for (session, size) in [("small", 777usize), ("large", 2_345usize)] {
        let archive = write_archive(dir.path(), &format!("{}.zip", session), size);
        store.save(session, &archive).await.unwrap();

        let restored = dir.path().join("restore").join(format!("{}.zip", session));
        let receipt = store.extract(session, &restored).await.unwrap().unwrap();

        assert_eq!(receipt.size_bytes, size as u64);
        assert_eq!(std::fs::read(&restored).unwrap(), std::fs::read(&archive).unwrap());
    }
}

/// B4. Re-saving replaces the archive
#[tokio::test]
async fn test_resave_overwrites() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let first = write_archive(dir.path(), "first.zip", 10);
    let second = write_archive(dir.path(), "second.zip", 20);

    store.save("s1", &first).await.unwrap();
    store.save("s1", &second).await.unwrap();

    assert_eq!(memory.object("prod/auth/s1.zip").unwrap().len(), 20);
}

/// C1. Construction rejects missing configuration
#[test]
fn test_construction_requires_configuration() {
    assert!(matches!(
        SessionStore::new(MemoryObjectClient::new(), StoreConfig::new("", "prod/auth")),
        Err(StoreError::Config { .. })
    ));
    assert!(matches!(
        SessionStore::new(MemoryObjectClient::new(), StoreConfig::new("sessions", "")),
        Err(StoreError::Config { .. })
    ));
    assert!(matches!(
        SessionStore::builder().bucket("sessions").remote_data_path("prod/auth").build(),
        Err(StoreError::Config { .. })
    ));
}

/// C2. A rejected probe does not block operations
#[tokio::test]
async fn test_rejected_probe_still_proceeds() {
    let memory = MemoryObjectClient::new();
    memory.inject(Fault::ProbeRejected);
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 32);

    let receipt = store.save("s1", &archive).await.unwrap();
    assert!(receipt.is_some());
    assert!(store.exists("s1").await);
    assert_eq!(store.delete("s1").await, DeleteOutcome::Deleted);
}

/// C3. A non-success probe status short-circuits quietly
#[tokio::test]
async fn test_failed_probe_status_is_a_no_op() {
    let memory = MemoryObjectClient::new();
    memory.inject(Fault::ProbeStatus(503));
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 32);

    assert!(store.save("s1", &archive).await.unwrap().is_none());
    assert!(store.extract("s1", dir.path().join("out.zip")).await.unwrap().is_none());
    assert_eq!(store.presence("s1").await, Presence::Indeterminate);
    assert_eq!(store.delete("s1").await, DeleteOutcome::Indeterminate);

    let calls = memory.calls();
    assert!(calls.iter().all(|c| matches!(c, ClientCall::ListBucket { .. })));
    assert!(!dir.path().join("out.zip").exists());
}

/// D1. A failed part aborts the multipart upload
#[tokio::test]
async fn test_part_failure_aborts_upload() {
    let memory = MemoryObjectClient::new();
    memory.inject(Fault::Part(3));
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "big.zip", 1_500);

    let result = store.save("big", &archive).await;
    assert!(result.is_err());

    let calls = memory.calls();
    assert_eq!(count(&calls, |c| matches!(c, ClientCall::Abort { .. })), 1);
    assert_eq!(count(&calls, |c| matches!(c, ClientCall::Complete { .. })), 0);
    assert_eq!(part_calls(&calls).iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(memory.pending_uploads(), 0);
    assert!(memory.object("prod/auth/big.zip").is_none());
}

/// D2. A failed completion aborts and surfaces the error
#[tokio::test]
async fn test_complete_failure_aborts_upload() {
    let memory = MemoryObjectClient::new();
    memory.inject(Fault::Complete);
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "big.zip", 1_200);

    assert!(store.save("big", &archive).await.is_err());
    assert_eq!(count(&memory.calls(), |c| matches!(c, ClientCall::Abort { .. })), 1);
    assert_eq!(memory.pending_uploads(), 0);
}

/// D3. Abort failures do not mask the original error
#[tokio::test]
async fn test_abort_failure_keeps_original_error() {
    let memory = MemoryObjectClient::new();
    memory.inject(Fault::Part(1));
    memory.inject(Fault::Abort);
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "big.zip", 1_200);

    let err = store.save("big", &archive).await.unwrap_err();
    assert!(err.to_string().contains("injected part failure"));
}

/// D4. Put failures propagate
#[tokio::test]
async fn test_put_failure_propagates() {
    let memory = MemoryObjectClient::new();
    memory.inject(Fault::Put);
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 10);

    assert!(matches!(store.save("s1", &archive).await, Err(StoreError::Backend { .. })));
}

/// D5. Missing local archive is an error, and no upload is initiated
#[tokio::test]
async fn test_missing_local_archive() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();

    let result = store.save("s1", dir.path().join("nope.zip")).await;
    assert!(matches!(result, Err(StoreError::Io { .. })));
    assert_eq!(count(&memory.calls(), |c| matches!(c, ClientCall::CreateMultipart { .. })), 0);
}

/// D6. Probe errors fold into Indeterminate and never raise
#[tokio::test]
async fn test_head_failure_is_indeterminate() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    memory.insert_object("prod/auth/s1.zip", vec![1u8; 8]);
    memory.inject(Fault::Head);

    assert_eq!(store.presence("s1").await, Presence::Indeterminate);
    assert!(!store.exists("s1").await);
    assert_eq!(store.delete("s1").await, DeleteOutcome::Indeterminate);
    assert_eq!(count(&memory.calls(), |c| matches!(c, ClientCall::Delete { .. })), 0);
    assert!(memory.object("prod/auth/s1.zip").is_some());
}

/// D7. Delete request failures are swallowed
#[tokio::test]
async fn test_delete_failure_is_swallowed() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    memory.insert_object("prod/auth/s1.zip", vec![1u8; 8]);
    memory.inject(Fault::Delete);

    assert_eq!(store.delete("s1").await, DeleteOutcome::Indeterminate);
}

/// D8. Extracting a missing archive fails without leaving a file
#[tokio::test]
async fn test_extract_missing_archive() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("restored.zip");

    let err = store.extract("ghost", &destination).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!destination.exists());
}

/// D9. A body interrupted mid-stream fails the extract and leaves no file
#[tokio::test]
async fn test_interrupted_download_removes_partial_file() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    memory.insert_object("prod/auth/s1.zip", vec![5u8; 300]);
    memory.inject(Fault::GetInterrupted);
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("restored.zip");

    let err = store.extract("s1", &destination).await.unwrap_err();

    assert!(matches!(err, StoreError::Io { .. }));
    assert!(!destination.exists());
}

/// D10. A body shorter than its declared length fails the extract and leaves no file
#[tokio::test]
async fn test_short_download_removes_partial_file() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    memory.insert_object("prod/auth/s1.zip", vec![5u8; 300]);
    memory.inject(Fault::GetTruncated);
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("restored.zip");

    let err = store.extract("s1", &destination).await.unwrap_err();

    assert!(matches!(err, StoreError::Transfer { .. }));
    assert!(err.to_string().contains("expected 300 bytes, received 150"));
    assert!(!destination.exists());
}

/// D11. A failed request creates no file, and extract recovers once the store does
#[tokio::test]
async fn test_failed_get_then_recovery() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    memory.insert_object("prod/auth/s1.zip", vec![5u8; 300]);
    memory.inject(Fault::Get);
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("nested").join("restored.zip");

    assert!(matches!(
        store.extract("s1", &destination).await,
        Err(StoreError::Backend { .. })
    ));
    assert!(!destination.exists());

    memory.clear_faults();
    let receipt = store.extract("s1", &destination).await.unwrap().unwrap();
    assert_eq!(receipt.size_bytes, 300);
    assert_eq!(std::fs::read(&destination).unwrap(), vec![5u8; 300]);
}

/// E1. Previous archives are removed by exact key
#[tokio::test]
async fn test_delete_previous_by_key() {
    let memory = MemoryObjectClient::new();
    let store = create_store(&memory);
    memory.insert_object("legacy/auth/work-phone.zip", vec![9u8; 4]);

    let outcome = store
        .delete_previous_by_key("legacy\\auth\\work-phone.zip")
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(memory.object("legacy/auth/work-phone.zip").is_none());

    let again = store.delete_previous_by_key("legacy/auth/work-phone.zip").await.unwrap();
    assert_eq!(again, DeleteOutcome::NotFound);
}

/// E2. Archives needing more parts than allowed are refused up front
#[tokio::test]
async fn test_part_limit() {
    let memory = MemoryObjectClient::new();
    let store = SessionStore::new(
        memory.clone(),
        StoreConfig::new("sessions", "prod/auth").with_rules(small_rules().with_max_parts(5)),
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "big.zip", 1_050);

    assert!(matches!(store.save("big", &archive).await, Err(StoreError::Invalid { .. })));
    assert_eq!(count(&memory.calls(), |c| matches!(c, ClientCall::CreateMultipart { .. })), 0);
}

/// E3. Declared encoding and acceleration follow the rules
#[tokio::test]
async fn test_put_headers_follow_rules() {
    let memory = MemoryObjectClient::new();
    let store = SessionStore::new(
        memory.clone(),
        StoreConfig::new("sessions", "prod/auth").with_rules(
            small_rules()
                .with_content_encoding(None)
                .with_acceleration(false)
                .without_probe(),
        ),
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(dir.path(), "a.zip", 10);

    store.save("s1", &archive).await.unwrap();

    assert_eq!(
        memory.calls(),
        vec![ClientCall::Put {
            key: "prod/auth/s1.zip".into(),
            content_length: 10,
            content_type: "application/zip".into(),
            content_encoding: None,
            accelerate: false,
        }]
    );
}
