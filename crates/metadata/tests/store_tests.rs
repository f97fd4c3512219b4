//! SQLite store integration tests.

use shardbox_metadata::models::{
    DownloadSessionRow, DriveAccountRow, OAuthStateRow, StoredChunkRow, StoredFileRow,
    UploadSessionRow, UserRow,
};
use shardbox_metadata::repos::{
    DownloadSessionRepo, OAuthStateRepo, StoredFileRepo, UploadSessionRepo, UserRepo,
};
use shardbox_metadata::{MetadataError, MetadataStore, SqliteStore};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

async fn open_store() -> (tempfile::TempDir, SqliteStore) {
    let temp = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(temp.path().join("metadata.db"))
        .await
        .unwrap();
    (temp, store)
}

fn user() -> UserRow {
    UserRow {
        user_id: Uuid::new_v4(),
        email: format!("{}@example.com", Uuid::new_v4()),
        password_hash: "$argon2id$test".to_string(),
        created_at: OffsetDateTime::now_utc(),
    }
}

fn account(user_id: Uuid) -> DriveAccountRow {
    DriveAccountRow {
        account_id: Uuid::new_v4(),
        user_id,
        provider: "google".to_string(),
        display_name: "Google Drive".to_string(),
        encrypted_token: vec![1, 2, 3, 4],
        drive_id: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

fn upload_session(user_id: Uuid) -> UploadSessionRow {
    let now = OffsetDateTime::now_utc();
    UploadSessionRow {
        session_id: Uuid::new_v4(),
        user_id,
        file_id: "0011223344556677".to_string(),
        original_filename: "report.pdf".to_string(),
        temp_file_path: "/tmp/2xpfm_uploads/x_report.pdf".to_string(),
        total_size: 1000,
        uploaded_size: 0,
        status: "uploading".to_string(),
        processing_progress: 0.0,
        error_message: None,
        key_file_path: None,
        created_at: now,
        expires_at: now + Duration::hours(1),
        completed_at: None,
    }
}

fn stored_file(user_id: Uuid, file_id: &str) -> (StoredFileRow, Vec<StoredChunkRow>) {
    let file = StoredFileRow {
        file_id: file_id.to_string(),
        user_id,
        original_filename: "report.pdf".to_string(),
        original_size: 1000,
        processed_size: 1256,
        obfuscation_seed: "c2VlZA==".to_string(),
        status: "active".to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    let chunks = (1..=2)
        .map(|i| StoredChunkRow {
            user_id,
            file_id: file_id.to_string(),
            chunk_id: i,
            drive_account_id: Uuid::new_v4(),
            drive_id: Some(format!("drive{i}00000000000")),
            drive_file_id: format!("gdrive-{i}"),
            filename: format!("{file_id}_{i:02}.2xpfm"),
            size_bytes: 628,
            checksum: "a".repeat(64),
            start_offset: (i - 1) * 628,
            end_offset: i * 628,
        })
        .collect();
    (file, chunks)
}

#[tokio::test]
async fn user_email_is_unique() {
    let (_temp, store) = open_store().await;

    let mut u = user();
    u.email = "dup@example.com".to_string();
    store.create_user(&u).await.unwrap();

    let mut u2 = user();
    u2.email = "dup@example.com".to_string();
    let err = store.create_user(&u2).await.unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)));
}

#[tokio::test]
async fn user_lookup_by_email_and_id() {
    let (_temp, store) = open_store().await;
    let u = user();
    store.create_user(&u).await.unwrap();

    let by_email = store.get_user_by_email(&u.email).await.unwrap().unwrap();
    assert_eq!(by_email.user_id, u.user_id);

    let by_id = store.get_user(u.user_id).await.unwrap().unwrap();
    assert_eq!(by_id.email, u.email);

    assert!(store.get_user_by_email("nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn drive_accounts_append_and_update() {
    let (_temp, store) = open_store().await;
    let u = user();
    store.create_user(&u).await.unwrap();

    let a1 = account(u.user_id);
    let a2 = account(u.user_id);
    store.add_drive_account(&a1).await.unwrap();
    store.add_drive_account(&a2).await.unwrap();

    let listed = store.list_drive_accounts(u.user_id).await.unwrap();
    assert_eq!(listed.len(), 2);

    store
        .set_account_drive_id(a1.account_id, "00112233aabbccdd")
        .await
        .unwrap();
    store
        .update_account_token(a1.account_id, &[9, 9, 9])
        .await
        .unwrap();

    let fetched = store.get_drive_account(a1.account_id).await.unwrap().unwrap();
    assert_eq!(fetched.drive_id.as_deref(), Some("00112233aabbccdd"));
    assert_eq!(fetched.encrypted_token, vec![9, 9, 9]);

    let err = store
        .set_account_drive_id(Uuid::new_v4(), "00112233aabbccdd")
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::NotFound(_)));
}

#[tokio::test]
async fn oauth_state_is_single_use() {
    let (_temp, store) = open_store().await;
    let row = OAuthStateRow {
        state: "abc123".to_string(),
        user_id: Uuid::new_v4(),
        provider: "google".to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    store.insert_oauth_state(&row).await.unwrap();

    let taken = store.take_oauth_state("abc123").await.unwrap().unwrap();
    assert_eq!(taken.user_id, row.user_id);

    assert!(store.take_oauth_state("abc123").await.unwrap().is_none());
}

#[tokio::test]
async fn uploaded_size_is_monotonic() {
    let (_temp, store) = open_store().await;
    let session = upload_session(Uuid::new_v4());
    store.create_upload_session(&session).await.unwrap();

    store
        .update_uploaded_size(session.session_id, 500)
        .await
        .unwrap();
    // A lagging chunk request must not rewind progress.
    store
        .update_uploaded_size(session.session_id, 200)
        .await
        .unwrap();

    let row = store
        .get_upload_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.uploaded_size, 500);
}

#[tokio::test]
async fn upload_status_and_completion_lifecycle() {
    let (_temp, store) = open_store().await;
    let session = upload_session(Uuid::new_v4());
    store.create_upload_session(&session).await.unwrap();

    store
        .update_upload_status(session.session_id, "processing", 30.0, None)
        .await
        .unwrap();
    store
        .set_key_file_path(session.session_id, "/tmp/key")
        .await
        .unwrap();
    store
        .complete_upload_session(session.session_id, OffsetDateTime::now_utc())
        .await
        .unwrap();

    let row = store
        .get_upload_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "complete");
    assert_eq!(row.processing_progress, 100.0);
    assert_eq!(row.key_file_path.as_deref(), Some("/tmp/key"));
    assert!(row.completed_at.is_some());
}

#[tokio::test]
async fn failed_status_records_error_message() {
    let (_temp, store) = open_store().await;
    let session = upload_session(Uuid::new_v4());
    store.create_upload_session(&session).await.unwrap();

    store
        .update_upload_status(session.session_id, "failed", 50.0, Some("split: short read"))
        .await
        .unwrap();

    let row = store
        .get_upload_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "failed");
    assert_eq!(row.error_message.as_deref(), Some("split: short read"));
}

#[tokio::test]
async fn count_active_sessions_only_counts_live_states() {
    let (_temp, store) = open_store().await;
    let user_id = Uuid::new_v4();

    let s1 = upload_session(user_id);
    let mut s2 = upload_session(user_id);
    s2.session_id = Uuid::new_v4();
    s2.status = "processing".to_string();
    let mut s3 = upload_session(user_id);
    s3.session_id = Uuid::new_v4();
    s3.status = "complete".to_string();
    let other = upload_session(Uuid::new_v4());

    for s in [&s1, &s2, &s3, &other] {
        store.create_upload_session(s).await.unwrap();
    }

    assert_eq!(store.count_active_sessions(user_id).await.unwrap(), 2);
}

#[tokio::test]
async fn expired_sessions_are_found_and_deletable() {
    let (_temp, store) = open_store().await;

    let mut expired = upload_session(Uuid::new_v4());
    expired.expires_at = OffsetDateTime::now_utc() - Duration::minutes(5);
    let live = upload_session(Uuid::new_v4());

    store.create_upload_session(&expired).await.unwrap();
    store.create_upload_session(&live).await.unwrap();

    let found = store
        .get_expired_upload_sessions(OffsetDateTime::now_utc(), 10)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].session_id, expired.session_id);

    store
        .delete_upload_session(expired.session_id)
        .await
        .unwrap();
    assert!(store
        .get_upload_session(expired.session_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn download_session_lifecycle() {
    let (_temp, store) = open_store().await;
    let now = OffsetDateTime::now_utc();
    let session = DownloadSessionRow {
        session_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        file_id: "0011223344556677".to_string(),
        original_filename: "report.pdf".to_string(),
        status: "downloading".to_string(),
        progress: 0.0,
        error_message: None,
        temp_file_path: "/tmp/2xpfm_downloads/x".to_string(),
        reconstructed_path: None,
        created_at: now,
        expires_at: now + Duration::hours(1),
        completed_at: None,
    };
    store.create_download_session(&session).await.unwrap();

    store
        .update_download_status(session.session_id, "decrypting", 75.0, None)
        .await
        .unwrap();
    store
        .set_reconstructed_path(session.session_id, "/tmp/x_reconstructed")
        .await
        .unwrap();
    store
        .complete_download_session(session.session_id, OffsetDateTime::now_utc())
        .await
        .unwrap();

    let row = store
        .get_download_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "complete");
    assert_eq!(row.progress, 100.0);
    assert_eq!(
        row.reconstructed_path.as_deref(),
        Some("/tmp/x_reconstructed")
    );
}

#[tokio::test]
async fn stored_file_roundtrip_with_chunks() {
    let (_temp, store) = open_store().await;
    let user_id = Uuid::new_v4();
    let (file, chunks) = stored_file(user_id, "aaaabbbbccccdddd");

    store.create_stored_file(&file, &chunks).await.unwrap();

    let (fetched, fetched_chunks) = store
        .get_stored_file(user_id, "aaaabbbbccccdddd")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.processed_size, 1256);
    assert_eq!(fetched_chunks.len(), 2);
    assert_eq!(fetched_chunks[0].chunk_id, 1);
    assert_eq!(fetched_chunks[1].chunk_id, 2);

    let err = store.create_stored_file(&file, &chunks).await.unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)));
}

#[tokio::test]
async fn list_stored_files_reports_chunk_counts() {
    let (_temp, store) = open_store().await;
    let user_id = Uuid::new_v4();

    let (f1, c1) = stored_file(user_id, "aaaa000000000001");
    store.create_stored_file(&f1, &c1).await.unwrap();

    let (mut f2, _) = stored_file(user_id, "aaaa000000000002");
    f2.status = "deleted".to_string();
    store.create_stored_file(&f2, &[]).await.unwrap();

    let listed = store.list_stored_files(user_id).await.unwrap();
    assert_eq!(listed.len(), 1, "deleted files are not listed");
    assert_eq!(listed[0].file_id, "aaaa000000000001");
    assert_eq!(listed[0].num_chunks, 2);
}

#[tokio::test]
async fn mark_files_incomplete_for_drive_targets_matching_files() {
    let (_temp, store) = open_store().await;
    let user_id = Uuid::new_v4();

    let (f1, mut c1) = stored_file(user_id, "aaaa000000000001");
    c1[0].drive_id = Some("feedfeedfeedfeed".to_string());
    store.create_stored_file(&f1, &c1).await.unwrap();

    let (f2, c2) = stored_file(user_id, "aaaa000000000002");
    store.create_stored_file(&f2, &c2).await.unwrap();

    let affected = store
        .mark_files_incomplete_for_drive(user_id, "feedfeedfeedfeed")
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let (row, _) = store
        .get_stored_file(user_id, "aaaa000000000001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "incomplete");

    let (untouched, _) = store
        .get_stored_file(user_id, "aaaa000000000002")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, "active");

    let on_drive = store
        .get_files_for_drive(user_id, "feedfeedfeedfeed")
        .await
        .unwrap();
    assert!(on_drive.is_empty(), "incomplete files are not 'active'");
}

#[tokio::test]
async fn health_check_passes() {
    let (_temp, store) = open_store().await;
    store.health_check().await.unwrap();
}
