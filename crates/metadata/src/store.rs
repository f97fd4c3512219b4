//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    DownloadSessionRepo, OAuthStateRepo, StoredFileRepo, UploadSessionRepo, UserRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    UserRepo + OAuthStateRepo + UploadSessionRepo + DownloadSessionRepo + StoredFileRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id        BLOB PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS drive_accounts (
    account_id      BLOB PRIMARY KEY,
    user_id         BLOB NOT NULL REFERENCES users(user_id),
    provider        TEXT NOT NULL,
    display_name    TEXT NOT NULL,
    encrypted_token BLOB NOT NULL,
    drive_id        TEXT,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_drive_accounts_user ON drive_accounts(user_id);

CREATE TABLE IF NOT EXISTS oauth_states (
    state      TEXT PRIMARY KEY,
    user_id    BLOB NOT NULL,
    provider   TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS upload_sessions (
    session_id          BLOB PRIMARY KEY,
    user_id             BLOB NOT NULL,
    file_id             TEXT NOT NULL,
    original_filename   TEXT NOT NULL,
    temp_file_path      TEXT NOT NULL,
    total_size          INTEGER NOT NULL,
    uploaded_size       INTEGER NOT NULL DEFAULT 0,
    status              TEXT NOT NULL,
    processing_progress REAL NOT NULL DEFAULT 0,
    error_message       TEXT,
    key_file_path       TEXT,
    created_at          TEXT NOT NULL,
    expires_at          TEXT NOT NULL,
    completed_at        TEXT
);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_user ON upload_sessions(user_id, status);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_expiry ON upload_sessions(expires_at);

CREATE TABLE IF NOT EXISTS download_sessions (
    session_id         BLOB PRIMARY KEY,
    user_id            BLOB NOT NULL,
    file_id            TEXT NOT NULL,
    original_filename  TEXT NOT NULL,
    status             TEXT NOT NULL,
    progress           REAL NOT NULL DEFAULT 0,
    error_message      TEXT,
    temp_file_path     TEXT NOT NULL,
    reconstructed_path TEXT,
    created_at         TEXT NOT NULL,
    expires_at         TEXT NOT NULL,
    completed_at       TEXT
);
CREATE INDEX IF NOT EXISTS idx_download_sessions_expiry ON download_sessions(expires_at);

CREATE TABLE IF NOT EXISTS stored_files (
    file_id           TEXT NOT NULL,
    user_id           BLOB NOT NULL,
    original_filename TEXT NOT NULL,
    original_size     INTEGER NOT NULL,
    processed_size    INTEGER NOT NULL,
    obfuscation_seed  TEXT NOT NULL,
    status            TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    PRIMARY KEY (user_id, file_id)
);
CREATE INDEX IF NOT EXISTS idx_stored_files_status ON stored_files(user_id, status);

CREATE TABLE IF NOT EXISTS stored_chunks (
    user_id          BLOB NOT NULL,
    file_id          TEXT NOT NULL,
    chunk_id         INTEGER NOT NULL,
    drive_account_id BLOB NOT NULL,
    drive_id         TEXT,
    drive_file_id    TEXT NOT NULL,
    filename         TEXT NOT NULL,
    size_bytes       INTEGER NOT NULL,
    checksum         TEXT NOT NULL,
    start_offset     INTEGER NOT NULL,
    end_offset       INTEGER NOT NULL,
    PRIMARY KEY (user_id, file_id, chunk_id),
    FOREIGN KEY (user_id, file_id) REFERENCES stored_files(user_id, file_id)
);
CREATE INDEX IF NOT EXISTS idx_stored_chunks_drive ON stored_chunks(user_id, drive_id);
"#;

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under axum
            // and test concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Repository implementations for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn is_unique_violation(e: &sqlx::Error) -> bool {
        matches!(e, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint"))
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
            let result = sqlx::query(
                "INSERT INTO users (user_id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(user.user_id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(format!(
                    "email '{}' already registered",
                    user.email
                ))),
                Err(e) => Err(e.into()),
            }
        }

        async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn add_drive_account(&self, account: &DriveAccountRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO drive_accounts (
                    account_id, user_id, provider, display_name,
                    encrypted_token, drive_id, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(account.account_id)
            .bind(account.user_id)
            .bind(&account.provider)
            .bind(&account.display_name)
            .bind(&account.encrypted_token)
            .bind(&account.drive_id)
            .bind(account.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn list_drive_accounts(
            &self,
            user_id: Uuid,
        ) -> MetadataResult<Vec<DriveAccountRow>> {
            let rows = sqlx::query_as::<_, DriveAccountRow>(
                "SELECT * FROM drive_accounts WHERE user_id = ? ORDER BY created_at",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_drive_account(
            &self,
            account_id: Uuid,
        ) -> MetadataResult<Option<DriveAccountRow>> {
            let row = sqlx::query_as::<_, DriveAccountRow>(
                "SELECT * FROM drive_accounts WHERE account_id = ?",
            )
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn set_account_drive_id(
            &self,
            account_id: Uuid,
            drive_id: &str,
        ) -> MetadataResult<()> {
            let result =
                sqlx::query("UPDATE drive_accounts SET drive_id = ? WHERE account_id = ?")
                    .bind(drive_id)
                    .bind(account_id)
                    .execute(&self.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "drive account {account_id} not found"
                )));
            }
            Ok(())
        }

        async fn update_account_token(
            &self,
            account_id: Uuid,
            encrypted_token: &[u8],
        ) -> MetadataResult<()> {
            let result =
                sqlx::query("UPDATE drive_accounts SET encrypted_token = ? WHERE account_id = ?")
                    .bind(encrypted_token)
                    .bind(account_id)
                    .execute(&self.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "drive account {account_id} not found"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl OAuthStateRepo for SqliteStore {
        async fn insert_oauth_state(&self, state: &OAuthStateRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO oauth_states (state, user_id, provider, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&state.state)
            .bind(state.user_id)
            .bind(&state.provider)
            .bind(state.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn take_oauth_state(&self, state: &str) -> MetadataResult<Option<OAuthStateRow>> {
            // Find-and-delete in one transaction so a state is single-use.
            let mut tx = self.pool.begin().await?;

            let row = sqlx::query_as::<_, OAuthStateRow>(
                "SELECT * FROM oauth_states WHERE state = ?",
            )
            .bind(state)
            .fetch_optional(&mut *tx)
            .await?;

            if row.is_some() {
                sqlx::query("DELETE FROM oauth_states WHERE state = ?")
                    .bind(state)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl UploadSessionRepo for SqliteStore {
        async fn create_upload_session(&self, session: &UploadSessionRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO upload_sessions (
                    session_id, user_id, file_id, original_filename, temp_file_path,
                    total_size, uploaded_size, status, processing_progress,
                    error_message, key_file_path, created_at, expires_at, completed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session.session_id)
            .bind(session.user_id)
            .bind(&session.file_id)
            .bind(&session.original_filename)
            .bind(&session.temp_file_path)
            .bind(session.total_size)
            .bind(session.uploaded_size)
            .bind(&session.status)
            .bind(session.processing_progress)
            .bind(&session.error_message)
            .bind(&session.key_file_path)
            .bind(session.created_at)
            .bind(session.expires_at)
            .bind(session.completed_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_upload_session(
            &self,
            session_id: Uuid,
        ) -> MetadataResult<Option<UploadSessionRow>> {
            let row = sqlx::query_as::<_, UploadSessionRow>(
                "SELECT * FROM upload_sessions WHERE session_id = ?",
            )
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn update_uploaded_size(
            &self,
            session_id: Uuid,
            uploaded_size: i64,
        ) -> MetadataResult<()> {
            // MAX keeps the column monotonic under interleaved chunk requests.
            sqlx::query(
                "UPDATE upload_sessions SET uploaded_size = MAX(uploaded_size, ?) WHERE session_id = ?",
            )
            .bind(uploaded_size)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn update_upload_status(
            &self,
            session_id: Uuid,
            status: &str,
            progress: f64,
            error_message: Option<&str>,
        ) -> MetadataResult<()> {
            match error_message {
                Some(message) => {
                    sqlx::query(
                        "UPDATE upload_sessions SET status = ?, processing_progress = ?, error_message = ? WHERE session_id = ?",
                    )
                    .bind(status)
                    .bind(progress)
                    .bind(message)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await?;
                }
                None => {
                    sqlx::query(
                        "UPDATE upload_sessions SET status = ?, processing_progress = ? WHERE session_id = ?",
                    )
                    .bind(status)
                    .bind(progress)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await?;
                }
            }
            Ok(())
        }

        async fn set_key_file_path(&self, session_id: Uuid, path: &str) -> MetadataResult<()> {
            sqlx::query("UPDATE upload_sessions SET key_file_path = ? WHERE session_id = ?")
                .bind(path)
                .bind(session_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn complete_upload_session(
            &self,
            session_id: Uuid,
            completed_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query(
                "UPDATE upload_sessions SET status = 'complete', processing_progress = 100, completed_at = ? WHERE session_id = ?",
            )
            .bind(completed_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn count_active_sessions(&self, user_id: Uuid) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM upload_sessions WHERE user_id = ? AND status IN ('uploading', 'processing')",
            )
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(count as u64)
        }

        async fn get_expired_upload_sessions(
            &self,
            now: OffsetDateTime,
            limit: u32,
        ) -> MetadataResult<Vec<UploadSessionRow>> {
            let rows = sqlx::query_as::<_, UploadSessionRow>(
                "SELECT * FROM upload_sessions WHERE expires_at < ? ORDER BY expires_at LIMIT ?",
            )
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_upload_session(&self, session_id: Uuid) -> MetadataResult<()> {
            sqlx::query("DELETE FROM upload_sessions WHERE session_id = ?")
                .bind(session_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl DownloadSessionRepo for SqliteStore {
        async fn create_download_session(
            &self,
            session: &DownloadSessionRow,
        ) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO download_sessions (
                    session_id, user_id, file_id, original_filename, status,
                    progress, error_message, temp_file_path, reconstructed_path,
                    created_at, expires_at, completed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session.session_id)
            .bind(session.user_id)
            .bind(&session.file_id)
            .bind(&session.original_filename)
            .bind(&session.status)
            .bind(session.progress)
            .bind(&session.error_message)
            .bind(&session.temp_file_path)
            .bind(&session.reconstructed_path)
            .bind(session.created_at)
            .bind(session.expires_at)
            .bind(session.completed_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_download_session(
            &self,
            session_id: Uuid,
        ) -> MetadataResult<Option<DownloadSessionRow>> {
            let row = sqlx::query_as::<_, DownloadSessionRow>(
                "SELECT * FROM download_sessions WHERE session_id = ?",
            )
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn update_download_status(
            &self,
            session_id: Uuid,
            status: &str,
            progress: f64,
            error_message: Option<&str>,
        ) -> MetadataResult<()> {
            match error_message {
                Some(message) => {
                    sqlx::query(
                        "UPDATE download_sessions SET status = ?, progress = ?, error_message = ? WHERE session_id = ?",
                    )
                    .bind(status)
                    .bind(progress)
                    .bind(message)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await?;
                }
                None => {
                    sqlx::query(
                        "UPDATE download_sessions SET status = ?, progress = ? WHERE session_id = ?",
                    )
                    .bind(status)
                    .bind(progress)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await?;
                }
            }
            Ok(())
        }

        async fn set_reconstructed_path(
            &self,
            session_id: Uuid,
            path: &str,
        ) -> MetadataResult<()> {
            sqlx::query(
                "UPDATE download_sessions SET reconstructed_path = ? WHERE session_id = ?",
            )
            .bind(path)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn complete_download_session(
            &self,
            session_id: Uuid,
            completed_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query(
                "UPDATE download_sessions SET status = 'complete', progress = 100, completed_at = ? WHERE session_id = ?",
            )
            .bind(completed_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_expired_download_sessions(
            &self,
            now: OffsetDateTime,
            limit: u32,
        ) -> MetadataResult<Vec<DownloadSessionRow>> {
            let rows = sqlx::query_as::<_, DownloadSessionRow>(
                "SELECT * FROM download_sessions WHERE expires_at < ? ORDER BY expires_at LIMIT ?",
            )
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_download_session(&self, session_id: Uuid) -> MetadataResult<()> {
            sqlx::query("DELETE FROM download_sessions WHERE session_id = ?")
                .bind(session_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl StoredFileRepo for SqliteStore {
        async fn create_stored_file(
            &self,
            file: &StoredFileRow,
            chunks: &[StoredChunkRow],
        ) -> MetadataResult<()> {
            // File and chunk rows land together or not at all.
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                r#"
                INSERT INTO stored_files (
                    file_id, user_id, original_filename, original_size,
                    processed_size, obfuscation_seed, status, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&file.file_id)
            .bind(file.user_id)
            .bind(&file.original_filename)
            .bind(file.original_size)
            .bind(file.processed_size)
            .bind(&file.obfuscation_seed)
            .bind(&file.status)
            .bind(file.created_at)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(MetadataError::AlreadyExists(format!(
                        "file {} already stored",
                        file.file_id
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            for chunk in chunks {
                sqlx::query(
                    r#"
                    INSERT INTO stored_chunks (
                        user_id, file_id, chunk_id, drive_account_id, drive_id,
                        drive_file_id, filename, size_bytes, checksum,
                        start_offset, end_offset
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(chunk.user_id)
                .bind(&chunk.file_id)
                .bind(chunk.chunk_id)
                .bind(chunk.drive_account_id)
                .bind(&chunk.drive_id)
                .bind(&chunk.drive_file_id)
                .bind(&chunk.filename)
                .bind(chunk.size_bytes)
                .bind(&chunk.checksum)
                .bind(chunk.start_offset)
                .bind(chunk.end_offset)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        }

        async fn get_stored_file(
            &self,
            user_id: Uuid,
            file_id: &str,
        ) -> MetadataResult<Option<(StoredFileRow, Vec<StoredChunkRow>)>> {
            let file = sqlx::query_as::<_, StoredFileRow>(
                "SELECT * FROM stored_files WHERE user_id = ? AND file_id = ?",
            )
            .bind(user_id)
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;

            let Some(file) = file else {
                return Ok(None);
            };

            let chunks = sqlx::query_as::<_, StoredChunkRow>(
                "SELECT * FROM stored_chunks WHERE user_id = ? AND file_id = ? ORDER BY chunk_id",
            )
            .bind(user_id)
            .bind(file_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(Some((file, chunks)))
        }

        async fn list_stored_files(
            &self,
            user_id: Uuid,
        ) -> MetadataResult<Vec<StoredFileSummaryRow>> {
            let rows = sqlx::query_as::<_, StoredFileSummaryRow>(
                r#"
                SELECT f.file_id, f.user_id, f.original_filename, f.original_size,
                       f.processed_size, f.status, f.created_at,
                       COUNT(c.chunk_id) AS num_chunks
                FROM stored_files f
                LEFT JOIN stored_chunks c
                  ON c.user_id = f.user_id AND c.file_id = f.file_id
                WHERE f.user_id = ? AND f.status IN ('active', 'incomplete')
                GROUP BY f.user_id, f.file_id
                ORDER BY f.created_at DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_stored_file_status(
            &self,
            user_id: Uuid,
            file_id: &str,
            status: &str,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE stored_files SET status = ? WHERE user_id = ? AND file_id = ?",
            )
            .bind(status)
            .bind(user_id)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "stored file {file_id} not found"
                )));
            }
            Ok(())
        }

        async fn mark_files_incomplete_for_drive(
            &self,
            user_id: Uuid,
            drive_id: &str,
        ) -> MetadataResult<u64> {
            let result = sqlx::query(
                r#"
                UPDATE stored_files SET status = 'incomplete'
                WHERE user_id = ? AND status = 'active'
                  AND file_id IN (
                    SELECT file_id FROM stored_chunks
                    WHERE user_id = ? AND drive_id = ?
                  )
                "#,
            )
            .bind(user_id)
            .bind(user_id)
            .bind(drive_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        }

        async fn get_files_for_drive(
            &self,
            user_id: Uuid,
            drive_id: &str,
        ) -> MetadataResult<Vec<StoredFileRow>> {
            let rows = sqlx::query_as::<_, StoredFileRow>(
                r#"
                SELECT f.* FROM stored_files f
                WHERE f.user_id = ? AND f.status = 'active'
                  AND f.file_id IN (
                    SELECT file_id FROM stored_chunks
                    WHERE user_id = ? AND drive_id = ?
                  )
                "#,
            )
            .bind(user_id)
            .bind(user_id)
            .bind(drive_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }
}
