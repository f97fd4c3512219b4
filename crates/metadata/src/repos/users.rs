//! User, drive-account and OAuth-state repositories.

use crate::error::MetadataResult;
use crate::models::{DriveAccountRow, OAuthStateRow, UserRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Users and their linked drive accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a new user. Fails with AlreadyExists on a duplicate email.
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()>;

    async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>>;

    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>>;

    /// Append a drive account to a user.
    async fn add_drive_account(&self, account: &DriveAccountRow) -> MetadataResult<()>;

    /// List a user's drive accounts in link order.
    async fn list_drive_accounts(&self, user_id: Uuid) -> MetadataResult<Vec<DriveAccountRow>>;

    async fn get_drive_account(
        &self,
        account_id: Uuid,
    ) -> MetadataResult<Option<DriveAccountRow>>;

    /// Persist the logical drive id chosen on first manifest use.
    async fn set_account_drive_id(
        &self,
        account_id: Uuid,
        drive_id: &str,
    ) -> MetadataResult<()>;

    /// Replace the sealed provider token (after a credential refresh).
    async fn update_account_token(
        &self,
        account_id: Uuid,
        encrypted_token: &[u8],
    ) -> MetadataResult<()>;
}

/// Short-lived OAuth link states.
#[async_trait]
pub trait OAuthStateRepo: Send + Sync {
    async fn insert_oauth_state(&self, state: &OAuthStateRow) -> MetadataResult<()>;

    /// Find and delete a state in one step; None if absent or already used.
    async fn take_oauth_state(&self, state: &str) -> MetadataResult<Option<OAuthStateRow>>;
}
