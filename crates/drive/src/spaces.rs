//! Per-user drive space listing.

use crate::error::{DriveError, DriveResult};
use crate::gateway::DriveGateway;
use shardbox_core::plan::DriveSpace;
use shardbox_metadata::MetadataStore;
use uuid::Uuid;

/// Query free space for every drive account the user has linked.
///
/// Per-account failures (expired credential, provider outage) are captured
/// in the record as `available = false` with the error string, so one bad
/// drive does not hide the rest. Fails only when the user has no linked
/// accounts at all.
pub async fn list_drive_spaces(
    gateway: &dyn DriveGateway,
    metadata: &dyn MetadataStore,
    user_id: Uuid,
) -> DriveResult<Vec<DriveSpace>> {
    let accounts = metadata.list_drive_accounts(user_id).await?;
    if accounts.is_empty() {
        return Err(DriveError::NoLinkedAccounts);
    }

    let mut spaces = Vec::with_capacity(accounts.len());
    for account in accounts {
        let mut space = DriveSpace {
            account_id: account.account_id,
            display_name: account.display_name.clone(),
            total_space: 0,
            used_space: 0,
            free_space: 0,
            available: false,
            error: None,
        };

        match gateway.query_space(account.account_id).await {
            Ok(quota) => {
                space.total_space = quota.limit;
                space.used_space = quota.usage;
                space.free_space = quota.limit - quota.usage;
                space.available = true;
            }
            Err(e) => {
                tracing::warn!(
                    account_id = %account.account_id,
                    error = %e,
                    "Failed to query drive space"
                );
                space.error = Some(format!("failed to query drive: {e}"));
            }
        }

        spaces.push(space);
    }

    Ok(spaces)
}
