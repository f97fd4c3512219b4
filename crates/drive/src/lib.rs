//! Cloud-drive gateway for shardbox.
//!
//! Abstracts one linked cloud-storage account behind the [`DriveGateway`]
//! trait: blob upload/download/delete, quota queries and name lookup. The
//! Google Drive v3 implementation decrypts the stored provider credential
//! with the process-wide token cipher and refreshes it once on 401.
//!
//! The manifest keeper maintains the per-drive `2xpfm.manifest` index blob.

pub mod crypto;
pub mod error;
pub mod gateway;
pub mod manifest;
pub mod spaces;
pub mod token;

pub use crypto::TokenCipher;
pub use error::{DriveError, DriveResult};
pub use gateway::{DriveGateway, DriveQuota, GoogleDrive};
pub use manifest::ManifestKeeper;
pub use spaces::list_drive_spaces;
pub use token::DriveToken;
