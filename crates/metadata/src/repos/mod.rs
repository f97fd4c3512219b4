//! Repository traits for metadata operations.

pub mod downloads;
pub mod files;
pub mod sessions;
pub mod users;

pub use downloads::DownloadSessionRepo;
pub use files::StoredFileRepo;
pub use sessions::UploadSessionRepo;
pub use users::{OAuthStateRepo, UserRepo};
