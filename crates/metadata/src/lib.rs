//! Metadata persistence for shardbox.
//!
//! Stores users and their linked drive accounts, OAuth link states,
//! upload/download sessions and the stored-file catalogue. The store is
//! exposed as a combined trait so the server can hold one
//! `Arc<dyn MetadataStore>`; the SQLite implementation lives here too.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};
