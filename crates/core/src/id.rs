//! Identifier types.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an upload or download session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidId(format!("invalid session ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of hex characters in short identifiers (FileId, DriveId).
const SHORT_ID_LEN: usize = 16;

fn random_short_id() -> String {
    let mut bytes = [0u8; SHORT_ID_LEN / 2];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn validate_short_id(kind: &str, s: &str) -> crate::Result<()> {
    if s.len() != SHORT_ID_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(crate::Error::InvalidId(format!(
            "invalid {kind}: expected {SHORT_ID_LEN} hex chars, got {s:?}"
        )));
    }
    Ok(())
}

/// Short opaque identifier for a stored file.
///
/// Chosen by the server at initiate time and embedded in chunk, manifest and
/// key-file artifacts. Distinct from the session id so the durable artifact
/// survives session deletion.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Generate a new random file ID.
    pub fn new() -> Self {
        Self(random_short_id())
    }

    /// Parse and validate a file ID.
    pub fn parse(s: &str) -> crate::Result<Self> {
        validate_short_id("file ID", s)?;
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Get the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short opaque identifier for a logical drive.
///
/// Allocated by the manifest keeper on first use of an account and persisted
/// both in the account record and the drive's manifest blob. Ties chunks to
/// a logical drive across account-id changes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriveId(String);

impl DriveId {
    /// Allocate a new random drive ID.
    pub fn new() -> Self {
        Self(random_short_id())
    }

    /// Parse and validate a drive ID.
    pub fn parse(s: &str) -> crate::Result<Self> {
        validate_short_id("drive ID", s)?;
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Get the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DriveId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DriveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DriveId({})", self.0)
    }
}

impl fmt::Display for DriveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
