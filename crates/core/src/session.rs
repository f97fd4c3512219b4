//! Session lifecycle types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upload session state.
///
/// ```text
/// (init) --initiate--> uploading --finalize--> processing --success--> complete
///                           \                       \
///                            +---expire---> (gc)     +---stage fails---> failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Session is open and accepting chunk writes.
    Uploading,
    /// Finalized; the background pipeline is running.
    Processing,
    /// Pipeline finished, key file emitted.
    Complete,
    /// A pipeline stage failed; error_message carries the cause.
    Failed,
}

impl UploadStatus {
    /// Whether this state counts against the per-user concurrency cap.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Uploading | Self::Processing)
    }

    /// Whether the session can never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "uploading" => Ok(Self::Uploading),
            "processing" => Ok(Self::Processing),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::InvalidId(format!(
                "unknown upload status: {other}"
            ))),
        }
    }
}

/// Download session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Fetching chunks from the drives.
    Downloading,
    /// Joining and de-obfuscating.
    Decrypting,
    /// Reconstructed file ready to serve.
    Complete,
    /// A pipeline stage failed.
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Decrypting => "decrypting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "downloading" => Ok(Self::Downloading),
            "decrypting" => Ok(Self::Decrypting),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::InvalidId(format!(
                "unknown download status: {other}"
            ))),
        }
    }
}

/// Stored file state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredFileStatus {
    /// All chunks reachable.
    Active,
    /// A drive referenced by the file's chunks is no longer linked.
    Incomplete,
    /// Removed; chunks swept best-effort.
    Deleted,
}

impl StoredFileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Incomplete => "incomplete",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for StoredFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoredFileStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "incomplete" => Ok(Self::Incomplete),
            "deleted" => Ok(Self::Deleted),
            other => Err(crate::Error::InvalidId(format!(
                "unknown stored file status: {other}"
            ))),
        }
    }
}
