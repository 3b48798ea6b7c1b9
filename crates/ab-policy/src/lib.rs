//! Context synchronization policy value types.
//!
//! [`SyncPolicy`] is the value object attached to a `ContextSync` attachment
//! at session creation; it controls whether and how a mounted context is
//! uploaded, downloaded, and deleted. A freshly constructed `SyncPolicy` via
//! `Default` matches the defaults spec'd for the upstream RPC payload (see
//! the `serialize_json_matches_defaults` test).

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Upload policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStrategy {
    UploadBeforeResourceRelease,
    UploadAfterFileClose,
    #[serde(rename = "PERIODIC_UPLOAD")]
    PeriodicUpload,
}

impl Default for UploadStrategy {
    fn default() -> Self {
        Self::UploadBeforeResourceRelease
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPolicy {
    pub auto_upload: bool,
    pub upload_strategy: UploadStrategy,
    /// Minutes between uploads when `upload_strategy` is `PeriodicUpload`.
    pub period: u32,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            auto_upload: true,
            upload_strategy: UploadStrategy::UploadBeforeResourceRelease,
            period: 30,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Download policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStrategy {
    DownloadSync,
    DownloadAsync,
}

impl Default for DownloadStrategy {
    fn default() -> Self {
        Self::DownloadAsync
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPolicy {
    pub auto_download: bool,
    pub download_strategy: DownloadStrategy,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            auto_download: true,
            download_strategy: DownloadStrategy::DownloadAsync,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delete policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePolicy {
    pub sync_local_file: bool,
}

impl Default for DeletePolicy {
    fn default() -> Self {
        Self {
            sync_local_file: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Whitelist
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteList {
    pub path: String,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BwList {
    pub white_lists: Vec<WhiteList>,
}

impl Default for BwList {
    fn default() -> Self {
        Self {
            white_lists: vec![WhiteList {
                path: String::new(),
                exclude_paths: Vec::new(),
            }],
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SyncPolicy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    pub upload_policy: UploadPolicy,
    pub download_policy: DownloadPolicy,
    pub delete_policy: DeletePolicy,
    pub bw_list: BwList,
}

impl SyncPolicy {
    /// Serialize to the JSON string embedded per-attachment in the session
    /// creation RPC (spec.md §6 "Policy serialization").
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
