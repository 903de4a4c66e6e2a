//! Error taxonomy for shop document operations.

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors surfaced by the document store, the entry model and editing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Shop not found: {0}")]
    NotFound(String),

    #[error("Shop already exists: {0}")]
    AlreadyExists(String),

    #[error("Malformed shop document: {0}")]
    MalformedDocument(String),

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error("No backups found for shop: {0}")]
    NoBackupsFound(String),

    #[error("Transfer error: {0}")]
    TransferError(String),

    #[error("Invalid shop ID: {0}")]
    InvalidShopId(String),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),
}

impl ShopError {
    /// Stable machine-readable code for this error.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ServerNotFound(_) => "server_not_found",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::MalformedDocument(_) => "malformed_document",
            Self::BackupNotFound(_) => "backup_not_found",
            Self::NoBackupsFound(_) => "no_backups_found",
            Self::TransferError(_) => "transfer_error",
            Self::InvalidShopId(_) => "invalid_shop_id",
            Self::InvalidEntry(_) => "invalid_entry",
            Self::EntryNotFound(_) => "entry_not_found",
        }
    }

    pub(crate) fn malformed(entry_id: &str, detail: impl std::fmt::Display) -> Self {
        Self::MalformedDocument(format!("entry '{}': {}", entry_id, detail))
    }
}

impl From<RemoteError> for ShopError {
    fn from(err: RemoteError) -> Self {
        ShopError::TransferError(err.to_string())
    }
}

impl From<serde_json::Error> for ShopError {
    fn from(err: serde_json::Error) -> Self {
        ShopError::MalformedDocument(err.to_string())
    }
}
