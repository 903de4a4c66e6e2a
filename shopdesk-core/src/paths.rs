//! Remote locations of shop documents and their backups.
//!
//! ```text
//! <base_path>/
//!   <shop_id>.json
//!   backups/
//!     <shop_id>.bak.<timestamp>
//! ```

use chrono::{DateTime, Utc};

use crate::backup::backup_name;
use crate::error::ShopError;
use crate::profile::ServerProfile;

pub const DOCUMENT_EXT: &str = ".json";
pub const BACKUP_DIR: &str = "backups";

/// Joins remote path segments with forward slashes, whatever the local OS.
pub fn join(base: &str, segment: &str) -> String {
    let segment = segment.trim_start_matches('/');
    if base.is_empty() {
        return segment.to_string();
    }
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        // base was "/" (or only slashes)
        return format!("/{}", segment);
    }
    format!("{}/{}", base, segment)
}

/// Rejects shop ids that would escape the base directory.
pub fn validate_shop_id(shop_id: &str) -> Result<(), ShopError> {
    if shop_id.is_empty()
        || shop_id.contains('/')
        || shop_id.contains('\\')
        || shop_id.contains("..")
        || shop_id.starts_with('.')
    {
        return Err(ShopError::InvalidShopId(shop_id.to_string()));
    }
    Ok(())
}

/// Timestamp safe to embed in a file name: `2024-05-01T12-30-00-123Z`.
pub fn path_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-")
}

/// Remote paths for one shop on one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopPaths {
    shop_id: String,
    document: String,
    backup_dir: String,
}

impl ShopPaths {
    pub fn new(server: &ServerProfile, shop_id: &str) -> Result<Self, ShopError> {
        validate_shop_id(shop_id)?;
        Ok(Self {
            shop_id: shop_id.to_string(),
            document: join(&server.base_path, &format!("{}{}", shop_id, DOCUMENT_EXT)),
            backup_dir: join(&server.base_path, BACKUP_DIR),
        })
    }

    pub fn shop_id(&self) -> &str {
        &self.shop_id
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn backup_dir(&self) -> &str {
        &self.backup_dir
    }

    /// Path of the backup taken at `at`.
    pub fn backup_path(&self, at: DateTime<Utc>) -> String {
        self.named_backup(&backup_name(&self.shop_id, at))
    }

    /// Path of an existing backup file in the backup directory.
    pub fn named_backup(&self, name: &str) -> String {
        join(&self.backup_dir, name)
    }
}
