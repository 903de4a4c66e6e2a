//! Backup naming and selection.
//!
//! Backups are plain files in the server's `backups/` directory. They are
//! never pruned; the listing is the only record of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::paths::path_timestamp;
use crate::remote::{EntryKind, RemoteEntry};

/// One backup file as seen in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub name: String,
    pub size: u64,
    pub modify_time: DateTime<Utc>,
}

/// Name of the backup of `shop_id` taken at `at`.
///
/// Two backups of the same shop within the same millisecond share a name.
pub fn backup_name(shop_id: &str, at: DateTime<Utc>) -> String {
    format!("{}{}", backup_prefix(shop_id), path_timestamp(at))
}

pub(crate) fn backup_prefix(shop_id: &str) -> String {
    format!("{}.bak.", shop_id)
}

/// Picks the backups of `shop_id` out of a directory listing, newest first.
pub fn select_backups(shop_id: &str, listing: Vec<RemoteEntry>) -> Vec<BackupRecord> {
    let prefix = backup_prefix(shop_id);
    let mut records: Vec<BackupRecord> = listing
        .into_iter()
        .filter(|e| e.kind == EntryKind::File && e.name.starts_with(&prefix))
        .map(|e| BackupRecord {
            name: e.name,
            size: e.size,
            modify_time: e.modify_time,
        })
        .collect();

    records.sort_by(|a, b| {
        b.modify_time
            .cmp(&a.modify_time)
            .then_with(|| b.name.cmp(&a.name))
    });
    records
}

/// The most recent backup, if any.
pub fn latest(records: &[BackupRecord]) -> Option<&BackupRecord> {
    records.first()
}
