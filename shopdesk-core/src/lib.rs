//! Shopdesk Core Library
//!
//! Shop document model, slot grid index and versioned persistence of shop
//! documents on a remote file-transfer host.

pub mod backup;
pub mod error;
pub mod grid;
pub mod models;
pub mod paths;
pub mod profile;
pub mod remote;
pub mod store;

pub use backup::{backup_name, latest, select_backups, BackupRecord};
pub use error::ShopError;
pub use grid::{grid_map, matches_filter, next_page, pages_of, Conflict, Grid, PageStats};
pub use models::{
    build_document, parse_entries, DisplayOverride, Entries, Entry, EntryDraft, Field, Price,
    ShopDocument,
};
pub use paths::{validate_shop_id, ShopPaths};
pub use profile::{Catalog, Credentials, Currency, ServerProfile};
pub use remote::{
    EntryKind, LocalMirror, MemoryRemote, RemoteCall, RemoteConnector, RemoteEntry, RemoteError,
    RemoteSession,
};
pub use store::{Clock, Receipt, ShopStore, ShopSummary, Status};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
