//! Shop document store.
//!
//! Every operation opens its own remote session, runs a short linear
//! sequence of calls and disconnects before returning, whatever the outcome.
//! A cancelled operation still gets its session disconnected.
//! Anything that overwrites or deletes a shop document first copies the
//! current content into the server's backup directory; a failed backup
//! aborts the overwrite.
//!
//! There is no locking: two overlapping saves of the same shop may interleave.
//! Each write is still preceded by a backup of *some* earlier state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::backup::{backup_name, latest, select_backups, BackupRecord};
use crate::error::ShopError;
use crate::models::ShopDocument;
use crate::paths::{ShopPaths, DOCUMENT_EXT};
use crate::profile::{Catalog, Credentials, Currency, ServerProfile};
use crate::remote::{EntryKind, RemoteConnector, RemoteError, RemoteSession};

/// Source of "now" for backup names.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Saved,
    Created,
    Deleted,
    Restored,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Saved => write!(f, "saved"),
            Status::Created => write!(f, "created"),
            Status::Deleted => write!(f, "deleted"),
            Status::Restored => write!(f, "restored"),
        }
    }
}

/// Outcome of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub status: Status,
    pub shop_id: String,
    /// Backup written before the mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
    /// Backup a restore copied from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Receipt {
    fn new(status: Status, shop_id: &str) -> Self {
        Self {
            status,
            shop_id: shop_id.to_string(),
            backup: None,
            source: None,
        }
    }
}

/// A shop document found on a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopSummary {
    pub id: String,
    pub file: String,
}

/// An open remote session scoped to one operation.
///
/// [`SessionGuard::release`] disconnects and waits for it. If the guard is
/// dropped first (the operation's future was cancelled or an early return
/// skipped the release), the disconnect is spawned onto the current runtime.
struct SessionGuard {
    server: String,
    session: Option<Box<dyn RemoteSession>>,
}

impl SessionGuard {
    fn remote(&mut self) -> Result<&mut dyn RemoteSession, ShopError> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(ShopError::TransferError("session already released".into())),
        }
    }

    /// Disconnects. Failures are logged and never replace the operation's
    /// own result.
    async fn release(mut self) {
        if let Some(session) = self.session.as_deref_mut() {
            let outcome = session.disconnect().await;
            self.session = None;
            if let Err(e) = outcome {
                tracing::warn!(server = %self.server, error = %e, "disconnect failed");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let server = std::mem::take(&mut self.server);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(server = %server, "operation abandoned, disconnecting in background");
                handle.spawn(async move {
                    if let Err(e) = session.disconnect().await {
                        tracing::warn!(server = %server, error = %e, "disconnect failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(server = %server, "session dropped outside a runtime, not disconnected");
            }
        }
    }
}

#[derive(Clone)]
pub struct ShopStore {
    catalog: Arc<Catalog>,
    connector: Arc<dyn RemoteConnector>,
    credentials: Credentials,
    clock: Clock,
}

impl ShopStore {
    pub fn new(
        catalog: Arc<Catalog>,
        connector: Arc<dyn RemoteConnector>,
        credentials: Credentials,
    ) -> Self {
        Self {
            catalog,
            connector,
            credentials,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the clock used to name backups.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn list_servers(&self) -> &[ServerProfile] {
        self.catalog.servers()
    }

    pub fn list_currencies(&self) -> &[Currency] {
        self.catalog.currencies()
    }

    // ------------------------------------------------------------------
    // Session handling
    // ------------------------------------------------------------------

    async fn connect(&self, server: &ServerProfile) -> Result<SessionGuard, ShopError> {
        tracing::debug!(server = %server.id, host = %server.host, port = server.port, "connecting");
        let session = self
            .connector
            .connect(server, &self.credentials)
            .await
            .map_err(ShopError::from)?;
        Ok(SessionGuard {
            server: server.id.clone(),
            session: Some(session),
        })
    }

    fn resolve(&self, server_id: &str, shop_id: &str) -> Result<(&ServerProfile, ShopPaths), ShopError> {
        let server = self.catalog.server(server_id)?;
        let paths = ShopPaths::new(server, shop_id)?;
        Ok((server, paths))
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Lists the shop documents in a server's base directory.
    pub async fn list_shops(&self, server_id: &str) -> Result<Vec<ShopSummary>, ShopError> {
        let server = self.catalog.server(server_id)?;
        let mut session = self.connect(server).await?;
        let result = Self::list_shops_in(session.remote()?, server).await;
        session.release().await;
        result
    }

    async fn list_shops_in(
        session: &mut dyn RemoteSession,
        server: &ServerProfile,
    ) -> Result<Vec<ShopSummary>, ShopError> {
        let listing = session.list(&server.base_path).await?;
        Ok(listing
            .into_iter()
            .filter(|e| e.kind == EntryKind::File)
            .filter_map(|e| {
                let id = e.name.strip_suffix(DOCUMENT_EXT)?.to_string();
                if id.is_empty() {
                    return None;
                }
                Some(ShopSummary { id, file: e.name })
            })
            .collect())
    }

    /// Fetches a shop document as raw JSON.
    pub async fn load_raw(&self, server_id: &str, shop_id: &str) -> Result<Value, ShopError> {
        let (server, paths) = self.resolve(server_id, shop_id)?;
        let mut session = self.connect(server).await?;
        let result = Self::load_in(session.remote()?, &paths).await;
        session.release().await;
        result
    }

    /// Fetches and parses a shop document for editing.
    pub async fn load_shop(&self, server_id: &str, shop_id: &str) -> Result<ShopDocument, ShopError> {
        let value = self.load_raw(server_id, shop_id).await?;
        ShopDocument::from_value(value)
    }

    async fn load_in(session: &mut dyn RemoteSession, paths: &ShopPaths) -> Result<Value, ShopError> {
        let bytes = match session.get(paths.document()).await {
            Ok(bytes) => bytes,
            Err(RemoteError::NotFound(_)) => {
                return Err(ShopError::NotFound(paths.shop_id().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_slice(&bytes)?;
        if !value.is_object() {
            return Err(ShopError::MalformedDocument(
                "shop document must be a JSON object".into(),
            ));
        }
        Ok(value)
    }

    /// Writes a whole shop document, backing up the current content first.
    ///
    /// The body is written as given; only a non-object document is refused.
    /// A shop with no content yet is written without a backup.
    pub async fn save_shop(
        &self,
        server_id: &str,
        shop_id: &str,
        document: &Value,
    ) -> Result<Receipt, ShopError> {
        let (server, paths) = self.resolve(server_id, shop_id)?;
        if !document.is_object() {
            return Err(ShopError::MalformedDocument(
                "shop document must be a JSON object".into(),
            ));
        }
        let bytes = serde_json::to_vec_pretty(document)?;

        let mut session = self.connect(server).await?;
        let result = self.save_in(session.remote()?, &paths, &bytes).await;
        session.release().await;

        let backup = result?;
        tracing::info!(
            server = %server.id,
            shop = %shop_id,
            backup = backup.as_deref().unwrap_or("-"),
            "shop saved"
        );
        Ok(Receipt {
            backup,
            ..Receipt::new(Status::Saved, shop_id)
        })
    }

    /// Saves an edited document.
    pub async fn save_document(
        &self,
        server_id: &str,
        shop_id: &str,
        document: &ShopDocument,
    ) -> Result<Receipt, ShopError> {
        self.save_shop(server_id, shop_id, &document.to_value()).await
    }

    async fn save_in(
        &self,
        session: &mut dyn RemoteSession,
        paths: &ShopPaths,
        bytes: &[u8],
    ) -> Result<Option<String>, ShopError> {
        let backup = self.backup_current(session, paths).await?;
        session.put(bytes, paths.document()).await?;
        Ok(backup)
    }

    /// Copies the live document into the backup directory.
    ///
    /// Returns `None` when there is no live document yet.
    async fn backup_current(
        &self,
        session: &mut dyn RemoteSession,
        paths: &ShopPaths,
    ) -> Result<Option<String>, ShopError> {
        match session.mkdir(paths.backup_dir(), true).await {
            Ok(()) | Err(RemoteError::AlreadyExists(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let current = match session.get(paths.document()).await {
            Ok(bytes) => bytes,
            Err(RemoteError::NotFound(_)) => {
                tracing::debug!(shop = %paths.shop_id(), "no current content, skipping backup");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let name = backup_name(paths.shop_id(), (self.clock)());
        session.put(&current, &paths.named_backup(&name)).await?;
        tracing::debug!(shop = %paths.shop_id(), backup = %name, bytes = current.len(), "backup written");
        Ok(Some(name))
    }

    /// Creates a shop from the template. Fails if the shop already exists.
    pub async fn create_shop(
        &self,
        server_id: &str,
        shop_id: &str,
        title: Option<&str>,
    ) -> Result<Receipt, ShopError> {
        let (server, paths) = self.resolve(server_id, shop_id)?;
        let bytes = serde_json::to_vec_pretty(&ShopDocument::template(title))?;

        let mut session = self.connect(server).await?;
        let result = Self::create_in(session.remote()?, &paths, &bytes).await;
        session.release().await;

        result?;
        tracing::info!(server = %server.id, shop = %shop_id, "shop created");
        Ok(Receipt::new(Status::Created, shop_id))
    }

    async fn create_in(
        session: &mut dyn RemoteSession,
        paths: &ShopPaths,
        bytes: &[u8],
    ) -> Result<(), ShopError> {
        match session.get(paths.document()).await {
            Ok(_) => return Err(ShopError::AlreadyExists(paths.shop_id().to_string())),
            Err(RemoteError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        session.put(bytes, paths.document()).await?;
        Ok(())
    }

    /// Deletes a shop after backing it up.
    pub async fn delete_shop(&self, server_id: &str, shop_id: &str) -> Result<Receipt, ShopError> {
        let (server, paths) = self.resolve(server_id, shop_id)?;

        let mut session = self.connect(server).await?;
        let result = self.delete_in(session.remote()?, &paths).await;
        session.release().await;

        let backup = result?;
        tracing::info!(server = %server.id, shop = %shop_id, backup = %backup, "shop deleted");
        Ok(Receipt {
            backup: Some(backup),
            ..Receipt::new(Status::Deleted, shop_id)
        })
    }

    async fn delete_in(
        &self,
        session: &mut dyn RemoteSession,
        paths: &ShopPaths,
    ) -> Result<String, ShopError> {
        let backup = self
            .backup_current(session, paths)
            .await?
            .ok_or_else(|| ShopError::NotFound(paths.shop_id().to_string()))?;
        session.delete(paths.document()).await?;
        Ok(backup)
    }

    /// Backups of a shop, newest first. Empty when the backup directory is
    /// missing.
    pub async fn list_backups(
        &self,
        server_id: &str,
        shop_id: &str,
    ) -> Result<Vec<BackupRecord>, ShopError> {
        let (server, paths) = self.resolve(server_id, shop_id)?;
        let mut session = self.connect(server).await?;
        let result = Self::list_backups_in(session.remote()?, &paths).await;
        session.release().await;
        result
    }

    async fn list_backups_in(
        session: &mut dyn RemoteSession,
        paths: &ShopPaths,
    ) -> Result<Vec<BackupRecord>, ShopError> {
        match session.list(paths.backup_dir()).await {
            Ok(listing) => Ok(select_backups(paths.shop_id(), listing)),
            Err(RemoteError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Copies the newest backup over the live document.
    pub async fn restore_latest(&self, server_id: &str, shop_id: &str) -> Result<Receipt, ShopError> {
        let (server, paths) = self.resolve(server_id, shop_id)?;

        let mut session = self.connect(server).await?;
        let result = Self::restore_latest_in(session.remote()?, &paths).await;
        session.release().await;

        let source = result?;
        tracing::info!(server = %server.id, shop = %shop_id, source = %source, "shop restored");
        Ok(Receipt {
            source: Some(source),
            ..Receipt::new(Status::Restored, shop_id)
        })
    }

    async fn restore_latest_in(
        session: &mut dyn RemoteSession,
        paths: &ShopPaths,
    ) -> Result<String, ShopError> {
        let backups = Self::list_backups_in(session, paths).await?;
        let newest = latest(&backups)
            .ok_or_else(|| ShopError::NoBackupsFound(paths.shop_id().to_string()))?;
        Self::copy_backup(session, paths, &newest.name).await?;
        Ok(newest.name.clone())
    }

    /// Copies a specific backup over the live document.
    pub async fn restore_named(
        &self,
        server_id: &str,
        shop_id: &str,
        backup: &str,
    ) -> Result<Receipt, ShopError> {
        let (server, paths) = self.resolve(server_id, shop_id)?;

        let mut session = self.connect(server).await?;
        let result = Self::restore_named_in(session.remote()?, &paths, backup).await;
        session.release().await;

        result?;
        tracing::info!(server = %server.id, shop = %shop_id, source = %backup, "shop restored");
        Ok(Receipt {
            source: Some(backup.to_string()),
            ..Receipt::new(Status::Restored, shop_id)
        })
    }

    async fn restore_named_in(
        session: &mut dyn RemoteSession,
        paths: &ShopPaths,
        backup: &str,
    ) -> Result<(), ShopError> {
        let backups = Self::list_backups_in(session, paths).await?;
        if !backups.iter().any(|b| b.name == backup) {
            return Err(ShopError::BackupNotFound(backup.to_string()));
        }
        Self::copy_backup(session, paths, backup).await
    }

    async fn copy_backup(
        session: &mut dyn RemoteSession,
        paths: &ShopPaths,
        backup: &str,
    ) -> Result<(), ShopError> {
        let bytes = match session.get(&paths.named_backup(backup)).await {
            Ok(bytes) => bytes,
            Err(RemoteError::NotFound(_)) => {
                return Err(ShopError::BackupNotFound(backup.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        session.put(&bytes, paths.document()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryDraft, Price};
    use crate::remote::{MemoryRemote, RemoteCall};
    use chrono::TimeZone;
    use serde_json::{json, Number};

    const DOC: &str = "/shops/s1.json";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn setup() -> (ShopStore, MemoryRemote) {
        let remote = MemoryRemote::new();
        remote.create_dir_all("/shops");
        let catalog = Catalog::new(
            vec![ServerProfile {
                id: "main".into(),
                name: "Main".into(),
                host: "sftp.example.com".into(),
                port: 22,
                base_path: "/shops".into(),
            }],
            vec![Currency::new("gold", Some("Gold".into()), "E")],
        );
        let store = ShopStore::new(
            Arc::new(catalog),
            Arc::new(remote.clone()),
            Credentials::default(),
        )
        .with_clock(Arc::new(fixed_now));
        (store, remote)
    }

    fn backup_path() -> String {
        format!("/shops/backups/{}", backup_name("s1", fixed_now()))
    }

    #[tokio::test]
    async fn test_list_shops() {
        let (store, remote) = setup();
        remote.insert_file("/shops/a.json", "{}");
        remote.insert_file("/shops/b.json", "{}");
        remote.insert_file("/shops/notes.txt", "");
        remote.create_dir_all("/shops/dir.json");

        let shops = store.list_shops("main").await.unwrap();
        let ids: Vec<_> = shops.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(shops[0].file, "a.json");
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_unknown_server_never_connects() {
        let (store, remote) = setup();
        assert_eq!(
            store.list_shops("nope").await.unwrap_err(),
            ShopError::ServerNotFound("nope".into())
        );
        assert_eq!(
            store.load_shop("nope", "s1").await.unwrap_err().kind(),
            "server_not_found"
        );
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_shop_id_never_connects() {
        let (store, remote) = setup();
        let err = store.load_shop("main", "../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_shop_id");
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_and_malformed() {
        let (store, remote) = setup();
        assert_eq!(
            store.load_shop("main", "s1").await.unwrap_err(),
            ShopError::NotFound("s1".into())
        );

        remote.insert_file(DOC, "{ not json");
        assert_eq!(
            store.load_shop("main", "s1").await.unwrap_err().kind(),
            "malformed_document"
        );

        remote.insert_file(DOC, "[1, 2]");
        assert_eq!(
            store.load_raw("main", "s1").await.unwrap_err().kind(),
            "malformed_document"
        );
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_load_transfer_error_is_not_not_found() {
        let (store, remote) = setup();
        remote.insert_file(DOC, "{}");
        remote.fail(
            RemoteCall::Get(DOC.into()),
            RemoteError::Other("permission denied".into()),
        );
        assert_eq!(
            store.load_shop("main", "s1").await.unwrap_err(),
            ShopError::TransferError("permission denied".into())
        );
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_save_backs_up_prior_bytes_before_overwrite() {
        let (store, remote) = setup();
        let prior = b"{\n  \"title\": \"Old\",\n  \"entries\": {}\n}".to_vec();
        remote.insert_file(DOC, prior.clone());
        remote.clear_calls();

        let doc = json!({"title": "New", "type": "GENERIC_9x6", "entries": {}});
        let receipt = store.save_shop("main", "s1", &doc).await.unwrap();

        assert_eq!(receipt.status, Status::Saved);
        assert_eq!(receipt.backup, Some(backup_name("s1", fixed_now())));
        assert_eq!(remote.files_in("/shops/backups").len(), 1);
        assert_eq!(remote.read(&backup_path()), Some(prior));

        let saved: Value = serde_json::from_slice(&remote.read(DOC).unwrap()).unwrap();
        assert_eq!(saved, doc);

        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::Connect,
                RemoteCall::Mkdir("/shops/backups".into()),
                RemoteCall::Get(DOC.into()),
                RemoteCall::Put(backup_path()),
                RemoteCall::Put(DOC.into()),
                RemoteCall::Disconnect,
            ]
        );
    }

    #[tokio::test]
    async fn test_save_writes_pretty_json() {
        let (store, remote) = setup();
        let doc = json!({"title": "T", "entries": {}});
        store.save_shop("main", "s1", &doc).await.unwrap();
        assert_eq!(
            String::from_utf8(remote.read(DOC).unwrap()).unwrap(),
            "{\n  \"title\": \"T\",\n  \"entries\": {}\n}"
        );
    }

    #[tokio::test]
    async fn test_first_save_skips_backup() {
        let (store, remote) = setup();
        let receipt = store
            .save_shop("main", "s1", &json!({"title": "T", "entries": {}}))
            .await
            .unwrap();
        assert!(receipt.backup.is_none());
        assert!(remote.files_in("/shops/backups").is_empty());
        assert!(remote.read(DOC).is_some());
    }

    #[tokio::test]
    async fn test_save_aborts_when_current_read_fails() {
        let (store, remote) = setup();
        remote.insert_file(DOC, "{}");
        remote.fail(
            RemoteCall::Get(DOC.into()),
            RemoteError::Other("timeout".into()),
        );

        let err = store
            .save_shop("main", "s1", &json!({"title": "T"}))
            .await
            .unwrap_err();
        assert_eq!(err, ShopError::TransferError("timeout".into()));
        assert_eq!(remote.read(DOC), Some(b"{}".to_vec()));
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_failed_backup_aborts_overwrite() {
        let (store, remote) = setup();
        remote.insert_file(DOC, "{}");
        remote.fail(
            RemoteCall::Put(backup_path()),
            RemoteError::Other("disk full".into()),
        );

        let err = store
            .save_shop("main", "s1", &json!({"title": "T"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transfer_error");
        assert_eq!(remote.read(DOC), Some(b"{}".to_vec()));
        assert!(!remote.calls().contains(&RemoteCall::Put(DOC.into())));
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_mkdir_failures() {
        let (store, remote) = setup();
        remote.insert_file(DOC, "{}");
        remote.fail(
            RemoteCall::Mkdir("/shops/backups".into()),
            RemoteError::AlreadyExists("/shops/backups".into()),
        );
        remote.create_dir_all("/shops/backups");
        store
            .save_shop("main", "s1", &json!({"title": "A"}))
            .await
            .unwrap();

        remote.fail(
            RemoteCall::Mkdir("/shops/backups".into()),
            RemoteError::Other("permission denied".into()),
        );
        let err = store
            .save_shop("main", "s1", &json!({"title": "B"}))
            .await
            .unwrap_err();
        assert_eq!(err, ShopError::TransferError("permission denied".into()));
        let saved: Value = serde_json::from_slice(&remote.read(DOC).unwrap()).unwrap();
        assert_eq!(saved["title"], json!("A"));
    }

    #[tokio::test]
    async fn test_save_rejects_non_object_document() {
        let (store, remote) = setup();
        let err = store
            .save_shop("main", "s1", &json!([{"slot": 1}]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "malformed_document");
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_entries_load_and_save() {
        let (store, remote) = setup();
        let legacy = json!({
            "title": "Old",
            "entries": {
                "legacy": {"item": "b", "slot": 1, "buy": {"price": 5, "currency": "gold"}},
                "noslot": {"item": "c", "page": [1]}
            }
        });
        remote.insert_file(DOC, serde_json::to_vec(&legacy).unwrap());

        let mut doc = store.load_shop("main", "s1").await.unwrap();
        assert_eq!(doc.entries.len(), 2);
        doc.title = "Renamed".into();
        store.save_document("main", "s1", &doc).await.unwrap();

        let saved: Value = serde_json::from_slice(&remote.read(DOC).unwrap()).unwrap();
        assert_eq!(saved["title"], json!("Renamed"));
        assert_eq!(saved["entries"]["legacy"]["buy"], legacy["entries"]["legacy"]["buy"]);
        assert!(saved["entries"]["noslot"].get("slot").is_none());

        let raw = json!({"title": "T", "entries": {"e": {"item": "x", "slot": 54}}});
        store.save_shop("main", "s1", &raw).await.unwrap();
        let saved: Value = serde_json::from_slice(&remote.read(DOC).unwrap()).unwrap();
        assert_eq!(saved, raw);
        assert_eq!(
            store.load_shop("main", "s1").await.unwrap().entries.get("e").unwrap().slot,
            None
        );
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_create_writes_template() {
        let (store, remote) = setup();
        let receipt = store.create_shop("main", "s1", None).await.unwrap();
        assert_eq!(receipt.status, Status::Created);

        let created: Value = serde_json::from_slice(&remote.read(DOC).unwrap()).unwrap();
        assert_eq!(
            created,
            json!({"title": "New Shop", "type": "GENERIC_9x6", "entries": {}})
        );
    }

    #[tokio::test]
    async fn test_create_existing_fails_without_write() {
        let (store, remote) = setup();
        remote.insert_file("/shops/existing.json", "{\"title\":\"keep\"}");
        remote.clear_calls();

        let err = store
            .create_shop("main", "existing", Some("Other"))
            .await
            .unwrap_err();
        assert_eq!(err, ShopError::AlreadyExists("existing".into()));
        assert!(!remote
            .calls()
            .iter()
            .any(|c| matches!(c, RemoteCall::Put(_))));
        assert_eq!(
            remote.read("/shops/existing.json"),
            Some(b"{\"title\":\"keep\"}".to_vec())
        );
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_create_does_not_treat_other_errors_as_absent() {
        let (store, remote) = setup();
        remote.fail(
            RemoteCall::Get(DOC.into()),
            RemoteError::Other("connection lost".into()),
        );
        let err = store.create_shop("main", "s1", None).await.unwrap_err();
        assert_eq!(err, ShopError::TransferError("connection lost".into()));
        assert!(remote.read(DOC).is_none());
    }

    #[tokio::test]
    async fn test_delete_backs_up_then_removes() {
        let (store, remote) = setup();
        remote.insert_file(DOC, "{\"title\":\"gone\"}");

        let receipt = store.delete_shop("main", "s1").await.unwrap();
        assert_eq!(receipt.status, Status::Deleted);
        assert_eq!(receipt.backup, Some(backup_name("s1", fixed_now())));
        assert!(remote.read(DOC).is_none());
        assert_eq!(
            remote.read(&backup_path()),
            Some(b"{\"title\":\"gone\"}".to_vec())
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (store, remote) = setup();
        assert_eq!(
            store.delete_shop("main", "s1").await.unwrap_err(),
            ShopError::NotFound("s1".into())
        );
        assert!(!remote
            .calls()
            .iter()
            .any(|c| matches!(c, RemoteCall::Delete(_))));
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_list_backups() {
        let (store, remote) = setup();
        assert!(store.list_backups("main", "s1").await.unwrap().is_empty());

        let t = |s| Utc.timestamp_opt(s, 0).unwrap();
        remote.insert_file_at("/shops/backups/s1.bak.b", "2", t(200));
        remote.insert_file_at("/shops/backups/s1.bak.a", "1", t(100));
        remote.insert_file_at("/shops/backups/s2.bak.z", "x", t(300));

        let backups = store.list_backups("main", "s1").await.unwrap();
        let names: Vec<_> = backups.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["s1.bak.b", "s1.bak.a"]);
        assert_eq!(backups[0].size, 1);
        assert_eq!(backups[0].modify_time, t(200));
    }

    #[tokio::test]
    async fn test_list_backups_other_error_propagates() {
        let (store, remote) = setup();
        remote.fail(
            RemoteCall::List("/shops/backups".into()),
            RemoteError::Other("permission denied".into()),
        );
        assert_eq!(
            store.list_backups("main", "s1").await.unwrap_err().kind(),
            "transfer_error"
        );
    }

    #[tokio::test]
    async fn test_restore_latest_picks_newest() {
        let (store, remote) = setup();
        let t = |s| Utc.timestamp_opt(s, 0).unwrap();
        remote.insert_file(DOC, "current");
        remote.insert_file_at("/shops/backups/s1.bak.t2", "two", t(200));
        remote.insert_file_at("/shops/backups/s1.bak.t3", "three", t(300));
        remote.insert_file_at("/shops/backups/s1.bak.t1", "one", t(100));

        let receipt = store.restore_latest("main", "s1").await.unwrap();
        assert_eq!(receipt.status, Status::Restored);
        assert_eq!(receipt.source.as_deref(), Some("s1.bak.t3"));
        assert_eq!(remote.read(DOC), Some(b"three".to_vec()));
    }

    #[tokio::test]
    async fn test_restore_latest_without_backups() {
        let (store, remote) = setup();
        remote.insert_file(DOC, "current");
        assert_eq!(
            store.restore_latest("main", "s1").await.unwrap_err(),
            ShopError::NoBackupsFound("s1".into())
        );
        assert_eq!(remote.read(DOC), Some(b"current".to_vec()));
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_restore_named() {
        let (store, remote) = setup();
        remote.insert_file("/shops/backups/s1.bak.old", "old");
        remote.insert_file("/shops/backups/s1.bak.new", "new");
        remote.insert_file("/shops/backups/s2.bak.x", "other shop");

        let receipt = store.restore_named("main", "s1", "s1.bak.old").await.unwrap();
        assert_eq!(receipt.source.as_deref(), Some("s1.bak.old"));
        assert_eq!(remote.read(DOC), Some(b"old".to_vec()));

        assert_eq!(
            store
                .restore_named("main", "s1", "s2.bak.x")
                .await
                .unwrap_err(),
            ShopError::BackupNotFound("s2.bak.x".into())
        );
        assert_eq!(remote.read(DOC), Some(b"old".to_vec()));
    }

    #[tokio::test]
    async fn test_connect_failure_is_transfer_error() {
        let (store, remote) = setup();
        remote.fail(
            RemoteCall::Connect,
            RemoteError::Other("host unreachable".into()),
        );
        assert_eq!(
            store.list_shops("main").await.unwrap_err(),
            ShopError::TransferError("host unreachable".into())
        );
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_failure_does_not_mask_result() {
        let (store, remote) = setup();
        remote.insert_file(DOC, "{\"title\":\"x\"}");
        remote.fail(
            RemoteCall::Disconnect,
            RemoteError::Other("already closed".into()),
        );
        let doc = store.load_shop("main", "s1").await.unwrap();
        assert_eq!(doc.title, "x");
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_operation_still_disconnects() {
        let (store, remote) = setup();
        remote.insert_file(DOC, "{}");
        remote.stall(RemoteCall::Get(DOC.into()));

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            store.load_shop("main", "s1"),
        )
        .await;
        assert!(outcome.is_err());

        for _ in 0..100 {
            if remote.open_sessions() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(remote.open_sessions(), 0);
        assert_eq!(remote.calls().last(), Some(&RemoteCall::Disconnect));
    }

    #[tokio::test]
    async fn test_create_edit_save_reload() {
        let (store, remote) = setup();
        store.create_shop("main", "s1", None).await.unwrap();

        let mut doc = store.load_shop("main", "s1").await.unwrap();
        assert_eq!(
            doc.to_value(),
            json!({"title": "New Shop", "type": "GENERIC_9x6", "entries": {}})
        );

        let mut draft = EntryDraft::new("sword", "weapon:sword", 0);
        draft.buy = Some(Price::new(Number::from(10), "E", "gold"));
        let added = doc.upsert_entry(None, draft).unwrap().clone();

        let receipt = store.save_document("main", "s1", &doc).await.unwrap();
        assert!(receipt.backup.is_some());

        let reloaded = store.load_shop("main", "s1").await.unwrap();
        let sword = reloaded.entries.get("sword").unwrap();
        assert_eq!(sword.item, "weapon:sword");
        assert_eq!(sword.slot, Some(0));
        assert_eq!(sword.pages, vec![1]);
        assert_eq!(sword.buy, added.buy);
        assert!(sword.raw["buy"].is_object());
        assert_eq!(
            sword.raw["buy"],
            json!({"price": 10, "economy": "E", "currency": "gold"})
        );
        assert_eq!(remote.open_sessions(), 0);
    }
}
