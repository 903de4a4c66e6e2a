//! Remote store backed by a local directory.
//!
//! Remote absolute paths are mapped under a mirror root:
//! `/srv/shops/a.json` becomes `<root>/srv/shops/a.json`. Useful for running
//! the editor against a synced copy of the remote tree.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Component, Path, PathBuf};

use super::{EntryKind, RemoteConnector, RemoteEntry, RemoteError, RemoteSession};
use crate::profile::{Credentials, ServerProfile};

#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl RemoteConnector for LocalMirror {
    async fn connect(
        &self,
        server: &ServerProfile,
        _credentials: &Credentials,
    ) -> Result<Box<dyn RemoteSession>, RemoteError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(RemoteError::Other(format!(
                    "Mirror root is not a directory: {}",
                    self.root.display()
                )))
            }
            Err(e) => {
                return Err(RemoteError::Other(format!(
                    "Mirror root unavailable {}: {}",
                    self.root.display(),
                    e
                )))
            }
        }
        tracing::debug!(
            host = %server.host,
            port = server.port,
            root = %self.root.display(),
            "local mirror connected"
        );
        Ok(Box::new(LocalSession {
            root: self.root.clone(),
        }))
    }
}

struct LocalSession {
    root: PathBuf,
}

impl LocalSession {
    fn resolve(&self, remote: &str) -> Result<PathBuf, RemoteError> {
        let relative = Path::new(remote.trim_start_matches('/'));
        let mut out = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(RemoteError::Other(format!(
                        "Path escapes mirror root: {}",
                        remote
                    )))
                }
            }
        }
        Ok(out)
    }
}

fn map_io(remote: &str, e: io::Error) -> RemoteError {
    match e.kind() {
        io::ErrorKind::NotFound => RemoteError::NotFound(remote.to_string()),
        io::ErrorKind::AlreadyExists => RemoteError::AlreadyExists(remote.to_string()),
        _ => RemoteError::Other(format!("{}: {}", remote, e)),
    }
}

#[async_trait]
impl RemoteSession for LocalSession {
    async fn get(&mut self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let local = self.resolve(path)?;
        tokio::fs::read(&local).await.map_err(|e| map_io(path, e))
    }

    async fn put(&mut self, bytes: &[u8], path: &str) -> Result<(), RemoteError> {
        let local = self.resolve(path)?;
        if let Some(parent) = local.parent() {
            match tokio::fs::metadata(parent).await {
                Ok(meta) if meta.is_dir() => {}
                _ => {
                    return Err(RemoteError::Other(format!(
                        "No such directory for {}",
                        path
                    )))
                }
            }
        }
        tokio::fs::write(&local, bytes)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let local = self.resolve(dir)?;
        let mut reader = tokio::fs::read_dir(&local)
            .await
            .map_err(|e| map_io(dir, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| map_io(dir, e))? {
            let meta = entry.metadata().await.map_err(|e| map_io(dir, e))?;
            let kind = if meta.is_file() {
                EntryKind::File
            } else if meta.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::Other
            };
            let modify_time = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
                size: meta.len(),
                modify_time,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn delete(&mut self, path: &str) -> Result<(), RemoteError> {
        let local = self.resolve(path)?;
        tokio::fs::remove_file(&local)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn mkdir(&mut self, path: &str, recursive: bool) -> Result<(), RemoteError> {
        let local = self.resolve(path)?;
        let result = if recursive {
            tokio::fs::create_dir_all(&local).await
        } else {
            tokio::fs::create_dir(&local).await
        };
        result.map_err(|e| map_io(path, e))
    }

    async fn disconnect(&mut self) -> Result<(), RemoteError> {
        Ok(())
    }
}
