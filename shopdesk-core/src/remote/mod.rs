//! Remote file-transfer capability.
//!
//! The document store never touches a filesystem directly. It asks a
//! [`RemoteConnector`] for a [`RemoteSession`], issues a linear sequence of
//! calls on it and disconnects. Transports:
//!
//! - [`MemoryRemote`]: shared in-memory tree, used by tests and demos.
//! - [`LocalMirror`]: remote paths mapped under a local directory.

mod local;
mod memory;

pub use local::LocalMirror;
pub use memory::{MemoryRemote, RemoteCall};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::profile::{Credentials, ServerProfile};

/// Failures reported by a transport.
///
/// Only "not found" and "already exists" are distinguished; everything else
/// carries the transport's own message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("No such file: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Other(String),
}

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modify_time: DateTime<Utc>,
}

/// Opens sessions against a server.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(
        &self,
        server: &ServerProfile,
        credentials: &Credentials,
    ) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// An open connection. [`RemoteSession::disconnect`] must be called on every
/// exit path, including cancellation; the store does this through a scoped
/// guard. Calling it more than once is allowed and the later calls are no-ops.
#[async_trait]
pub trait RemoteSession: Send {
    async fn get(&mut self, path: &str) -> Result<Vec<u8>, RemoteError>;

    async fn put(&mut self, bytes: &[u8], path: &str) -> Result<(), RemoteError>;

    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    async fn delete(&mut self, path: &str) -> Result<(), RemoteError>;

    async fn mkdir(&mut self, path: &str, recursive: bool) -> Result<(), RemoteError>;

    async fn disconnect(&mut self) -> Result<(), RemoteError>;
}
