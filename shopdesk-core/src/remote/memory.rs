//! In-memory remote store.
//!
//! All sessions opened from one [`MemoryRemote`] share the same tree. Every
//! write advances a logical clock by one second, so modification times are
//! strictly increasing and listings sort deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{EntryKind, RemoteConnector, RemoteEntry, RemoteError, RemoteSession};
use crate::profile::{Credentials, ServerProfile};

/// A call made against the remote, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteCall {
    Connect,
    Get(String),
    Put(String),
    List(String),
    Delete(String),
    Mkdir(String),
    Disconnect,
}

#[derive(Debug, Clone)]
struct MemFile {
    bytes: Vec<u8>,
    modify_time: DateTime<Utc>,
}

#[derive(Debug)]
struct State {
    files: BTreeMap<String, MemFile>,
    dirs: BTreeSet<String>,
    clock: DateTime<Utc>,
    open_sessions: usize,
    calls: Vec<RemoteCall>,
    failures: HashMap<RemoteCall, RemoteError>,
    stalls: HashSet<RemoteCall>,
}

impl State {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += Duration::seconds(1);
        self.clock
    }

    fn record(&mut self, call: RemoteCall) -> Result<(), RemoteError> {
        self.calls.push(call.clone());
        match self.failures.get(&call) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn create_dir_all(&mut self, path: &str) {
        let mut current = normalize(path);
        loop {
            if !self.dirs.insert(current.clone()) {
                break;
            }
            match parent(&current) {
                Some(p) => current = p,
                None => break,
            }
        }
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parent(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/".to_string()),
        Some((head, _)) => Some(head.to_string()),
        None => Some("/".to_string()),
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Shared in-memory remote. Cloning yields a handle to the same tree.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        let clock = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            state: Arc::new(Mutex::new(State {
                files: BTreeMap::new(),
                dirs,
                clock,
                open_sessions: 0,
                calls: Vec::new(),
                failures: HashMap::new(),
                stalls: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the tree usable for inspection.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates a directory and its ancestors.
    pub fn create_dir_all(&self, path: &str) {
        self.lock().create_dir_all(path);
    }

    /// Seeds a file, creating parent directories, stamped with the next tick.
    pub fn insert_file(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        let at = state.tick();
        Self::insert_locked(&mut state, path, bytes.into(), at);
    }

    /// Seeds a file with an explicit modification time.
    pub fn insert_file_at(&self, path: &str, bytes: impl Into<Vec<u8>>, at: DateTime<Utc>) {
        let mut state = self.lock();
        Self::insert_locked(&mut state, path, bytes.into(), at);
    }

    fn insert_locked(state: &mut State, path: &str, bytes: Vec<u8>, at: DateTime<Utc>) {
        if let Some(p) = parent(&normalize(path)) {
            state.create_dir_all(&p);
        }
        state.files.insert(
            normalize(path),
            MemFile {
                bytes,
                modify_time: at,
            },
        );
    }

    /// Makes the given call fail with `err` from now on.
    pub fn fail(&self, call: RemoteCall, err: RemoteError) {
        self.lock().failures.insert(call, err);
    }

    /// Makes the given call hang forever from now on.
    pub fn stall(&self, call: RemoteCall) {
        self.lock().stalls.insert(call);
    }

    async fn wait_if_stalled(&self, call: &RemoteCall) {
        let stalled = self.lock().stalls.contains(call);
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&normalize(path)).map(|f| f.bytes.clone())
    }

    pub fn exists(&self, path: &str) -> bool {
        let path = normalize(path);
        let state = self.lock();
        state.files.contains_key(&path) || state.dirs.contains(&path)
    }

    /// Names of the files directly inside `dir`, sorted.
    pub fn files_in(&self, dir: &str) -> Vec<String> {
        let dir = normalize(dir);
        self.lock()
            .files
            .keys()
            .filter(|p| parent(p).as_deref() == Some(dir.as_str()))
            .map(|p| file_name(p).to_string())
            .collect()
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl RemoteConnector for MemoryRemote {
    async fn connect(
        &self,
        server: &ServerProfile,
        _credentials: &Credentials,
    ) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let mut state = self.lock();
        state.record(RemoteCall::Connect)?;
        state.open_sessions += 1;
        tracing::debug!(host = %server.host, port = server.port, "memory remote connected");
        Ok(Box::new(MemorySession {
            remote: self.clone(),
            open: true,
        }))
    }
}

struct MemorySession {
    remote: MemoryRemote,
    open: bool,
}

impl MemorySession {
    fn state(&self) -> Result<MutexGuard<'_, State>, RemoteError> {
        if !self.open {
            return Err(RemoteError::Other("session is closed".into()));
        }
        Ok(self.remote.lock())
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn get(&mut self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.remote
            .wait_if_stalled(&RemoteCall::Get(path.to_string()))
            .await;
        let mut state = self.state()?;
        state.record(RemoteCall::Get(path.to_string()))?;
        let key = normalize(path);
        match state.files.get(&key) {
            Some(file) => Ok(file.bytes.clone()),
            None if state.dirs.contains(&key) => {
                Err(RemoteError::Other(format!("Not a regular file: {}", path)))
            }
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn put(&mut self, bytes: &[u8], path: &str) -> Result<(), RemoteError> {
        let mut state = self.state()?;
        state.record(RemoteCall::Put(path.to_string()))?;
        let key = normalize(path);
        if state.dirs.contains(&key) {
            return Err(RemoteError::Other(format!("Is a directory: {}", path)));
        }
        match parent(&key) {
            Some(p) if !state.dirs.contains(&p) => {
                return Err(RemoteError::Other(format!(
                    "No such directory: {}",
                    p
                )));
            }
            _ => {}
        }
        let at = state.tick();
        state.files.insert(
            key,
            MemFile {
                bytes: bytes.to_vec(),
                modify_time: at,
            },
        );
        Ok(())
    }

    async fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let mut state = self.state()?;
        state.record(RemoteCall::List(dir.to_string()))?;
        let dir = normalize(dir);
        if !state.dirs.contains(&dir) {
            return Err(RemoteError::NotFound(dir));
        }

        let mut entries: Vec<RemoteEntry> = state
            .dirs
            .iter()
            .filter(|d| parent(d).as_deref() == Some(dir.as_str()))
            .map(|d| RemoteEntry {
                name: file_name(d).to_string(),
                kind: EntryKind::Directory,
                size: 0,
                modify_time: state.clock,
            })
            .collect();

        entries.extend(
            state
                .files
                .iter()
                .filter(|(p, _)| parent(p).as_deref() == Some(dir.as_str()))
                .map(|(p, f)| RemoteEntry {
                    name: file_name(p).to_string(),
                    kind: EntryKind::File,
                    size: f.bytes.len() as u64,
                    modify_time: f.modify_time,
                }),
        );

        Ok(entries)
    }

    async fn delete(&mut self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.state()?;
        state.record(RemoteCall::Delete(path.to_string()))?;
        match state.files.remove(&normalize(path)) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn mkdir(&mut self, path: &str, recursive: bool) -> Result<(), RemoteError> {
        let mut state = self.state()?;
        state.record(RemoteCall::Mkdir(path.to_string()))?;
        let key = normalize(path);

        if state.files.contains_key(&key) {
            return Err(RemoteError::AlreadyExists(path.to_string()));
        }
        if state.dirs.contains(&key) {
            return if recursive {
                Ok(())
            } else {
                Err(RemoteError::AlreadyExists(path.to_string()))
            };
        }

        if recursive {
            state.create_dir_all(&key);
            return Ok(());
        }
        match parent(&key) {
            Some(p) if !state.dirs.contains(&p) => Err(RemoteError::NotFound(p)),
            _ => {
                state.dirs.insert(key);
                Ok(())
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), RemoteError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let mut state = self.remote.lock();
        state.open_sessions = state.open_sessions.saturating_sub(1);
        state.record(RemoteCall::Disconnect)
    }
}
