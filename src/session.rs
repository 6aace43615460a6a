//! Session records, the shared status store, and per-session disk workspace.
//!
//! Pollers only ever see snapshots: `status` clones under the map lock, and
//! every `update` is applied atomically, so a reader never observes a
//! half-applied update.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;
use uuid::Uuid;

/// Opaque session identifier handed out to pollers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for worker thread names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?.to_string()))
    }
}

/// Full status record for one translation session.
#[derive(Clone, Debug, Serialize)]
pub struct SessionStatus {
    pub current_task: String,
    pub progress_percentage: u8,
    pub is_processing: bool,
    pub processing_complete: bool,
    pub error_message: Option<String>,
    pub selected_model: Option<String>,
    pub use_streaming: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub streaming_chunks: u64,
    /// Seconds from request start to the first streamed token.
    pub first_token_time: Option<f64>,
    /// Wall-clock seconds from the first model request to the finished
    /// document.
    pub processing_time: f64,
    pub tokens_per_second: f64,
    #[serde(skip)]
    pub created_at: Instant,
}

impl SessionStatus {
    fn new() -> Self {
        Self {
            current_task: "Initialized".to_string(),
            progress_percentage: 0,
            is_processing: false,
            processing_complete: false,
            error_message: None,
            selected_model: None,
            use_streaming: false,
            input_tokens: 0,
            output_tokens: 0,
            streaming_chunks: 0,
            first_token_time: None,
            processing_time: 0.0,
            tokens_per_second: 0.0,
            created_at: Instant::now(),
        }
    }
}

/// Partial update applied atomically to a session record. Only fields set to
/// `Some` are written; a field name that does not exist here does not
/// compile, so there is no way to smuggle an unknown key into a session.
#[derive(Debug, Default)]
pub struct StatusUpdate {
    pub current_task: Option<String>,
    pub progress_percentage: Option<u8>,
    pub is_processing: Option<bool>,
    pub processing_complete: Option<bool>,
    pub error_message: Option<String>,
    pub selected_model: Option<String>,
    pub use_streaming: Option<bool>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub streaming_chunks: Option<u64>,
    pub first_token_time: Option<f64>,
    pub processing_time: Option<f64>,
    pub tokens_per_second: Option<f64>,
}

impl StatusUpdate {
    /// The common "new stage" update: task label plus progress.
    pub fn task(label: impl Into<String>, pct: u8) -> Self {
        Self {
            current_task: Some(label.into()),
            progress_percentage: Some(pct),
            ..Self::default()
        }
    }

    fn apply(self, status: &mut SessionStatus) {
        if let Some(v) = self.current_task {
            status.current_task = v;
        }
        if let Some(v) = self.progress_percentage {
            status.progress_percentage = v;
        }
        if let Some(v) = self.is_processing {
            status.is_processing = v;
        }
        if let Some(v) = self.processing_complete {
            status.processing_complete = v;
        }
        if let Some(v) = self.error_message {
            status.error_message = Some(v);
        }
        if let Some(v) = self.selected_model {
            status.selected_model = Some(v);
        }
        if let Some(v) = self.use_streaming {
            status.use_streaming = v;
        }
        if let Some(v) = self.input_tokens {
            status.input_tokens = v;
        }
        if let Some(v) = self.output_tokens {
            status.output_tokens = v;
        }
        if let Some(v) = self.streaming_chunks {
            status.streaming_chunks = v;
        }
        if let Some(v) = self.first_token_time {
            status.first_token_time = Some(v);
        }
        if let Some(v) = self.processing_time {
            status.processing_time = v;
        }
        if let Some(v) = self.tokens_per_second {
            status.tokens_per_second = v;
        }
    }
}

/// Concurrency-safe session map. Clone handles share the same store; worker
/// threads write while pollers read.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, SessionStatus>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> SessionId {
        let id = SessionId(Uuid::new_v4().to_string());
        let mut map = self.inner.write().expect("session store lock poisoned");
        map.insert(id.clone(), SessionStatus::new());
        id
    }

    /// Snapshot of the current status, or None for an unknown session.
    pub fn status(&self, id: &SessionId) -> Option<SessionStatus> {
        let map = self.inner.read().expect("session store lock poisoned");
        map.get(id).cloned()
    }

    /// Applies an update atomically. Returns false for an unknown session.
    pub fn update(&self, id: &SessionId, update: StatusUpdate) -> bool {
        let mut map = self.inner.write().expect("session store lock poisoned");
        match map.get_mut(id) {
            Some(status) => {
                update.apply(status);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        let mut map = self.inner.write().expect("session store lock poisoned");
        map.remove(id).is_some()
    }

    /// Drops sessions older than `max_age` and returns their ids so callers
    /// can purge any per-session disk state.
    pub fn cleanup_older_than(&self, max_age: Duration) -> Vec<SessionId> {
        let mut map = self.inner.write().expect("session store lock poisoned");
        let expired: Vec<SessionId> = map
            .iter()
            .filter(|(_, s)| s.created_at.elapsed() > max_age)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            map.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("session store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Destination for generated artifacts, keyed by session.
pub trait ArtifactSink: Send + Sync {
    fn write_artifact(&self, id: &SessionId, filename: &str, contents: &str) -> anyhow::Result<()>;
}

/// Per-session upload/generated directories on disk.
pub struct SessionWorkspace {
    upload_dir: PathBuf,
    generated_dir: PathBuf,
}

impl SessionWorkspace {
    pub fn new(upload_dir: impl Into<PathBuf>, generated_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let ws = Self {
            upload_dir: upload_dir.into(),
            generated_dir: generated_dir.into(),
        };
        std::fs::create_dir_all(&ws.upload_dir)
            .with_context(|| format!("create upload dir: {}", ws.upload_dir.display()))?;
        std::fs::create_dir_all(&ws.generated_dir)
            .with_context(|| format!("create generated dir: {}", ws.generated_dir.display()))?;
        Ok(ws)
    }

    pub fn init_session(&self, id: &SessionId) -> anyhow::Result<()> {
        for dir in [self.session_upload_dir(id), self.session_generated_dir(id)] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create session dir: {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn session_upload_dir(&self, id: &SessionId) -> PathBuf {
        self.upload_dir.join(id.as_str())
    }

    pub fn session_generated_dir(&self, id: &SessionId) -> PathBuf {
        self.generated_dir.join(id.as_str())
    }

    pub fn upload_path(&self, id: &SessionId, filename: &str) -> PathBuf {
        self.session_upload_dir(id).join(sanitize_filename(filename))
    }

    pub fn generated_path(&self, id: &SessionId, filename: &str) -> PathBuf {
        self.session_generated_dir(id).join(sanitize_filename(filename))
    }

    /// Removes both session directories. Missing directories are fine.
    pub fn purge_session(&self, id: &SessionId) {
        for dir in [self.session_upload_dir(id), self.session_generated_dir(id)] {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    /// Removes session directories whose last modification is older than
    /// `max_age`. Covers sessions left behind by earlier processes, which
    /// the store cannot see. Returns the number of sessions swept.
    pub fn sweep_older_than(&self, max_age: Duration) -> usize {
        let mut expired = BTreeSet::new();
        collect_aged_dirs(&self.upload_dir, max_age, &mut expired);
        collect_aged_dirs(&self.generated_dir, max_age, &mut expired);
        for name in &expired {
            let _ = std::fs::remove_dir_all(self.upload_dir.join(name));
            let _ = std::fs::remove_dir_all(self.generated_dir.join(name));
        }
        expired.len()
    }
}

impl ArtifactSink for SessionWorkspace {
    fn write_artifact(&self, id: &SessionId, filename: &str, contents: &str) -> anyhow::Result<()> {
        let dir = self.session_generated_dir(id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create session dir: {}", dir.display()))?;
        let path = self.generated_path(id, filename);
        std::fs::write(&path, contents)
            .with_context(|| format!("write artifact: {}", path.display()))?;
        Ok(())
    }
}

/// Expires aged sessions from the store and removes their directories.
/// Returns the number of sessions removed.
pub fn cleanup_sessions(
    store: &SessionStore,
    workspace: &SessionWorkspace,
    max_age: Duration,
) -> usize {
    let expired = store.cleanup_older_than(max_age);
    for id in &expired {
        workspace.purge_session(id);
    }
    expired.len()
}

pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}

fn collect_aged_dirs(root: &Path, max_age: Duration, out: &mut BTreeSet<String>) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let aged = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok())
            .is_some_and(|age| age > max_age);
        if aged {
            if let Some(name) = entry.file_name().to_str() {
                out.insert(name.to_string());
            }
        }
    }
}
