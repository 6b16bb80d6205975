//! Session-scoped file store: uploaded bytes plus ordering metadata.
//!
//! A [`SessionStore`] is an explicit registry keyed by an opaque session id
//! — not a process-wide global. Each session sits behind its own async
//! `Mutex`, giving the single-writer discipline the `position` ordering
//! needs: add, remove, reorder, and clear serialise per session, while
//! different sessions never contend.
//!
//! A running job never reads the live session. It takes a [snapshot] at
//! job start, so mid-job mutations cannot shift merge order under it.
//! File content is `Arc<[u8]>`, so snapshots copy pointers, not bytes.
//!
//! [snapshot]: SessionStore::snapshot

use crate::classify::{classify, FileCategory};
use crate::error::DocfuseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// One uploaded file and its place in the session's merge order.
///
/// `position` values within a session are dense (0..n, no gaps) and are the
/// only thing that defines merge order.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Opaque id, unique within the session.
    pub id: String,
    /// Name the file was uploaded under; drives classification.
    pub original_name: String,
    /// Category assigned at upload time.
    pub category: FileCategory,
    /// Upload size in bytes.
    pub size_bytes: u64,
    /// The stored bytes. Shared, never mutated after upload.
    pub content: Arc<[u8]>,
    /// 0-based slot in the session's merge order.
    pub position: usize,
}

/// Serialisable metadata view of an [`UploadedFile`] (no content bytes).
///
/// This is what the external delivery layer echoes back after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub original_name: String,
    pub category: FileCategory,
    pub size_bytes: u64,
    pub position: usize,
}

impl From<&UploadedFile> for FileInfo {
    fn from(f: &UploadedFile) -> Self {
        FileInfo {
            id: f.id.clone(),
            original_name: f.original_name.clone(),
            category: f.category,
            size_bytes: f.size_bytes,
            position: f.position,
        }
    }
}

/// A user's accumulated uploads, in merge order.
#[derive(Debug, Default)]
struct Session {
    files: Vec<UploadedFile>,
}

impl Session {
    /// Restore the dense 0..n position ordering after a removal or reorder.
    fn renumber(&mut self) {
        for (i, f) in self.files.iter_mut().enumerate() {
            f.position = i;
        }
    }
}

/// Registry of sessions, keyed by opaque session id.
///
/// Cheap to clone-by-Arc into an HTTP layer; all methods take `&self`.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicitly initialise an empty session and return its id.
    pub async fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::new(Mutex::new(Session::default())));
        debug!(session_id, "session created");
        session_id
    }

    /// Look up a session's lock, creating the session when `create` is set.
    async fn session(
        &self,
        session_id: &str,
        create: bool,
    ) -> Result<Arc<Mutex<Session>>, DocfuseError> {
        if let Some(s) = self.sessions.read().await.get(session_id) {
            return Ok(Arc::clone(s));
        }
        if create {
            let mut map = self.sessions.write().await;
            // Re-check under the write lock; another upload may have won.
            let entry = map
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Session::default())));
            return Ok(Arc::clone(entry));
        }
        Err(DocfuseError::SessionNotFound {
            session_id: session_id.to_string(),
        })
    }

    /// Add a file to the session, assigning a fresh id and the next
    /// position. Creates the session on first upload.
    ///
    /// The file is classified eagerly so the caller can immediately report
    /// an unsupported upload back to the user.
    pub async fn upload(
        &self,
        session_id: &str,
        original_name: &str,
        content: Vec<u8>,
    ) -> Result<FileInfo, DocfuseError> {
        let session = self.session(session_id, true).await?;
        let mut session = session.lock().await;

        let category = classify(original_name, &content);
        let file = UploadedFile {
            id: Uuid::new_v4().to_string(),
            original_name: original_name.to_string(),
            category,
            size_bytes: content.len() as u64,
            content: Arc::from(content),
            position: session.files.len(),
        };
        let info = FileInfo::from(&file);
        debug!(
            session_id,
            file_id = %info.id,
            name = original_name,
            %category,
            size = info.size_bytes,
            "file uploaded"
        );
        session.files.push(file);
        Ok(info)
    }

    /// Remove one file. The remaining files close the position gap.
    pub async fn remove(&self, session_id: &str, file_id: &str) -> Result<(), DocfuseError> {
        let session = self.session(session_id, false).await?;
        let mut session = session.lock().await;

        let Some(idx) = session.files.iter().position(|f| f.id == file_id) else {
            return Err(DocfuseError::FileNotFound {
                file_id: file_id.to_string(),
            });
        };
        session.files.remove(idx);
        session.renumber();
        debug!(session_id, file_id, "file removed");
        Ok(())
    }

    /// Replace the session's merge order.
    ///
    /// `new_id_order` must be a permutation of the session's current file
    /// ids; otherwise the order is left untouched and
    /// [`DocfuseError::InvalidOrder`] is returned.
    pub async fn reorder(
        &self,
        session_id: &str,
        new_id_order: &[String],
    ) -> Result<(), DocfuseError> {
        let session = self.session(session_id, false).await?;
        let mut session = session.lock().await;

        if new_id_order.len() != session.files.len() {
            return Err(DocfuseError::InvalidOrder {
                detail: format!(
                    "expected {} ids, got {}",
                    session.files.len(),
                    new_id_order.len()
                ),
            });
        }

        let mut by_id: HashMap<&str, usize> = session
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.as_str(), i))
            .collect();

        let mut indices = Vec::with_capacity(new_id_order.len());
        for id in new_id_order {
            match by_id.remove(id.as_str()) {
                Some(i) => indices.push(i),
                None => {
                    return Err(DocfuseError::InvalidOrder {
                        detail: format!("'{id}' is not a file in this session (or repeats)"),
                    });
                }
            }
        }

        // Validation passed; apply the permutation in one pass.
        let mut reordered = Vec::with_capacity(indices.len());
        let old = std::mem::take(&mut session.files);
        let mut old: Vec<Option<UploadedFile>> = old.into_iter().map(Some).collect();
        for i in indices {
            reordered.push(old[i].take().expect("permutation indices are unique"));
        }
        session.files = reordered;
        session.renumber();
        debug!(session_id, "session reordered");
        Ok(())
    }

    /// Destroy the session and all its files.
    pub async fn clear(&self, session_id: &str) -> Result<(), DocfuseError> {
        match self.sessions.write().await.remove(session_id) {
            Some(_) => {
                debug!(session_id, "session cleared");
                Ok(())
            }
            None => Err(DocfuseError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    /// Metadata for every file in the session, in merge order.
    pub async fn list(&self, session_id: &str) -> Result<Vec<FileInfo>, DocfuseError> {
        let session = self.session(session_id, false).await?;
        let session = session.lock().await;
        Ok(session.files.iter().map(FileInfo::from).collect())
    }

    /// Resolve requested ids against a stable copy of the session.
    ///
    /// Returns one slot per requested id, in request order; unknown ids
    /// yield `None` so the orchestrator can fail just that slot. The lock
    /// is held only while cloning records (content is `Arc`-shared), so a
    /// job observes the file list as it was at job start even if the
    /// session is mutated mid-job.
    pub async fn snapshot(
        &self,
        session_id: &str,
        requested_ids: &[String],
    ) -> Result<Vec<(String, Option<UploadedFile>)>, DocfuseError> {
        let session = self.session(session_id, false).await?;
        let session = session.lock().await;

        Ok(requested_ids
            .iter()
            .map(|id| {
                let file = session.files.iter().find(|f| &f.id == id).cloned();
                (id.clone(), file)
            })
            .collect())
    }
}
