//! [`AnalysisStore`] over two JSON files in a data directory.
//!
//! `history.json` holds newest-first entries capped at [`HISTORY_LIMIT`]; `bookmarks.json` holds
//! newest-first bookmarks keyed by analysis id. File IO is blocking and runs on the blocking
//! pool; a per-store lock serializes read-modify-write cycles.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use synaptic_core::store::HISTORY_LIMIT;
use synaptic_core::{AnalysisStore, Bookmark, Error, HistoryEntry, Result};

const HISTORY_FILE: &str = "history.json";
const BOOKMARKS_FILE: &str = "bookmarks.json";

/// Stable id for an analysis of `url` at `created_at_epoch_s`.
pub fn history_id(url: &str, created_at_epoch_s: u64) -> String {
    let mut h = Sha256::new();
    h.update(b"url:");
    h.update(url.as_bytes());
    h.update(b"\ncreated_at:");
    h.update(created_at_epoch_s.to_string().as_bytes());
    let full = hex::encode(h.finalize());
    full[..16].to_string()
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_list<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let p = self.root.join(file);
        if !p.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&p).map_err(store_err)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| Error::Store(format!("{}: {e}", p.display())))
    }

    /// Write via a temp file + rename so readers never see a half-written list.
    fn write_list<T: Serialize>(&self, file: &str, items: &[T]) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(store_err)?;
        let p = self.root.join(file);
        let tmp = self.root.join(format!("{file}.tmp"));
        let bytes = serde_json::to_vec_pretty(items).map_err(store_err)?;
        fs::write(&tmp, bytes).map_err(store_err)?;
        fs::rename(&tmp, &p).map_err(store_err)?;
        Ok(())
    }

    fn with_lock<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        let _g = self
            .lock
            .lock()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        f(self)
    }

    pub fn save_analysis_blocking(&self, entry: &HistoryEntry) -> Result<HistoryEntry> {
        self.with_lock(|s| {
            let mut e = entry.clone();
            let mut history: Vec<HistoryEntry> = s.read_list(HISTORY_FILE)?;
            if e.id.trim().is_empty() {
                e.id = history_id(&e.url, e.created_at_epoch_s);
                // Same url in the same second: salt until the id is free.
                let mut n = 1u32;
                while history.iter().any(|h| h.id == e.id) {
                    e.id = history_id(&format!("{}#{n}", e.url), e.created_at_epoch_s);
                    n += 1;
                }
            }
            history.retain(|h| h.id != e.id);
            history.insert(0, e.clone());
            history.truncate(HISTORY_LIMIT);
            s.write_list(HISTORY_FILE, &history)?;
            Ok(e)
        })
    }

    pub fn list_analyses_blocking(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.with_lock(|s| {
            let mut history: Vec<HistoryEntry> = s.read_list(HISTORY_FILE)?;
            history.truncate(limit);
            Ok(history)
        })
    }

    pub fn save_bookmark_blocking(&self, bookmark: &Bookmark) -> Result<Bookmark> {
        self.with_lock(|s| {
            let mut bookmarks: Vec<Bookmark> = s.read_list(BOOKMARKS_FILE)?;
            bookmarks.retain(|b| b.analysis_id != bookmark.analysis_id);
            bookmarks.insert(0, bookmark.clone());
            s.write_list(BOOKMARKS_FILE, &bookmarks)?;
            Ok(bookmark.clone())
        })
    }

    pub fn remove_bookmark_blocking(&self, analysis_id: &str) -> Result<bool> {
        self.with_lock(|s| {
            let mut bookmarks: Vec<Bookmark> = s.read_list(BOOKMARKS_FILE)?;
            let before = bookmarks.len();
            bookmarks.retain(|b| b.analysis_id != analysis_id);
            let removed = bookmarks.len() != before;
            if removed {
                s.write_list(BOOKMARKS_FILE, &bookmarks)?;
            }
            Ok(removed)
        })
    }

    pub fn list_bookmarks_blocking(&self) -> Result<Vec<Bookmark>> {
        self.with_lock(|s| s.read_list(BOOKMARKS_FILE))
    }

    pub fn clear_blocking(&self) -> Result<()> {
        self.with_lock(|s| {
            for f in [HISTORY_FILE, BOOKMARKS_FILE] {
                let p = s.root.join(f);
                if p.exists() {
                    fs::remove_file(&p).map_err(store_err)?;
                }
            }
            Ok(())
        })
    }

    async fn blocking<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(FsStore) -> Result<R> + Send + 'static,
    {
        let me = self.clone();
        tokio::task::spawn_blocking(move || f(me))
            .await
            .map_err(|e| Error::Store(format!("store join failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl AnalysisStore for FsStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn save_analysis(&self, entry: &HistoryEntry) -> Result<HistoryEntry> {
        let entry = entry.clone();
        self.blocking(move |s| s.save_analysis_blocking(&entry)).await
    }

    async fn list_analyses(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.blocking(move |s| s.list_analyses_blocking(limit)).await
    }

    async fn save_bookmark(&self, bookmark: &Bookmark) -> Result<Bookmark> {
        let bookmark = bookmark.clone();
        self.blocking(move |s| s.save_bookmark_blocking(&bookmark))
            .await
    }

    async fn remove_bookmark(&self, analysis_id: &str) -> Result<bool> {
        let id = analysis_id.to_string();
        self.blocking(move |s| s.remove_bookmark_blocking(&id)).await
    }

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>> {
        self.blocking(|s| s.list_bookmarks_blocking()).await
    }

    async fn find_bookmark_by_url(&self, url: &str) -> Result<Option<Bookmark>> {
        let url = url.to_string();
        self.blocking(move |s| {
            Ok(s.list_bookmarks_blocking()?
                .into_iter()
                .find(|b| b.url == url))
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.blocking(|s| s.clear_blocking()).await
    }
}
