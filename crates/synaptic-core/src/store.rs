//! Saved analyses and bookmarks.
//!
//! Persistence is a capability ([`AnalysisStore`]) passed explicitly to whoever needs it. The
//! local-file and remote row-store implementations live in `synaptic-local`.

use crate::{AnalysisResult, Result};
use serde::{Deserialize, Serialize};

/// History is newest-first and bounded.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub url: String,
    pub title: String,
    pub created_at_epoch_s: u64,
    pub overall_score: u32,
    pub analysis: AnalysisResult,
    #[serde(default)]
    pub structured_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub analysis_id: String,
    pub url: String,
    pub title: String,
    pub overall_score: u32,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at_epoch_s: u64,
}

#[async_trait::async_trait]
pub trait AnalysisStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Persist an analysis; returns the entry as stored (the store may assign the id).
    async fn save_analysis(&self, entry: &HistoryEntry) -> Result<HistoryEntry>;
    /// Newest first.
    async fn list_analyses(&self, limit: usize) -> Result<Vec<HistoryEntry>>;
    /// Insert or replace the bookmark for `bookmark.analysis_id`.
    async fn save_bookmark(&self, bookmark: &Bookmark) -> Result<Bookmark>;
    /// Returns whether a bookmark was removed.
    async fn remove_bookmark(&self, analysis_id: &str) -> Result<bool>;
    /// Newest first.
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>>;
    async fn find_bookmark_by_url(&self, url: &str) -> Result<Option<Bookmark>>;
    /// Drop all history and bookmarks.
    async fn clear(&self) -> Result<()>;
}

/// Copy history (and bookmarks for migrated URLs) from `from` into `to`.
///
/// The source is cleared only when at least one entry migrated. Individual save failures are
/// skipped; the count reports what landed.
pub async fn migrate(from: &dyn AnalysisStore, to: &dyn AnalysisStore) -> Result<usize> {
    let history = from.list_analyses(usize::MAX).await?;
    let bookmarks = from.list_bookmarks().await?;
    let mut migrated = 0usize;
    // Oldest first, so newest-first ordering survives on the target.
    for entry in history.iter().rev() {
        let Ok(saved) = to.save_analysis(entry).await else {
            continue;
        };
        if let Some(b) = bookmarks.iter().find(|b| b.url == entry.url) {
            let mut b = b.clone();
            b.analysis_id = saved.id.clone();
            let _ = to.save_bookmark(&b).await;
        }
        migrated += 1;
    }
    if migrated > 0 {
        from.clear().await?;
    }
    Ok(migrated)
}
