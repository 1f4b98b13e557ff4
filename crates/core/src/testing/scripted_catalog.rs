//! Catalog double with scriptable failures and read hooks.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::catalog::{
    CatalogError, CatalogRecord, Engagement, NewVideo, Reaction, ReactionCounts,
    SqliteVideoCatalog, VideoCatalog, VideoQuery,
};

type Hook = Box<dyn FnOnce() + Send>;

/// In-memory SQLite catalog that can reject inserts and run a callback right
/// after the next `storage_folders` read.
pub struct ScriptedCatalog {
    inner: SqliteVideoCatalog,
    fail_inserts: AtomicBool,
    after_folders_read: Mutex<Option<Hook>>,
}

impl ScriptedCatalog {
    pub fn in_memory() -> Result<Self, CatalogError> {
        Ok(Self {
            inner: SqliteVideoCatalog::in_memory()?,
            fail_inserts: AtomicBool::new(false),
            after_folders_read: Mutex::new(None),
        })
    }

    /// Makes every following insert fail with a database error.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Runs `hook` once, after the next `storage_folders` result is read.
    pub fn after_folders_read(&self, hook: impl FnOnce() + Send + 'static) {
        if let Ok(mut slot) = self.after_folders_read.lock() {
            *slot = Some(Box::new(hook));
        }
    }
}

impl VideoCatalog for ScriptedCatalog {
    fn insert(&self, video: &NewVideo) -> Result<CatalogRecord, CatalogError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(CatalogError::Database("disk I/O error".to_string()));
        }
        self.inner.insert(video)
    }

    fn get(&self, id: &str) -> Result<CatalogRecord, CatalogError> {
        self.inner.get(id)
    }

    fn search(&self, query: &VideoQuery) -> Result<Vec<CatalogRecord>, CatalogError> {
        self.inner.search(query)
    }

    fn trending(&self, limit: u32) -> Result<Vec<CatalogRecord>, CatalogError> {
        self.inner.trending(limit)
    }

    fn ids(&self) -> Result<Vec<String>, CatalogError> {
        self.inner.ids()
    }

    fn count(&self) -> Result<u64, CatalogError> {
        self.inner.count()
    }

    fn storage_folders(&self) -> Result<HashSet<String>, CatalogError> {
        let folders = self.inner.storage_folders();
        let hook = self
            .after_folders_read
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(hook) = hook {
            hook();
        }
        folders
    }

    fn thumbnail_references(&self) -> Result<HashSet<String>, CatalogError> {
        self.inner.thumbnail_references()
    }

    fn record_view(
        &self,
        id: &str,
        viewer: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, CatalogError> {
        self.inner.record_view(id, viewer, at)
    }

    fn set_reaction(
        &self,
        id: &str,
        viewer: &str,
        reaction: Reaction,
    ) -> Result<ReactionCounts, CatalogError> {
        self.inner.set_reaction(id, viewer, reaction)
    }

    fn engagement_since(
        &self,
        id: &str,
        since: DateTime<Utc>,
    ) -> Result<Engagement, CatalogError> {
        self.inner.engagement_since(id, since)
    }

    fn set_trending_score(&self, id: &str, score: f64) -> Result<(), CatalogError> {
        self.inner.set_trending_score(id, score)
    }
}
