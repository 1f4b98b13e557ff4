//! Video catalog - the persisted record of every finished upload.
//!
//! Ingestion inserts each record exactly once. Afterwards only engagement
//! fields (views, reactions, trending score) change.

mod sqlite;
mod types;

pub use sqlite::SqliteVideoCatalog;
pub use types::*;

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Trait for video catalog storage.
pub trait VideoCatalog: Send + Sync {
    /// Persist a new record in a single atomic write.
    fn insert(&self, video: &NewVideo) -> Result<CatalogRecord, CatalogError>;

    /// Get a record by id.
    fn get(&self, id: &str) -> Result<CatalogRecord, CatalogError>;

    /// List records, newest first, optionally filtered by text.
    fn search(&self, query: &VideoQuery) -> Result<Vec<CatalogRecord>, CatalogError>;

    /// Records with the highest trending score.
    fn trending(&self, limit: u32) -> Result<Vec<CatalogRecord>, CatalogError>;

    /// All record ids.
    fn ids(&self) -> Result<Vec<String>, CatalogError>;

    /// Number of records.
    fn count(&self) -> Result<u64, CatalogError>;

    /// Job directories referenced by some record.
    fn storage_folders(&self) -> Result<HashSet<String>, CatalogError>;

    /// Thumbnail references held by some record.
    fn thumbnail_references(&self) -> Result<HashSet<String>, CatalogError>;

    /// Count a view. Each viewer is counted at most once per video.
    ///
    /// Returns whether this call added a view.
    fn record_view(&self, id: &str, viewer: &str, at: DateTime<Utc>)
        -> Result<bool, CatalogError>;

    /// Set (or replace) a viewer's reaction and return the new totals.
    fn set_reaction(
        &self,
        id: &str,
        viewer: &str,
        reaction: Reaction,
    ) -> Result<ReactionCounts, CatalogError>;

    /// Engagement figures since the given instant.
    fn engagement_since(&self, id: &str, since: DateTime<Utc>)
        -> Result<Engagement, CatalogError>;

    /// Write the trending score. Touches no other field.
    fn set_trending_score(&self, id: &str, score: f64) -> Result<(), CatalogError>;
}
