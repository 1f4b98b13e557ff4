//! SQLite-backed video catalog implementation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    CatalogError, CatalogRecord, Engagement, NewVideo, Reaction, ReactionCounts, VideoCatalog,
    VideoQuery,
};

const RECORD_COLUMNS: &str = "id, title, description, hashtags, storage_folder, available_qualities,
     thumbnail, duration_secs, codec, bitrate, resolution, owner, views, likes, dislikes,
     transcript, trending_score, created_at";

/// SQLite-backed video catalog.
pub struct SqliteVideoCatalog {
    conn: Mutex<Connection>,
}

impl SqliteVideoCatalog {
    /// Create a new SQLite catalog, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- One row per ingested upload
            CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                hashtags TEXT NOT NULL,
                storage_folder TEXT NOT NULL UNIQUE,
                available_qualities TEXT NOT NULL,
                thumbnail TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                codec TEXT NOT NULL,
                bitrate INTEGER NOT NULL,
                resolution TEXT NOT NULL,
                owner TEXT NOT NULL,
                views INTEGER NOT NULL DEFAULT 0,
                likes INTEGER NOT NULL DEFAULT 0,
                dislikes INTEGER NOT NULL DEFAULT 0,
                transcript TEXT,
                trending_score REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_videos_created ON videos(created_at);
            CREATE INDEX IF NOT EXISTS idx_videos_trending ON videos(trending_score);

            -- One row per (video, viewer); viewed_at is the first view
            CREATE TABLE IF NOT EXISTS video_views (
                video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                viewer TEXT NOT NULL,
                viewed_at TEXT NOT NULL,
                PRIMARY KEY (video_id, viewer)
            );

            CREATE INDEX IF NOT EXISTS idx_video_views_time ON video_views(video_id, viewed_at);

            CREATE TABLE IF NOT EXISTS video_reactions (
                video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                viewer TEXT NOT NULL,
                reaction TEXT NOT NULL CHECK (reaction IN ('like', 'dislike')),
                reacted_at TEXT NOT NULL,
                PRIMARY KEY (video_id, viewer)
            );
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog connection lock poisoned".to_string()))
    }

    fn ensure_exists(conn: &Connection, id: &str) -> Result<(), CatalogError> {
        let found = conn
            .query_row("SELECT 1 FROM videos WHERE id = ?", params![id], |_| Ok(()))
            .optional()
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        found.ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params, Self::row_to_record)
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| CatalogError::Database(e.to_string()))?);
        }
        Ok(records)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CatalogRecord> {
        let created_at_str: String = row.get(17)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let transcript: Option<String> = row.get(15)?;
        let transcript = match transcript {
            Some(json) => Some(decode_json(15, &json)?),
            None => None,
        };

        Ok(CatalogRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            hashtags: decode_json(3, &row.get::<_, String>(3)?)?,
            storage_folder: row.get(4)?,
            available_qualities: decode_json(5, &row.get::<_, String>(5)?)?,
            thumbnail: row.get(6)?,
            duration_secs: row.get(7)?,
            codec: row.get(8)?,
            bitrate: row.get::<_, i64>(9)? as u64,
            resolution: row.get(10)?,
            owner: row.get(11)?,
            views: row.get::<_, i64>(12)? as u64,
            likes: row.get::<_, i64>(13)? as u64,
            dislikes: row.get::<_, i64>(14)? as u64,
            transcript,
            trending_score: row.get(16)?,
            created_at,
        })
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(idx: usize, json: &str) -> rusqlite::Result<T> {
    serde_json::from_str(json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, CatalogError> {
    serde_json::to_string(value).map_err(|e| CatalogError::Internal(e.to_string()))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl VideoCatalog for SqliteVideoCatalog {
    fn insert(&self, video: &NewVideo) -> Result<CatalogRecord, CatalogError> {
        let conn = self.lock()?;
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let transcript = match &video.transcript {
            Some(segments) => Some(encode_json(segments)?),
            None => None,
        };

        conn.execute(
            "INSERT INTO videos (id, title, description, hashtags, storage_folder,
                available_qualities, thumbnail, duration_secs, codec, bitrate, resolution,
                owner, transcript, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                &id,
                &video.title,
                &video.description,
                encode_json(&video.hashtags)?,
                &video.storage_folder,
                encode_json(&video.available_qualities)?,
                &video.thumbnail,
                video.duration_secs,
                &video.codec,
                video.bitrate as i64,
                &video.resolution,
                &video.owner,
                transcript,
                timestamp(created_at),
            ],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(CatalogRecord {
            id,
            title: video.title.clone(),
            description: video.description.clone(),
            hashtags: video.hashtags.clone(),
            storage_folder: video.storage_folder.clone(),
            available_qualities: video.available_qualities.clone(),
            thumbnail: video.thumbnail.clone(),
            duration_secs: video.duration_secs,
            codec: video.codec.clone(),
            bitrate: video.bitrate,
            resolution: video.resolution.clone(),
            owner: video.owner.clone(),
            views: 0,
            likes: 0,
            dislikes: 0,
            transcript: video.transcript.clone(),
            trending_score: 0.0,
            created_at,
        })
    }

    fn get(&self, id: &str) -> Result<CatalogRecord, CatalogError> {
        let conn = self.lock()?;

        conn.query_row(
            &format!("SELECT {} FROM videos WHERE id = ?", RECORD_COLUMNS),
            params![id],
            Self::row_to_record,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound(id.to_string()),
            _ => CatalogError::Database(e.to_string()),
        })
    }

    fn search(&self, query: &VideoQuery) -> Result<Vec<CatalogRecord>, CatalogError> {
        let conn = self.lock()?;
        let pattern = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q));

        Self::query_records(
            &conn,
            &format!(
                "SELECT {} FROM videos
                 WHERE ?1 IS NULL OR title LIKE ?1 OR description LIKE ?1 OR hashtags LIKE ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
                RECORD_COLUMNS
            ),
            params![pattern, query.limit],
        )
    }

    fn trending(&self, limit: u32) -> Result<Vec<CatalogRecord>, CatalogError> {
        let conn = self.lock()?;
        Self::query_records(
            &conn,
            &format!(
                "SELECT {} FROM videos ORDER BY trending_score DESC, created_at DESC LIMIT ?",
                RECORD_COLUMNS
            ),
            params![limit],
        )
    }

    fn ids(&self) -> Result<Vec<String>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM videos")
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn count(&self) -> Result<u64, CatalogError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(count as u64)
    }

    fn storage_folders(&self) -> Result<HashSet<String>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT storage_folder FROM videos")
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        rows.collect::<Result<HashSet<_>, _>>()
            .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn thumbnail_references(&self) -> Result<HashSet<String>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT thumbnail FROM videos")
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        rows.collect::<Result<HashSet<_>, _>>()
            .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn record_view(
        &self,
        id: &str,
        viewer: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, CatalogError> {
        let mut conn = self.lock()?;
        Self::ensure_exists(&conn, id)?;

        let tx = conn
            .transaction()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO video_views (video_id, viewer, viewed_at) VALUES (?, ?, ?)",
                params![id, viewer, timestamp(at)],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if inserted == 1 {
            tx.execute(
                "UPDATE videos SET views = views + 1 WHERE id = ?",
                params![id],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(inserted == 1)
    }

    fn set_reaction(
        &self,
        id: &str,
        viewer: &str,
        reaction: Reaction,
    ) -> Result<ReactionCounts, CatalogError> {
        let mut conn = self.lock()?;
        Self::ensure_exists(&conn, id)?;

        let tx = conn
            .transaction()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO video_reactions (video_id, viewer, reaction, reacted_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(video_id, viewer) DO UPDATE SET
                reaction = excluded.reaction,
                reacted_at = excluded.reacted_at",
            params![id, viewer, reaction.as_str(), timestamp(Utc::now())],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        tx.execute(
            "UPDATE videos SET
                likes = (SELECT COUNT(*) FROM video_reactions WHERE video_id = ?1 AND reaction = 'like'),
                dislikes = (SELECT COUNT(*) FROM video_reactions WHERE video_id = ?1 AND reaction = 'dislike')
             WHERE id = ?1",
            params![id],
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        let counts = tx
            .query_row(
                "SELECT likes, dislikes FROM videos WHERE id = ?",
                params![id],
                |row| {
                    Ok(ReactionCounts {
                        likes: row.get::<_, i64>(0)? as u64,
                        dislikes: row.get::<_, i64>(1)? as u64,
                    })
                },
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(counts)
    }

    fn engagement_since(
        &self,
        id: &str,
        since: DateTime<Utc>,
    ) -> Result<Engagement, CatalogError> {
        let conn = self.lock()?;

        let likes: i64 = conn
            .query_row("SELECT likes FROM videos WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound(id.to_string()),
                _ => CatalogError::Database(e.to_string()),
            })?;

        let recent_views: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM video_views WHERE video_id = ? AND viewed_at >= ?",
                params![id, timestamp(since)],
                |row| row.get(0),
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(Engagement {
            recent_views: recent_views as u64,
            likes: likes as u64,
            // Comments live outside this store.
            recent_comments: 0,
        })
    }

    fn set_trending_score(&self, id: &str, score: f64) -> Result<(), CatalogError> {
        let conn = self.lock()?;

        let rows_affected = conn
            .execute(
                "UPDATE videos SET trending_score = ? WHERE id = ?",
                params![score, id],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows_affected == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }

        Ok(())
    }
}
