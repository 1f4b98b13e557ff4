//! On-disk media layout.
//!
//! `StorageLayout` owns the storage root; `JobLayout` is the one place path
//! conventions for a single job are spelled out. Encoding, manifest
//! composition, poster resolution and the catalog record all read paths from
//! here.
//!
//! ```text
//! <root>/
//!   hls/<job_id>/master.m3u8
//!   hls/<job_id>/<label>/index.m3u8
//!   hls/<job_id>/<label>/000.ts ...
//!   thumbnails/<job_id>.<ext>
//!   incoming/                      raw uploads and scratch files
//!   static/default-thumbnail.jpg
//! ```

use std::io;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use tracing::info;

const HLS_DIR: &str = "hls";
const THUMBNAILS_DIR: &str = "thumbnails";
const INCOMING_DIR: &str = "incoming";
const STATIC_DIR: &str = "static";
const PLACEHOLDER_FILE: &str = "default-thumbnail.jpg";

/// Master manifest filename inside a job directory.
pub const MASTER_MANIFEST: &str = "master.m3u8";
/// Sub-manifest filename inside a rendition directory.
pub const SUB_MANIFEST: &str = "index.m3u8";

const PLACEHOLDER_WIDTH: u32 = 320;
const PLACEHOLDER_HEIGHT: u32 = 180;

/// The storage root and its fixed subdirectories.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hls_root(&self) -> PathBuf {
        self.root.join(HLS_DIR)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join(THUMBNAILS_DIR)
    }

    pub fn incoming_dir(&self) -> PathBuf {
        self.root.join(INCOMING_DIR)
    }

    /// Fallback poster used when no thumbnail could be produced.
    pub fn placeholder_thumbnail(&self) -> PathBuf {
        self.root.join(STATIC_DIR).join(PLACEHOLDER_FILE)
    }

    /// Creates the fixed subdirectories and the placeholder poster.
    pub async fn ensure(&self) -> io::Result<()> {
        for dir in [
            self.hls_root(),
            self.thumbnails_dir(),
            self.incoming_dir(),
            self.root.join(STATIC_DIR),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        self.ensure_placeholder().await?;
        Ok(())
    }

    /// Writes the placeholder poster if it is missing and returns its path.
    pub async fn ensure_placeholder(&self) -> io::Result<PathBuf> {
        let placeholder = self.placeholder_thumbnail();
        if tokio::fs::metadata(&placeholder).await.is_err() {
            tokio::fs::create_dir_all(self.root.join(STATIC_DIR)).await?;
            let path = placeholder.clone();
            tokio::task::spawn_blocking(move || write_placeholder(&path))
                .await
                .map_err(io::Error::other)??;
            info!(path = %placeholder.display(), "Wrote placeholder thumbnail");
        }
        Ok(placeholder)
    }

    /// Paths for a job, without touching the filesystem.
    pub fn job(&self, job_id: &str) -> JobLayout {
        JobLayout {
            job_id: job_id.to_string(),
            root: self.hls_root().join(job_id),
            thumbnails_dir: self.thumbnails_dir(),
            incoming_dir: self.incoming_dir(),
        }
    }

    /// Claims the job subtree. Fails if it already exists, so no two jobs
    /// ever write into the same directory.
    pub async fn allocate_job(&self, job_id: &str) -> io::Result<JobLayout> {
        let layout = self.job(job_id);
        tokio::fs::create_dir_all(self.hls_root()).await?;
        tokio::fs::create_dir(&layout.root).await?;
        tokio::fs::create_dir_all(&layout.thumbnails_dir).await?;
        tokio::fs::create_dir_all(&layout.incoming_dir).await?;
        Ok(layout)
    }

    /// Resolves a catalog thumbnail reference to an absolute path.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }

    /// Converts a path under the root into the relative reference stored in
    /// the catalog. Paths outside the root are returned unchanged.
    pub fn reference(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn write_placeholder(path: &Path) -> io::Result<()> {
    let image = RgbImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, Rgb([24, 24, 27]));
    image
        .save_with_format(path, ImageFormat::Jpeg)
        .map_err(io::Error::other)
}

/// Every path belonging to one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    job_id: String,
    root: PathBuf,
    thumbnails_dir: PathBuf,
    incoming_dir: PathBuf,
}

impl JobLayout {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Job directory (`hls/<job_id>`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rendition_dir(&self, label: &str) -> PathBuf {
        self.root.join(label)
    }

    pub fn playlist_path(&self, label: &str) -> PathBuf {
        self.rendition_dir(label).join(SUB_MANIFEST)
    }

    pub fn segment_pattern(&self, label: &str) -> PathBuf {
        self.rendition_dir(label).join("%03d.ts")
    }

    pub fn master_manifest_path(&self) -> PathBuf {
        self.root.join(MASTER_MANIFEST)
    }

    /// Sub-manifest reference as written into the master manifest.
    pub fn playlist_reference(&self, label: &str) -> String {
        format!("{}/{}", label, SUB_MANIFEST)
    }

    /// Poster path for the given image extension (without dot).
    pub fn thumbnail_path(&self, extension: &str) -> PathBuf {
        self.thumbnails_dir
            .join(format!("{}.{}", self.job_id, extension.to_ascii_lowercase()))
    }

    /// Scratch WAV used while transcribing.
    pub fn audio_scratch_path(&self) -> PathBuf {
        self.incoming_dir.join(format!("{}_audio.wav", self.job_id))
    }
}
