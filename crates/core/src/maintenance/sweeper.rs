//! Deferred cleanup of artifacts no catalog record references.
//!
//! A job whose catalog write fails leaves its renditions and poster on disk.
//! The sweeper removes such leftovers once they are older than the grace
//! period and no active job owns them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, VideoCatalog};
use crate::ingest::IngestCoordinator;
use crate::layout::StorageLayout;
use crate::metrics;

/// Suffix of transcript scratch files in `incoming/`.
const AUDIO_SCRATCH_SUFFIX: &str = "_audio.wav";

/// Orphan sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Minimum age before an unreferenced artifact is removed.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_grace_period_secs() -> u64 {
    86400
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            grace_period_secs: default_grace_period_secs(),
        }
    }
}

/// What a sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub job_dirs: usize,
    pub thumbnails: usize,
    pub scratch_files: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.job_dirs + self.thumbnails + self.scratch_files
    }
}

pub struct OrphanSweeper {
    config: SweeperConfig,
    storage: StorageLayout,
    catalog: Arc<dyn VideoCatalog>,
    coordinator: Arc<IngestCoordinator>,
}

impl OrphanSweeper {
    pub fn new(
        config: SweeperConfig,
        storage: StorageLayout,
        catalog: Arc<dyn VideoCatalog>,
        coordinator: Arc<IngestCoordinator>,
    ) -> Self {
        Self {
            config,
            storage,
            catalog,
            coordinator,
        }
    }

    fn grace_period(&self) -> Duration {
        Duration::from_secs(self.config.grace_period_secs)
    }

    /// One pass over the storage root.
    pub async fn run_once(&self) -> Result<SweepReport, CatalogError> {
        // Active jobs first: a job that persists and finishes between the two
        // reads then still shows up in one of them.
        let active: HashSet<String> =
            self.coordinator.active_job_ids().await.into_iter().collect();
        let folders = self.catalog.storage_folders()?;
        let thumbnails = self.catalog.thumbnail_references()?;
        let now = SystemTime::now();
        let mut report = SweepReport::default();

        for (name, path) in list_entries(&self.storage.hls_root()).await {
            if folders.contains(&name)
                || active.contains(&name)
                || !self.expired(&path, now).await
            {
                continue;
            }
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    info!(job_id = %name, "Removed orphaned job directory");
                    metrics::SWEEPER_REMOVALS.with_label_values(&["job_dir"]).inc();
                    report.job_dirs += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove job directory")
                }
            }
        }

        let placeholder = self.storage.placeholder_thumbnail();
        for (name, path) in list_entries(&self.storage.thumbnails_dir()).await {
            let reference = self.storage.reference(&path);
            let job_id = name.split('.').next().unwrap_or_default();
            if thumbnails.contains(&reference)
                || active.contains(job_id)
                || path == placeholder
                || !self.expired(&path, now).await
            {
                continue;
            }
            if remove_file(&path).await {
                metrics::SWEEPER_REMOVALS.with_label_values(&["thumbnail"]).inc();
                report.thumbnails += 1;
            }
        }

        for (name, path) in list_entries(&self.storage.incoming_dir()).await {
            let Some(job_id) = name.strip_suffix(AUDIO_SCRATCH_SUFFIX) else {
                continue;
            };
            if active.contains(job_id) || !self.expired(&path, now).await {
                continue;
            }
            if remove_file(&path).await {
                metrics::SWEEPER_REMOVALS.with_label_values(&["scratch"]).inc();
                report.scratch_files += 1;
            }
        }

        debug!(?report, "Sweep finished");
        Ok(report)
    }

    async fn expired(&self, path: &Path, now: SystemTime) -> bool {
        let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        now.duration_since(modified)
            .map(|age| age >= self.grace_period())
            .unwrap_or(false)
    }

    /// Runs on the configured interval until shutdown.
    pub fn spawn(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Orphan sweeper started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Orphan sweeper received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match self.run_once().await {
                            Ok(report) if report.total() > 0 => {
                                info!(removed = report.total(), "Orphaned artifacts removed");
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "Sweep failed"),
                        }
                    }
                }
            }
            info!("Orphan sweeper stopped");
        })
    }
}

async fn list_entries(dir: &Path) -> Vec<(String, std::path::PathBuf)> {
    let mut entries = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(_) => return entries,
    };
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        entries.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }
    entries
}

async fn remove_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!(path = %path.display(), "Removed orphaned file");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove orphaned file");
            false
        }
    }
}
