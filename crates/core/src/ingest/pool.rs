//! Rendition encoder pool.
//!
//! One task per ladder tier, all spawned at once, settled with a join-all.
//! A failing tier never cancels its siblings. A shared semaphore caps the
//! number of encoder processes across every job in flight.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use super::types::{JobContext, RenditionStatus, RenditionTask};
use crate::encoder::{MediaEncoder, RenditionJob};
use crate::ladder::QualityTier;
use crate::metrics;

/// Per-task notification sent while the pool runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionUpdate {
    pub label: String,
    pub status: RenditionStatus,
}

/// Status of the encoder pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Encodes holding a permit.
    pub active_encodes: usize,
    /// Maximum concurrent encodes.
    pub max_concurrent: usize,
    /// Encodes waiting for a permit.
    pub queued_encodes: usize,
    /// Total encodes settled since startup.
    pub total_processed: u64,
    /// Total encodes failed since startup.
    pub total_failed: u64,
}

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            active_encodes: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_encodes: self.queued.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Runs every ladder tier for a job.
pub struct RenditionPool {
    encoder: Arc<dyn MediaEncoder>,
    ladder: Vec<QualityTier>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    stats: Arc<PoolStats>,
}

impl RenditionPool {
    pub fn new(
        encoder: Arc<dyn MediaEncoder>,
        ladder: Vec<QualityTier>,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            encoder,
            ladder,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn ladder(&self) -> &[QualityTier] {
        &self.ladder
    }

    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(self.max_concurrent)
    }

    /// Encodes every tier and returns all task outcomes, in ladder order.
    ///
    /// `updates` receives `Running` when a task gets a permit and
    /// `Succeeded`/`Failed` when it settles, in real completion order.
    pub async fn run(
        &self,
        ctx: &JobContext,
        updates: mpsc::UnboundedSender<RenditionUpdate>,
    ) -> Vec<RenditionTask> {
        let mut tasks: Vec<RenditionTask> = self
            .ladder
            .iter()
            .map(|tier| RenditionTask::new(tier.clone(), ctx.layout.rendition_dir(&tier.label)))
            .collect();

        info!(job_id = %ctx.job_id, tiers = tasks.len(), "Starting rendition encodes");

        let handles: Vec<_> = tasks
            .iter()
            .map(|task| {
                let job = RenditionJob {
                    job_id: ctx.id().to_string(),
                    input_path: ctx.source.clone(),
                    tier: task.tier.clone(),
                    output_dir: task.output_dir.clone(),
                    playlist_path: ctx.layout.playlist_path(task.label()),
                    segment_pattern: ctx.layout.segment_pattern(task.label()),
                };
                let encoder = Arc::clone(&self.encoder);
                let semaphore = Arc::clone(&self.semaphore);
                let stats = Arc::clone(&self.stats);
                let updates = updates.clone();

                tokio::spawn(async move {
                    let label = job.tier.label.clone();

                    stats.queued.fetch_add(1, Ordering::Relaxed);
                    let permit = semaphore.acquire_owned().await;
                    stats.queued.fetch_sub(1, Ordering::Relaxed);
                    let _permit = match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            let _ = updates.send(RenditionUpdate {
                                label,
                                status: RenditionStatus::Failed,
                            });
                            return Err("encoder pool is shut down".to_string());
                        }
                    };

                    let _ = updates.send(RenditionUpdate {
                        label: label.clone(),
                        status: RenditionStatus::Running,
                    });

                    stats.active.fetch_add(1, Ordering::Relaxed);
                    let start = Instant::now();
                    let output_dir = job.output_dir.clone();
                    let result = encoder.encode_rendition(job).await;
                    stats.active.fetch_sub(1, Ordering::Relaxed);

                    metrics::RENDITION_DURATION
                        .with_label_values(&[label.as_str()])
                        .observe(start.elapsed().as_secs_f64());

                    let settled = match result {
                        Ok(output) => {
                            debug!(
                                label = %label,
                                segments = output.segment_count,
                                bytes = output.output_size_bytes,
                                "Rendition encoded"
                            );
                            Ok(output)
                        }
                        Err(e) => {
                            // Partial output must not linger next to good renditions.
                            if let Err(rm) = tokio::fs::remove_dir_all(&output_dir).await {
                                debug!(
                                    path = %output_dir.display(),
                                    error = %rm,
                                    "Failed to remove partial rendition"
                                );
                            }
                            Err(e.to_string())
                        }
                    };

                    let _ = updates.send(RenditionUpdate {
                        label,
                        status: if settled.is_ok() {
                            RenditionStatus::Succeeded
                        } else {
                            RenditionStatus::Failed
                        },
                    });

                    settled
                })
            })
            .collect();

        let results = join_all(handles).await;

        for (task, result) in tasks.iter_mut().zip(results) {
            match result {
                Ok(Ok(output)) => task.succeed(output),
                Ok(Err(error)) => {
                    warn!(
                        job_id = %ctx.job_id,
                        label = %task.label(),
                        error = %error,
                        "Rendition failed"
                    );
                    task.fail(error);
                }
                Err(join_error) => {
                    warn!(
                        job_id = %ctx.job_id,
                        label = %task.label(),
                        error = %join_error,
                        "Rendition task aborted"
                    );
                    task.fail(format!("encode task aborted: {}", join_error));
                    let _ = updates.send(RenditionUpdate {
                        label: task.label().to_string(),
                        status: RenditionStatus::Failed,
                    });
                }
            }

            let result_label = if task.is_succeeded() { "success" } else { "failure" };
            metrics::RENDITION_ENCODES
                .with_label_values(&[task.label(), result_label])
                .inc();
            self.stats.total_processed.fetch_add(1, Ordering::Relaxed);
            if !task.is_succeeded() {
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::JobId;
    use crate::layout::StorageLayout;
    use crate::testing::MockEncoder;
    use tempfile::TempDir;

    async fn context(dir: &TempDir) -> JobContext {
        let storage = StorageLayout::new(dir.path());
        let job_id = JobId::generate();
        let layout = storage.allocate_job(job_id.as_str()).await.unwrap();
        let source = dir.path().join("raw.mp4");
        tokio::fs::write(&source, b"raw").await.unwrap();
        JobContext {
            job_id,
            layout,
            source,
        }
    }

    fn three_tiers() -> Vec<QualityTier> {
        vec![
            QualityTier::new("360p", 640, 360, 800_000),
            QualityTier::new("720p", 1280, 720, 2_800_000),
            QualityTier::new("1080p", 1920, 1080, 5_000_000),
        ]
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_siblings() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let encoder = Arc::new(MockEncoder::new());
        encoder.fail_label("1080p").await;

        let pool = RenditionPool::new(encoder.clone(), three_tiers(), 2);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tasks = pool.run(&ctx, tx).await;

        let statuses: Vec<_> = tasks.iter().map(|t| (t.label(), t.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("360p", RenditionStatus::Succeeded),
                ("720p", RenditionStatus::Succeeded),
                ("1080p", RenditionStatus::Failed),
            ]
        );
        assert!(tasks[2].error.is_some());
        assert!(tasks[0].playlist_path.as_ref().unwrap().exists());
        assert!(!ctx.layout.rendition_dir("1080p").exists());

        let mut settled = 0;
        while let Ok(update) = rx.try_recv() {
            if update.status != RenditionStatus::Running {
                settled += 1;
            }
        }
        assert_eq!(settled, 3);

        let status = pool.status();
        assert_eq!(status.total_processed, 3);
        assert_eq!(status.total_failed, 1);
        assert_eq!(status.active_encodes, 0);
    }

    #[tokio::test]
    async fn test_all_fail() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let encoder = Arc::new(MockEncoder::new());
        for tier in three_tiers() {
            encoder.fail_label(&tier.label).await;
        }

        let pool = RenditionPool::new(encoder, three_tiers(), 4);
        let (tx, _rx) = mpsc::unbounded_channel();
        let tasks = pool.run(&ctx, tx).await;

        assert!(tasks.iter().all(|t| t.status == RenditionStatus::Failed));
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let encoder = Arc::new(MockEncoder::new());
        encoder
            .set_encode_delay(std::time::Duration::from_millis(30))
            .await;

        let pool = RenditionPool::new(encoder.clone(), three_tiers(), 1);
        let (tx, _rx) = mpsc::unbounded_channel();
        let tasks = pool.run(&ctx, tx).await;

        assert!(tasks.iter().all(|t| t.is_succeeded()));
        assert_eq!(encoder.max_concurrent_encodes().await, 1);
    }
}
