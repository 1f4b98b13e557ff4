//! Master manifest composition.
//!
//! Only renditions that succeeded and whose sub-manifest is on disk are
//! listed, ascending by bandwidth. The file is written to a temp name and
//! renamed into place so readers never see a partial playlist.

use serde::Serialize;
use std::io;
use tracing::{debug, warn};

use super::types::RenditionTask;
use crate::layout::JobLayout;

/// One `#EXT-X-STREAM-INF` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub label: String,
    pub bandwidth: u64,
    /// `WxH`.
    pub resolution: String,
    /// Sub-manifest path relative to the master manifest.
    pub uri: String,
}

/// Renders the master playlist text.
pub fn render_master(entries: &[ManifestEntry]) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for entry in entries {
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}\n",
            entry.bandwidth, entry.resolution, entry.uri
        ));
    }
    out
}

/// Builds and writes a job's master manifest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestComposer;

impl ManifestComposer {
    pub fn new() -> Self {
        Self
    }

    /// Entries for the tasks that can be referenced.
    pub async fn entries(&self, layout: &JobLayout, tasks: &[RenditionTask]) -> Vec<ManifestEntry> {
        let mut entries = Vec::new();
        for task in tasks.iter().filter(|t| t.is_succeeded()) {
            let playlist = layout.playlist_path(task.label());
            match tokio::fs::metadata(&playlist).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => entries.push(ManifestEntry {
                    label: task.label().to_string(),
                    bandwidth: task.tier.bandwidth,
                    resolution: task.tier.resolution(),
                    uri: layout.playlist_reference(task.label()),
                }),
                _ => {
                    warn!(
                        job_id = %layout.job_id(),
                        label = %task.label(),
                        "Sub-manifest missing, leaving rendition out of master manifest"
                    );
                }
            }
        }
        entries.sort_by(|a, b| a.bandwidth.cmp(&b.bandwidth).then_with(|| a.label.cmp(&b.label)));
        entries
    }

    /// Writes `master.m3u8` and returns the entries it lists.
    ///
    /// Nothing is written when no entry qualifies.
    pub async fn compose(
        &self,
        layout: &JobLayout,
        tasks: &[RenditionTask],
    ) -> io::Result<Vec<ManifestEntry>> {
        let entries = self.entries(layout, tasks).await;
        if entries.is_empty() {
            return Ok(entries);
        }

        let target = layout.master_manifest_path();
        let tmp = target.with_extension("m3u8.tmp");
        tokio::fs::write(&tmp, render_master(&entries)).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            if let Err(rm) = tokio::fs::remove_file(&tmp).await {
                debug!(path = %tmp.display(), error = %rm, "Failed to remove temporary manifest");
            }
            return Err(e);
        }

        debug!(job_id = %layout.job_id(), entries = entries.len(), "Master manifest written");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::QualityTier;
    use crate::layout::StorageLayout;
    use crate::encoder::RenditionOutput;
    use tempfile::TempDir;

    async fn succeeded(layout: &JobLayout, tier: QualityTier) -> RenditionTask {
        let dir = layout.rendition_dir(&tier.label);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let playlist = layout.playlist_path(&tier.label);
        tokio::fs::write(&playlist, "#EXTM3U\n000.ts\n").await.unwrap();
        let mut task = RenditionTask::new(tier.clone(), dir);
        task.succeed(RenditionOutput {
            label: tier.label.clone(),
            playlist_path: playlist,
            segment_count: 1,
            output_size_bytes: 16,
            duration_ms: 1,
        });
        task
    }

    #[test]
    fn test_render_master() {
        let text = render_master(&[
            ManifestEntry {
                label: "360p".into(),
                bandwidth: 800_000,
                resolution: "640x360".into(),
                uri: "360p/index.m3u8".into(),
            },
            ManifestEntry {
                label: "720p".into(),
                bandwidth: 2_800_000,
                resolution: "1280x720".into(),
                uri: "720p/index.m3u8".into(),
            },
        ]);
        assert_eq!(
            text,
            "#EXTM3U\n#EXT-X-VERSION:3\n\
             #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n360p/index.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720\n720p/index.m3u8\n"
        );
    }

    #[tokio::test]
    async fn test_compose_sorts_and_skips_failed() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path()).allocate_job("job").await.unwrap();

        let high = succeeded(&layout, QualityTier::new("720p", 1280, 720, 2_800_000)).await;
        let low = succeeded(&layout, QualityTier::new("360p", 640, 360, 800_000)).await;
        let mut failed = RenditionTask::new(
            QualityTier::new("1080p", 1920, 1080, 5_000_000),
            layout.rendition_dir("1080p"),
        );
        failed.fail("exit code 1");

        let entries = ManifestComposer::new()
            .compose(&layout, &[high, failed, low])
            .await
            .unwrap();

        let labels: Vec<_> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["360p", "720p"]);

        let text = std::fs::read_to_string(layout.master_manifest_path()).unwrap();
        assert_eq!(text.matches("#EXT-X-STREAM-INF").count(), 2);
        assert!(!text.contains("1080p"));
        assert!(!layout.master_manifest_path().with_extension("m3u8.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_sub_manifest_is_left_out() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path()).allocate_job("job").await.unwrap();

        let task = succeeded(&layout, QualityTier::new("360p", 640, 360, 800_000)).await;
        std::fs::remove_file(layout.playlist_path("360p")).unwrap();

        let entries = ManifestComposer::new().compose(&layout, &[task]).await.unwrap();
        assert!(entries.is_empty());
        assert!(!layout.master_manifest_path().exists());
    }
}
