//! Trending score recomputation.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, Engagement, VideoCatalog};
use crate::metrics;

/// Longest accepted sliding window: ten years.
pub const MAX_WINDOW_HOURS: u64 = 24 * 365 * 10;

/// Weights applied to each engagement figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendingWeights {
    #[serde(default = "default_views_weight")]
    pub views: f64,
    #[serde(default = "default_likes_weight")]
    pub likes: f64,
    #[serde(default = "default_comments_weight")]
    pub comments: f64,
}

fn default_views_weight() -> f64 {
    0.5
}

fn default_likes_weight() -> f64 {
    0.3
}

fn default_comments_weight() -> f64 {
    0.2
}

impl Default for TrendingWeights {
    fn default() -> Self {
        Self {
            views: default_views_weight(),
            likes: default_likes_weight(),
            comments: default_comments_weight(),
        }
    }
}

/// Trending scorer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Sliding window for views and comments.
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,
    #[serde(default)]
    pub weights: TrendingWeights,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_window_hours() -> u64 {
    24
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            window_hours: default_window_hours(),
            weights: TrendingWeights::default(),
        }
    }
}

/// Periodically writes `trending_score` for every record.
pub struct TrendingScorer {
    config: TrendingConfig,
    catalog: Arc<dyn VideoCatalog>,
}

impl TrendingScorer {
    pub fn new(config: TrendingConfig, catalog: Arc<dyn VideoCatalog>) -> Self {
        Self { config, catalog }
    }

    pub fn score(&self, engagement: &Engagement) -> f64 {
        let w = &self.config.weights;
        engagement.recent_views as f64 * w.views
            + engagement.likes as f64 * w.likes
            + engagement.recent_comments as f64 * w.comments
    }

    /// Start of the scoring window ending at `now`.
    fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, CatalogError> {
        i64::try_from(self.config.window_hours)
            .ok()
            .and_then(ChronoDuration::try_hours)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                CatalogError::Internal(format!(
                    "trending window of {} hours is out of range",
                    self.config.window_hours
                ))
            })
    }

    /// Recomputes every score as of `now`. Returns the number of records scored.
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<usize, CatalogError> {
        let since = self.window_start(now)?;
        let ids = self.catalog.ids()?;

        let mut scored = 0;
        for id in &ids {
            match self.catalog.engagement_since(id, since) {
                Ok(engagement) => {
                    self.catalog.set_trending_score(id, self.score(&engagement))?;
                    scored += 1;
                }
                // Deleted between listing and scoring.
                Err(CatalogError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        metrics::TRENDING_RUNS.inc();
        metrics::CATALOG_VIDEOS.set(ids.len() as i64);
        debug!(scored, "Trending scores updated");
        Ok(scored)
    }

    /// Runs on the configured interval until shutdown.
    pub fn spawn(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Trending scorer started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Trending scorer received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = self.run_once(Utc::now()) {
                            warn!(error = %e, "Trending pass failed");
                        }
                    }
                }
            }
            info!("Trending scorer stopped");
        })
    }
}
