//! Bitrate ladder: the quality tiers every upload is encoded into.

use serde::{Deserialize, Serialize};

/// One rung of the bitrate ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityTier {
    /// Tier name, also used as the rendition directory name (e.g. "720p").
    pub label: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Declared bandwidth in bits per second, advertised in the master manifest.
    pub bandwidth: u64,
}

impl QualityTier {
    pub fn new(label: impl Into<String>, width: u32, height: u32, bandwidth: u64) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            bandwidth,
        }
    }

    /// Resolution in `WxH` form.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Video bitrate budget in kbit/s, derived from the declared bandwidth
    /// minus the fixed audio allowance.
    pub fn video_kbps(&self) -> u64 {
        let total_kbps = self.bandwidth / 1000;
        total_kbps.saturating_sub(AUDIO_KBPS).max(MIN_VIDEO_KBPS)
    }
}

/// Audio bitrate reserved inside each tier's bandwidth.
pub const AUDIO_KBPS: u64 = 128;

const MIN_VIDEO_KBPS: u64 = 200;

/// Default ladder: 360p, 480p, 720p, 1080p.
pub fn default_ladder() -> Vec<QualityTier> {
    vec![
        QualityTier::new("360p", 640, 360, 800_000),
        QualityTier::new("480p", 854, 480, 1_400_000),
        QualityTier::new("720p", 1280, 720, 2_800_000),
        QualityTier::new("1080p", 1920, 1080, 5_000_000),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_is_ascending() {
        let ladder = default_ladder();
        assert_eq!(ladder.len(), 4);
        assert!(ladder.windows(2).all(|w| w[0].bandwidth < w[1].bandwidth));
    }

    #[test]
    fn test_resolution_format() {
        let tier = QualityTier::new("480p", 854, 480, 1_400_000);
        assert_eq!(tier.resolution(), "854x480");
    }

    #[test]
    fn test_video_kbps() {
        let tier = QualityTier::new("720p", 1280, 720, 2_800_000);
        assert_eq!(tier.video_kbps(), 2672);

        let tiny = QualityTier::new("tiny", 160, 90, 100_000);
        assert_eq!(tiny.video_kbps(), 200);
    }
}
