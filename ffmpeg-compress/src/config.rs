use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Compression quality preset. Each maps to a fixed (bitrate, preset) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    /// Returns `(bitrate, preset)` for libx264.
    pub fn encoder_settings(self) -> (&'static str, &'static str) {
        match self {
            Quality::Low => ("1M", "ultrafast"),
            Quality::Medium => ("2M", "fast"),
            Quality::High => ("4M", "medium"),
        }
    }
}

impl FromStr for Quality {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(anyhow::anyhow!("unknown compression quality: {}", other)),
        }
    }
}

/// Encoder configuration shared by every compression session of a manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    // None = keep source width
    pub width: Option<u32>,
    // None = keep source height
    pub height: Option<u32>,
    pub fps: u32,
    // "2M", "500k", ...
    pub bitrate: String,
    // "ultrafast", "fast", "medium", ...
    pub preset: String,
    /// Parent of every per-session scratch directory.
    pub output_dir: PathBuf,
    /// Encoder binary, resolved through `PATH` when relative.
    pub encoder_path: PathBuf,
    pub encode_timeout_ms: u64,
    /// Upper bound on encoder processes running at once across all sessions.
    pub max_concurrent_encodes: usize,
    /// Quality of the intermediate JPEG images handed to the encoder.
    pub jpeg_quality: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        let (bitrate, preset) = Quality::default().encoder_settings();
        Self {
            width: None,
            height: None,
            fps: 30,
            bitrate: bitrate.to_string(),
            preset: preset.to_string(),
            output_dir: std::env::temp_dir(),
            encoder_path: PathBuf::from("ffmpeg"),
            encode_timeout_ms: 30_000,
            max_concurrent_encodes: 2,
            jpeg_quality: 95,
        }
    }
}

impl CompressionConfig {
    /// Overrides bitrate and preset with the pair `quality` maps to.
    pub fn with_quality(mut self, quality: Quality) -> Self {
        let (bitrate, preset) = quality.encoder_settings();
        self.bitrate = bitrate.to_string();
        self.preset = preset.to_string();
        self
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_millis(self.encode_timeout_ms)
    }

    /// Output size requested from the encoder, only when both sides are set.
    pub fn scale(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.fps > 0, "fps must be positive");
        anyhow::ensure!(
            self.max_concurrent_encodes > 0,
            "max_concurrent_encodes must be positive"
        );
        anyhow::ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "jpeg_quality must be within 1..=100, got {}",
            self.jpeg_quality
        );
        anyhow::ensure!(self.encode_timeout_ms > 0, "encode timeout must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_table() {
        assert_eq!(Quality::Low.encoder_settings(), ("1M", "ultrafast"));
        assert_eq!(Quality::Medium.encoder_settings(), ("2M", "fast"));
        assert_eq!(Quality::High.encoder_settings(), ("4M", "medium"));
    }

    #[test]
    fn test_quality_from_str() {
        assert_eq!("HIGH".parse::<Quality>().unwrap(), Quality::High);
        assert_eq!("low".parse::<Quality>().unwrap(), Quality::Low);
        assert!("ultra".parse::<Quality>().is_err());
    }

    #[test]
    fn test_with_quality_overrides_bitrate_and_preset() {
        let config = CompressionConfig::default().with_quality(Quality::High);
        assert_eq!(config.bitrate, "4M");
        assert_eq!(config.preset, "medium");
        assert_eq!(config.fps, 30);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: CompressionConfig =
            serde_json::from_str(r#"{ "fps": 15, "width": 320, "height": 240 }"#).unwrap();
        assert_eq!(config.fps, 15);
        assert_eq!(config.scale(), Some((320, 240)));
        assert_eq!(config.bitrate, "2M");
        assert_eq!(config.encode_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scale_requires_both_sides() {
        let config = CompressionConfig {
            width: Some(640),
            ..Default::default()
        };
        assert_eq!(config.scale(), None);
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let config = CompressionConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
