use std::path::{Path, PathBuf};

use anyhow::Context;
use ffmpeg_compress::{CompressionConfig, Quality};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub enable_compression: bool,
    /// Overrides `compression.bitrate` and `compression.preset` when set.
    pub compression_quality: Option<Quality>,
    pub compression: CompressionConfig,
    pub journal_path: PathBuf,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enable_compression: false,
            compression_quality: None,
            compression: CompressionConfig::default(),
            journal_path: PathBuf::from("recording.jsonl"),
        }
    }
}

impl StreamConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn compression_config(&self) -> CompressionConfig {
        match self.compression_quality {
            Some(quality) => self.compression.clone().with_quality(quality),
            None => self.compression.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: StreamConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StreamConfig::default());
        assert!(!config.enable_compression);
        assert_eq!(config.compression_config().bitrate, "2M");
    }

    #[test]
    fn test_quality_overrides_bitrate_and_preset() {
        let config: StreamConfig = serde_json::from_str(
            r#"{
                "enable_compression": true,
                "compression_quality": "low",
                "compression": { "bitrate": "8M", "fps": 15 }
            }"#,
        )
        .unwrap();
        let compression = config.compression_config();
        assert_eq!(compression.bitrate, "1M");
        assert_eq!(compression.preset, "ultrafast");
        assert_eq!(compression.fps, 15);
    }

    #[test]
    fn test_explicit_bitrate_kept_without_quality() {
        let config: StreamConfig =
            serde_json::from_str(r#"{ "compression": { "bitrate": "8M" } }"#).unwrap();
        assert_eq!(config.compression_config().bitrate, "8M");
    }

    #[test]
    fn test_load_reports_missing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let err = StreamConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read config"));

        let file = dir.path().join("stream.json");
        std::fs::write(&file, r#"{ "journal_path": "out.jsonl" }"#)?;
        assert_eq!(StreamConfig::load(&file)?.journal_path, PathBuf::from("out.jsonl"));
        Ok(())
    }
}
