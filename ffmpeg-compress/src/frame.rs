use std::fmt::{Display, Formatter};
use std::path::Path;

use anyhow::Context;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgbLayout {
    Rgb,
    Rgba,
}

impl RgbLayout {
    pub fn channels(self) -> usize {
        match self {
            RgbLayout::Rgb => 3,
            RgbLayout::Rgba => 4,
        }
    }
}

/// Tightly packed RGB or RGBA frame queued for compression.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub layout: RgbLayout,
    pub data: Bytes,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, layout: RgbLayout, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            layout,
            data: data.into(),
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.channels()
    }

    /// Writes the frame as a baseline JPEG. Alpha is dropped.
    pub fn write_jpeg(&self, path: &Path, quality: u8) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.data.len() == self.expected_len(),
            "frame buffer holds {} bytes, {}x{} {:?} needs {}",
            self.data.len(),
            self.width,
            self.height,
            self.layout,
            self.expected_len()
        );
        let width = u16::try_from(self.width).context("frame too wide for jpeg")?;
        let height = u16::try_from(self.height).context("frame too tall for jpeg")?;
        let color_type = match self.layout {
            RgbLayout::Rgb => jpeg_encoder::ColorType::Rgb,
            RgbLayout::Rgba => jpeg_encoder::ColorType::Rgba,
        };
        let encoder = jpeg_encoder::Encoder::new_file(path, quality)
            .with_context(|| format!("failed to create {}", path.display()))?;
        encoder
            .encode(&self.data, width, height, color_type)
            .with_context(|| format!("failed to encode {}", path.display()))?;
        Ok(())
    }
}

impl Display for RgbFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "RgbFrame {{ {}x{} {:?}, data: {} }}",
            self.width,
            self.height,
            self.layout,
            self.data.len()
        )
    }
}

/// Returns the shared dimensions of a batch; every frame must match the first.
pub fn batch_dimensions(frames: &[RgbFrame]) -> anyhow::Result<(u32, u32)> {
    let first = frames
        .first()
        .ok_or_else(|| anyhow::anyhow!("no frames provided"))?;
    if let Some(other) = frames
        .iter()
        .find(|f| f.width != first.width || f.height != first.height)
    {
        anyhow::bail!(
            "mixed frame sizes in batch: {}x{} and {}x{}",
            first.width,
            first.height,
            other.width,
            other.height
        );
    }
    if first.width == 0 || first.height == 0 {
        anyhow::bail!("invalid frame size {}x{}", first.width, first.height);
    }
    Ok((first.width, first.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, layout: RgbLayout) -> RgbFrame {
        let len = width as usize * height as usize * layout.channels();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        RgbFrame::new(width, height, layout, data)
    }

    #[test]
    fn test_write_jpeg_rgb_and_rgba() {
        let dir = tempfile::tempdir().unwrap();
        for layout in [RgbLayout::Rgb, RgbLayout::Rgba] {
            let path = dir.path().join(format!("{:?}.jpg", layout));
            gradient(16, 8, layout).write_jpeg(&path, 90).unwrap();
            let bytes = std::fs::read(&path).unwrap();
            assert_eq!(&bytes[..2], &[0xFF, 0xD8], "missing SOI marker");
        }
    }

    #[test]
    fn test_write_jpeg_rejects_short_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let frame = RgbFrame::new(4, 4, RgbLayout::Rgb, vec![0u8; 10]);
        assert!(frame.write_jpeg(&dir.path().join("short.jpg"), 90).is_err());
    }

    #[test]
    fn test_batch_dimensions() {
        let frames = vec![gradient(8, 4, RgbLayout::Rgb), gradient(8, 4, RgbLayout::Rgb)];
        assert_eq!(batch_dimensions(&frames).unwrap(), (8, 4));

        let mixed = vec![gradient(8, 4, RgbLayout::Rgb), gradient(4, 4, RgbLayout::Rgb)];
        assert!(batch_dimensions(&mixed).is_err());
        assert!(batch_dimensions(&[]).is_err());
    }
}
