//! Pixel encoding conversions into the buffers the sink understands.
//!
//! Every conversion is frame-scoped: a malformed frame yields `None` (or an
//! empty buffer for [`to_i420`]) plus a warning, never an error for the batch.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use crate::media::types::{CpuImage, ImagePlane, PixelFormat};

/// Buffer layout of a converted color image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    Rgb,
    Rgba,
    /// Planar Y, U, V 4:2:0, limited range.
    I420,
    /// Y plane followed by interleaved UV, full range.
    Nv12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDatatype {
    U8,
    U16,
    F32,
}

impl ChannelDatatype {
    pub fn size(self) -> usize {
        match self {
            ChannelDatatype::U8 => 1,
            ChannelDatatype::U16 => 2,
            ChannelDatatype::F32 => 4,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConvertedImage {
    pub layout: PixelLayout,
    pub data: Bytes,
}

/// Swaps channels 0 and 2 of every 4-byte pixel. A trailing partial pixel is
/// copied unchanged.
pub fn bgra_to_rgba(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for px in out.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    out
}

/// Maps every `[A, R, G, B]` pixel to `[R, G, B, A]`. A trailing partial pixel
/// is copied unchanged.
pub fn argb_to_rgba(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for px in out.chunks_exact_mut(4) {
        px.rotate_left(1);
    }
    out
}

/// Tightly packed pixels of plane 0, dropping any row padding.
pub fn packed_pixels(image: &CpuImage, bytes_per_pixel: usize) -> Option<Bytes> {
    let plane = image.planes.first()?;
    let width = image.width as usize;
    let height = image.height as usize;
    let row_len = width * bytes_per_pixel;
    let row_stride = match plane.row_stride as usize {
        0 => row_len,
        stride => stride,
    };
    if row_stride < row_len {
        return None;
    }
    if height == 0 {
        return Some(Bytes::new());
    }
    let needed = row_stride * (height - 1) + row_len;
    if plane.data.len() < needed {
        return None;
    }
    if row_stride == row_len {
        return Some(plane.data.slice(..row_len * height));
    }

    let mut out = BytesMut::with_capacity(row_len * height);
    for row in 0..height {
        let start = row * row_stride;
        out.extend_from_slice(&plane.data[start..start + row_len]);
    }
    Some(out.freeze())
}

/// Samples a `width` x `height` grid from a strided plane. With `pad_one`, the
/// byte just past the end of the buffer reads as zero.
fn sample_plane(plane: &ImagePlane, width: usize, height: usize, pad_one: bool) -> Option<Vec<u8>> {
    let pixel_stride = (plane.pixel_stride as usize).max(1);
    let row_stride = match plane.row_stride as usize {
        0 => width * pixel_stride,
        stride => stride,
    };
    let data = &plane.data;
    let mut out = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let idx = row * row_stride + col * pixel_stride;
            match data.get(idx) {
                Some(&b) => out.push(b),
                None if pad_one && idx == data.len() => out.push(0),
                None => return None,
            }
        }
    }
    Some(out)
}

/// Converts a three-plane YUV 4:2:0 image into I420 (Y, then U, then V).
///
/// The chroma planes of YUV_420_888 images are commonly one byte short of
/// their last row; that byte reads as zero.
pub fn to_i420(image: &CpuImage) -> Vec<u8> {
    if image.planes.len() != 3 {
        log::warn!(
            "expected 3 planes for YUV 4:2:0 image, got {}",
            image.planes.len()
        );
        return Vec::new();
    }
    let width = image.width as usize;
    let height = image.height as usize;
    let (chroma_w, chroma_h) = (width / 2, height / 2);

    let planes = (
        sample_plane(&image.planes[0], width, height, false),
        sample_plane(&image.planes[1], chroma_w, chroma_h, true),
        sample_plane(&image.planes[2], chroma_w, chroma_h, true),
    );
    match planes {
        (Some(y), Some(u), Some(v)) => {
            let mut out = y;
            out.extend_from_slice(&u);
            out.extend_from_slice(&v);
            out
        }
        _ => {
            log::warn!("YUV planes too short for {}x{} image", width, height);
            Vec::new()
        }
    }
}

/// Layout a color format converts to, or `None` for non-color formats.
pub fn color_layout(format: PixelFormat) -> Option<PixelLayout> {
    match format {
        PixelFormat::Rgb24 => Some(PixelLayout::Rgb),
        PixelFormat::Rgba32 | PixelFormat::Bgra32 | PixelFormat::Argb32 => Some(PixelLayout::Rgba),
        PixelFormat::AndroidYuv420 => Some(PixelLayout::I420),
        PixelFormat::IosYpCbCr420BiPlanarFullRange => Some(PixelLayout::Nv12),
        PixelFormat::DepthFloat32 | PixelFormat::DepthUint16 | PixelFormat::Unknown => None,
    }
}

/// Converts one color image. `None` means the frame must be skipped.
pub fn convert_color(image: &CpuImage) -> Option<ConvertedImage> {
    let Some(layout) = color_layout(image.format) else {
        log::warn!("unsupported color format: {}", image.format.name());
        return None;
    };
    let data = match image.format {
        PixelFormat::Rgb24 => packed_pixels(image, 3),
        PixelFormat::Rgba32 => packed_pixels(image, 4),
        PixelFormat::Bgra32 => packed_pixels(image, 4).map(|p| Bytes::from(bgra_to_rgba(&p))),
        PixelFormat::Argb32 => packed_pixels(image, 4).map(|p| Bytes::from(argb_to_rgba(&p))),
        PixelFormat::AndroidYuv420 => Some(to_i420(image))
            .filter(|buf| !buf.is_empty())
            .map(Bytes::from),
        PixelFormat::IosYpCbCr420BiPlanarFullRange => concat_planes(image),
        PixelFormat::DepthFloat32 | PixelFormat::DepthUint16 | PixelFormat::Unknown => None,
    };
    match data {
        Some(data) => Some(ConvertedImage { layout, data }),
        None => {
            log::warn!("skipping malformed color frame: {}", image);
            None
        }
    }
}

fn concat_planes(image: &CpuImage) -> Option<Bytes> {
    let needed = image.width as usize * image.height as usize * 3 / 2;
    let total: usize = image.planes.iter().map(|p| p.data.len()).sum();
    if image.planes.is_empty() || total < needed {
        return None;
    }
    let mut out = BytesMut::with_capacity(total);
    for plane in &image.planes {
        out.extend_from_slice(&plane.data);
    }
    Some(out.freeze())
}

pub fn depth_datatype(format: PixelFormat) -> Option<ChannelDatatype> {
    match format {
        PixelFormat::DepthFloat32 => Some(ChannelDatatype::F32),
        PixelFormat::DepthUint16 => Some(ChannelDatatype::U16),
        PixelFormat::Rgb24
        | PixelFormat::Rgba32
        | PixelFormat::Bgra32
        | PixelFormat::Argb32
        | PixelFormat::AndroidYuv420
        | PixelFormat::IosYpCbCr420BiPlanarFullRange
        | PixelFormat::Unknown => None,
    }
}

/// Plane 0 of a depth image, checked against its declared geometry.
pub fn convert_depth(image: &CpuImage) -> Option<(ChannelDatatype, Bytes)> {
    let Some(datatype) = depth_datatype(image.format) else {
        log::warn!("unsupported depth format: {}", image.format.name());
        return None;
    };
    match packed_pixels(image, datatype.size()) {
        Some(data) => Some((datatype, data)),
        None => {
            log::warn!("skipping malformed depth frame: {}", image);
            None
        }
    }
}

#[cfg(test)]
#[path = "convert_test.rs"]
mod convert_test;
