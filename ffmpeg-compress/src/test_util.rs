//! Shell scripts standing in for the encoder binary.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::frame::{RgbFrame, RgbLayout};

/// Writes the encoded stream to the last argument (the output file).
pub const WRITE_OUTPUT: &str = r#"for last; do :; done
printf 'fake-h264-stream' > "$last""#;

/// Exits non-zero with a message on stderr.
pub const FAIL: &str = r#"echo "Unknown encoder 'libx264'" >&2
exit 1"#;

/// Succeeds without producing the output file.
pub const NO_OUTPUT: &str = "exit 0";

/// Never finishes within any test timeout.
pub const HANG: &str = "exec sleep 30";

/// Installs an executable script answering `-version` and running `body` otherwise.
pub fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ffmpeg");
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then\n  echo 'ffmpeg version fake-1.0'\n  exit 0\nfi\n{}\n",
        body
    );
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

pub fn rgb_frames(count: usize, width: u32, height: u32) -> Vec<RgbFrame> {
    (0..count)
        .map(|i| {
            let len = width as usize * height as usize * 3;
            let data: Vec<u8> = (0..len).map(|p| ((p + i * 7) % 256) as u8).collect();
            RgbFrame::new(width, height, RgbLayout::Rgb, Bytes::from(data))
        })
        .collect()
}

/// Number of regular files left in `dir`; 0 when the directory is gone.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().is_file())
                .count()
        })
        .unwrap_or(0)
}
