use std::fmt::{Display, Formatter};

use crate::media::types::{Device, FrameType, Session};

/// Hierarchical sink key, e.g.
/// `{session}_{id}/{model}_{name}_{uid}/color_frame/640x480`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityPath(String);

impl EntityPath {
    /// Root path of one frame kind for one device.
    pub fn root(session: &Session, device: &Device, frame_type: FrameType) -> Self {
        Self(format!(
            "{}/{}/{}",
            escape_part(&format!("{}_{}", session.name, session.id)),
            escape_part(&format!("{}_{}_{}", device.model, device.name, device.uid)),
            frame_type.as_str()
        ))
    }

    /// Appends one escaped path segment.
    pub fn child(&self, part: impl AsRef<str>) -> Self {
        Self(format!("{}/{}", self.0, escape_part(part.as_ref())))
    }

    pub fn resolution(&self, width: u32, height: u32) -> Self {
        self.child(format!("{}x{}", width, height))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.write_str(&self.0)
    }
}

/// Backslash-escapes characters that would split or blur a path segment.
pub fn escape_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        if c == '/' || c == '\\' || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (Session, Device) {
        let device = Device {
            model: "Pixel 8".to_string(),
            name: "lab".to_string(),
            uid: "abc/123".to_string(),
        };
        let session = Session {
            id: "s1".to_string(),
            name: "demo".to_string(),
            devices: vec![device.clone()],
        };
        (session, device)
    }

    #[test]
    fn test_root_path() {
        let (session, device) = fixtures();
        let path = EntityPath::root(&session, &device, FrameType::Color);
        assert_eq!(path.as_str(), r"demo_s1/Pixel\ 8_lab_abc\/123/color_frame");
    }

    #[test]
    fn test_child_paths_are_deterministic() {
        let (session, device) = fixtures();
        let a = EntityPath::root(&session, &device, FrameType::Depth)
            .resolution(256, 192)
            .child("smoothed");
        let b = EntityPath::root(&session, &device, FrameType::Depth)
            .resolution(256, 192)
            .child("smoothed");
        assert_eq!(a, b);
        assert!(a.as_str().ends_with("/depth_frame/256x192/smoothed"));
    }

    #[test]
    fn test_escape_part() {
        assert_eq!(escape_part("a b/c\\d"), r"a\ b\/c\\d");
        assert_eq!(escape_part("plain_1"), "plain_1");
    }
}
