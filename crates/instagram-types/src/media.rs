//! Staged media classification

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of a downloaded file, inferred from its extension
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    /// `.jpg`, `.jpeg`, `.png` are images; `.mp4`, `.mov` are videos.
    /// Matching ignores ASCII case. Everything else is `Unknown`.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("jpg" | "jpeg" | "png") => Self::Image,
            Some("mp4" | "mov") => Self::Video,
            _ => Self::Unknown,
        }
    }
}

/// A file written into a scratch workspace by the media fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl StagedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path);
        Self { path, kind }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions() {
        for name in ["a.jpg", "a.jpeg", "a.png", "A.JPG", "b.Png"] {
            assert_eq!(MediaKind::from_path(Path::new(name)), MediaKind::Image, "{}", name);
        }
    }

    #[test]
    fn test_video_extensions() {
        for name in ["a.mp4", "a.mov", "A.MP4"] {
            assert_eq!(MediaKind::from_path(Path::new(name)), MediaKind::Video, "{}", name);
        }
    }

    #[test]
    fn test_unknown_extensions() {
        for name in ["metadata.json", "caption.txt", "archive.json.xz", "noext", "photo.webp"] {
            let kind = MediaKind::from_path(Path::new(name));
            assert_eq!(kind, MediaKind::Unknown, "{}", name);
        }
    }

    #[test]
    fn test_staged_file_infers_kind() {
        let file = StagedFile::new("/tmp/downloads/1/2024-01-01_UTC_1.jpg");
        assert_eq!(file.kind, MediaKind::Image);
        assert_eq!(file.file_name(), Some("2024-01-01_UTC_1.jpg"));
    }
}
