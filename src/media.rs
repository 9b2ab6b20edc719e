//! Media file classification by extension

use std::path::{Path, PathBuf};

/// Destination category for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Still images, filed under the picture archive
    Picture,
    /// Movies, filed under the video archive
    Video,
    /// Anything else; left where it is
    Unsupported,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Picture => "picture",
            Category::Video => "video",
            Category::Unsupported => "unsupported",
        }
    }
}

/// A file discovered by the walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    path: PathBuf,
    extension: String,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        Self { path, extension }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase extension without the dot, empty when the file has none
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

/// Extension table mapping files to a [`Category`]
///
/// The default is the union of the picture and video sets seen in earlier
/// revisions of the tool (one carried png/mov/mpeg, another mkv). Pass
/// explicit sets to [`CategoryTable::new`] to narrow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    pictures: Vec<String>,
    videos: Vec<String>,
}

pub const DEFAULT_PICTURE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mpg", "mpeg", "mov", "mkv"];

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new(DEFAULT_PICTURE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS)
    }
}

impl CategoryTable {
    /// Build a table from picture and video extension lists.
    ///
    /// Extensions are lowercased and a leading dot is dropped, so `".JPG"`
    /// and `"jpg"` are the same entry.
    pub fn new<P, V>(pictures: P, videos: V) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        Self {
            pictures: normalize(pictures),
            videos: normalize(videos),
        }
    }

    /// Classify an extension; matching ignores case.
    /// An extension present in both sets is a picture.
    pub fn classify(&self, extension: &str) -> Category {
        let ext = extension.trim_start_matches('.').to_lowercase();
        if ext.is_empty() {
            Category::Unsupported
        } else if self.pictures.iter().any(|e| e == &ext) {
            Category::Picture
        } else if self.videos.iter().any(|e| e == &ext) {
            Category::Video
        } else {
            Category::Unsupported
        }
    }

    pub fn picture_extensions(&self) -> &[String] {
        &self.pictures
    }

    pub fn video_extensions(&self) -> &[String] {
        &self.videos
    }
}

fn normalize<I>(extensions: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for ext in extensions {
        let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}
