//! Run configuration

use crate::error::{Error, Result};
use crate::media::{Category, CategoryTable};
use crate::time::ReferenceZone;
use std::path::{Path, PathBuf};

/// Configuration for one organizing run
#[derive(Debug, Clone)]
pub struct Config {
    /// Tree whose files are organized and then moved to the backup
    pub source_dir: PathBuf,

    /// Archive root for pictures
    pub pictures_dir: PathBuf,

    /// Archive root for videos
    pub videos_dir: PathBuf,

    /// Root under which originals are kept after copying
    pub backup_dir: PathBuf,

    /// Extension to category mapping
    pub categories: CategoryTable,

    /// Zone for year/month folders and backup folder names
    pub time_zone: ReferenceZone,

    /// Dry run mode - report what would happen without touching anything
    pub dry_run: bool,

    /// Verbose output
    pub verbose: bool,
}

impl Config {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        pictures_dir: impl Into<PathBuf>,
        videos_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            pictures_dir: pictures_dir.into(),
            videos_dir: videos_dir.into(),
            backup_dir: backup_dir.into(),
            categories: CategoryTable::default(),
            time_zone: ReferenceZone::default(),
            dry_run: false,
            verbose: false,
        }
    }

    /// Archive root for a category; `None` for unsupported files
    pub fn root_for(&self, category: Category) -> Option<&Path> {
        match category {
            Category::Picture => Some(&self.pictures_dir),
            Category::Video => Some(&self.videos_dir),
            Category::Unsupported => None,
        }
    }

    /// Reject archive or backup roots inside the source tree; the walk
    /// would otherwise pick up files this run just wrote.
    pub fn validate(&self) -> Result<()> {
        let source = std::path::absolute(&self.source_dir)?;
        for inner in [&self.pictures_dir, &self.videos_dir, &self.backup_dir] {
            if std::path::absolute(inner)?.starts_with(&source) {
                return Err(Error::NestedRoots {
                    inner: inner.clone(),
                    source_root: self.source_dir.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_for() {
        let config = Config::new("/src", "/pics", "/vids", "/bak");
        assert_eq!(config.root_for(Category::Picture), Some(Path::new("/pics")));
        assert_eq!(config.root_for(Category::Video), Some(Path::new("/vids")));
        assert_eq!(config.root_for(Category::Unsupported), None);
    }

    #[test]
    fn test_validate_rejects_nested_roots() {
        let config = Config::new("/media/inbox", "/media/pictures", "/media/videos", "/tmp/bak");
        assert!(config.validate().is_ok());

        let nested = Config::new("/media", "/media/pictures", "/archive/videos", "/tmp/bak");
        assert!(matches!(nested.validate(), Err(Error::NestedRoots { .. })));

        let nested_backup = Config::new("/media", "/p", "/v", "/media/.backup");
        assert!(nested_backup.validate().is_err());
    }
}
