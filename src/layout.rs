//! Destination and backup path composition
//!
//! Everything here is textual; nothing touches the file system except
//! through the `exists` probe handed to [`resolve_filename_conflict`].

use crate::error::{Error, Result};
use crate::time::ReferenceZone;
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// Year and month folder for an instant, e.g. `2022/01-January`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizedDir {
    year: i32,
    month: u32,
    month_name: String,
}

impl OrganizedDir {
    fn month_folder(&self) -> String {
        format!("{:02}-{}", self.month, self.month_name)
    }
}

impl fmt::Display for OrganizedDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.month_folder())
    }
}

/// Year/month folder for `instant`, with calendar fields taken in `zone`
pub fn organized_dir(instant: DateTime<Utc>, zone: &ReferenceZone) -> OrganizedDir {
    let civil = zone.to_civil(instant);
    OrganizedDir {
        year: civil.year(),
        month: civil.month(),
        month_name: civil.format("%B").to_string(),
    }
}

/// `{category_root}/{year}/{MM-Month}/{file_name}`
pub fn destination(category_root: &Path, organized: &OrganizedDir, file_name: &OsStr) -> PathBuf {
    let mut dest = category_root.to_path_buf();
    dest.push(organized.year.to_string());
    dest.push(organized.month_folder());
    dest.push(file_name);
    dest
}

/// `{backup_root}/{run date}/{run time}/{relative}`
///
/// `now` is the moment of the move, not the file's capture time. `relative`
/// is the file's path below the source root, which keeps same-named files
/// from different source folders apart.
pub fn backup_path(
    backup_root: &Path,
    now: DateTime<Utc>,
    zone: &ReferenceZone,
    locale: &str,
    relative: &Path,
) -> PathBuf {
    let civil = zone.to_civil(now);
    let mut path = backup_root.to_path_buf();
    path.push(civil.format("%Y-%m-%d").to_string());
    path.push(short_time(&civil, locale));
    path.push(relative);
    path
}

/// Locale short time, e.g. `3:04 PM` for en-US and `15:04` for de-DE
pub fn short_time(civil: &NaiveDateTime, locale: &str) -> String {
    let text = if uses_twelve_hour_clock(locale) {
        civil.format("%-I:%M %p").to_string()
    } else {
        civil.format("%H:%M").to_string()
    };
    sanitize_component(&text)
}

/// Regions whose English locale writes times on a 12-hour clock
const TWELVE_HOUR_ENGLISH_REGIONS: &[&str] = &["US", "CA", "AU", "NZ", "IN", "PH", "PK", "EG"];

/// Languages that default to a 12-hour clock regardless of region
const TWELVE_HOUR_LANGUAGES: &[&str] = &["ko", "hi", "bn", "ur"];

fn uses_twelve_hour_clock(locale: &str) -> bool {
    // "en-US", "en_US.UTF-8", "en_US@posix"
    let locale = locale.split(['.', '@']).next().unwrap_or_default();
    let mut parts = locale.split(['-', '_']);
    let language = parts.next().unwrap_or_default().to_lowercase();
    let region = parts
        .find(|p| p.len() == 2 || p.len() == 3)
        .map(|p| p.to_uppercase());

    match language.as_str() {
        "en" => match region.as_deref() {
            None => true,
            Some(region) => TWELVE_HOUR_ENGLISH_REGIONS.contains(&region),
        },
        lang => TWELVE_HOUR_LANGUAGES.contains(&lang),
    }
}

/// Folder names must survive on every platform the archive may be read from
fn sanitize_component(s: &str) -> String {
    if cfg!(windows) {
        s.chars()
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '.',
                c => c,
            })
            .collect()
    } else {
        s.replace('/', ".")
    }
}

/// Resolve filename conflicts by adding a numeric suffix
pub fn resolve_filename_conflict(mut path: PathBuf, exists: impl Fn(&Path) -> bool) -> Result<PathBuf> {
    if !exists(&path) {
        return Ok(path);
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidPath(path.clone()))?
        .to_string();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let parent = path.parent().map(|p| p.to_path_buf()).unwrap_or_default();

    for i in 1..10000 {
        let new_name = format!("{}_{}{}", stem, i, extension);
        path = parent.join(new_name);
        if !exists(&path) {
            return Ok(path);
        }
    }

    Err(Error::InvalidPath(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn utc() -> ReferenceZone {
        ReferenceZone::parse("UTC").unwrap()
    }

    #[test]
    fn test_organized_dir_format() {
        let instant = Utc.with_ymd_and_hms(2022, 1, 1, 3, 0, 0).unwrap();
        let dir = organized_dir(instant, &utc());
        assert_eq!(dir.to_string(), "2022/01-January");

        let instant = Utc.with_ymd_and_hms(2023, 11, 30, 23, 59, 59).unwrap();
        assert_eq!(organized_dir(instant, &utc()).to_string(), "2023/11-November");
    }

    #[test]
    fn test_organized_dir_stable_within_month() {
        let first = Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2023, 4, 30, 23, 59, 59).unwrap();
        assert_eq!(organized_dir(first, &utc()), organized_dir(last, &utc()));
    }

    #[test]
    fn test_organized_dir_uses_zone() {
        let chicago = ReferenceZone::parse("America/Chicago").unwrap();
        let instant = Utc.with_ymd_and_hms(2022, 1, 1, 3, 0, 0).unwrap();
        assert_eq!(organized_dir(instant, &chicago).to_string(), "2021/12-December");
    }

    #[test]
    fn test_destination() {
        let instant = Utc.with_ymd_and_hms(2023, 4, 15, 16, 54, 13).unwrap();
        let dir = organized_dir(instant, &utc());
        let dest = destination(Path::new("/videos"), &dir, OsStr::new("vid.mp4"));
        assert_eq!(dest, Path::new("/videos").join("2023").join("04-April").join("vid.mp4"));
    }

    #[test]
    fn test_backup_path() {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 15, 4, 5).unwrap();
        let path = backup_path(
            Path::new("/backup"),
            now,
            &utc(),
            "en-US",
            Path::new("trip/pic.jpg"),
        );
        assert_eq!(
            path,
            Path::new("/backup")
                .join("2024-05-06")
                .join(sanitize_component("3:04 PM"))
                .join("trip/pic.jpg")
        );
    }

    #[test]
    fn test_short_time_by_locale() {
        let civil = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(9, 7, 0)
            .unwrap();
        assert_eq!(short_time(&civil, "en-US"), sanitize_component("9:07 AM"));
        assert_eq!(short_time(&civil, "en_US.UTF-8"), sanitize_component("9:07 AM"));
        assert_eq!(short_time(&civil, "en-GB"), sanitize_component("09:07"));
        assert_eq!(short_time(&civil, "de-DE"), sanitize_component("09:07"));
        assert_eq!(short_time(&civil, "C"), sanitize_component("09:07"));
    }

    #[test]
    fn test_resolve_filename_conflict() {
        let taken = [PathBuf::from("/b/pic.jpg"), PathBuf::from("/b/pic_1.jpg")];
        let exists = |p: &Path| taken.iter().any(|t| t == p);

        let free = resolve_filename_conflict(PathBuf::from("/b/other.jpg"), exists).unwrap();
        assert_eq!(free, PathBuf::from("/b/other.jpg"));

        let resolved = resolve_filename_conflict(PathBuf::from("/b/pic.jpg"), exists).unwrap();
        assert_eq!(resolved, PathBuf::from("/b/pic_2.jpg"));
    }
}
