use chrono::{DateTime, TimeZone, Utc};
use here_to_there::layout::backup_path;
use here_to_there::{
    Clock, Config, Error, Event, FileSystem, OsFileSystem, Organizer, ProcessingStatus, ReferenceZone,
};
use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::{TempDir, tempdir};

const QT_EPOCH_OFFSET: i64 = 2_082_844_800;
const LOCALE: &str = "de-DE";

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

struct Roots {
    _dir: TempDir,
    source: PathBuf,
    pictures: PathBuf,
    videos: PathBuf,
    backup: PathBuf,
}

impl Roots {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let roots = Self {
            source: dir.path().join("inbox"),
            pictures: dir.path().join("pictures"),
            videos: dir.path().join("videos"),
            backup: dir.path().join("backup"),
            _dir: dir,
        };
        fs::create_dir_all(&roots.source).unwrap();
        roots
    }

    fn config(&self) -> Config {
        let mut config = Config::new(&self.source, &self.pictures, &self.videos, &self.backup);
        config.time_zone = utc();
        config
    }

    fn add(&self, relative: &str, contents: &[u8], modified: DateTime<Utc>) -> PathBuf {
        let path = self.source.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        set_mtime(&path, modified);
        path
    }

    fn backup_of(&self, relative: &str) -> PathBuf {
        backup_path(&self.backup, run_time(), &utc(), LOCALE, Path::new(relative))
    }
}

fn utc() -> ReferenceZone {
    ReferenceZone::parse("UTC").unwrap()
}

fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 15, 4, 5).unwrap()
}

fn set_mtime(path: &Path, time: DateTime<Utc>) {
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(time.into())).unwrap();
}

fn mtime(path: &Path) -> DateTime<Utc> {
    fs::metadata(path).unwrap().modified().unwrap().into()
}

fn organizer(config: Config) -> Organizer {
    Organizer::new(config)
        .with_clock(FixedClock(run_time()))
        .with_locale(LOCALE)
}

fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// Smallest MP4 carrying a movie header creation time
fn mp4_created_at(created: DateTime<Utc>) -> Vec<u8> {
    let seconds = (created.timestamp() + QT_EPOCH_OFFSET) as u32;
    let mut mvhd = vec![0u8; 4];
    mvhd.extend_from_slice(&seconds.to_be_bytes());
    mvhd.extend_from_slice(&seconds.to_be_bytes());
    mvhd.extend_from_slice(&600u32.to_be_bytes());
    mvhd.resize(100, 0);

    let mut out = atom(b"ftyp", b"isom\0\0\x02\0isomiso2mp41");
    out.extend(atom(b"moov", &atom(b"mvhd", &mvhd)));
    out.extend(atom(b"mdat", &[0u8; 16]));
    out
}

/// Disk-backed file system whose first `set_modified` calls fail
struct StampFailsFirst {
    failures: Cell<usize>,
}

impl FileSystem for StampFailsFirst {
    fn exists(&self, path: &Path) -> bool {
        OsFileSystem.exists(path)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        OsFileSystem.modified(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        OsFileSystem.create_dir_all(path)
    }

    fn copy_new(&self, source: &Path, dest: &Path) -> io::Result<u64> {
        OsFileSystem.copy_new(source, dest)
    }

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        OsFileSystem.set_modified(path, time)
    }

    fn move_file(&self, source: &Path, dest: &Path) -> io::Result<()> {
        OsFileSystem.move_file(source, dest)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        OsFileSystem.remove_file(path)
    }
}

#[test]
fn picture_without_metadata_is_filed_by_modified_time() {
    let roots = Roots::new();
    let taken = Utc.with_ymd_and_hms(2022, 1, 1, 3, 0, 0).unwrap();
    let source = roots.add("pic.jpg", b"not really a jpeg", taken);
    let mut events = Vec::new();

    let reports = organizer(roots.config()).run(&mut events).unwrap();

    let dest = roots.pictures.join("2022").join("01-January").join("pic.jpg");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, ProcessingStatus::Organized);
    assert_eq!(fs::read(&dest).unwrap(), b"not really a jpeg");
    assert_eq!(mtime(&dest), taken);
    assert!(!source.exists());
    assert_eq!(fs::read(roots.backup_of("pic.jpg")).unwrap(), b"not really a jpeg");
    assert!(matches!(events[0], Event::Copied { .. }));
    assert!(matches!(events[1], Event::BackedUp { .. }));
}

#[test]
fn video_is_filed_by_movie_header() {
    let roots = Roots::new();
    let created = Utc.with_ymd_and_hms(2023, 4, 15, 16, 54, 13).unwrap();
    let modified = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    roots.add("vid.mp4", &mp4_created_at(created), modified);

    organizer(roots.config()).run(&mut Vec::new()).unwrap();

    let dest = roots.videos.join("2023").join("04-April").join("vid.mp4");
    assert_eq!(mtime(&dest), created);
    assert!(roots.backup_of("vid.mp4").exists());
}

#[test]
fn failed_stamp_leaves_no_archive_copy_behind() {
    let roots = Roots::new();
    let created = Utc.with_ymd_and_hms(2023, 4, 15, 16, 54, 13).unwrap();
    let modified = Utc.with_ymd_and_hms(2023, 4, 20, 0, 0, 0).unwrap();
    let source = roots.add("vid.mp4", &mp4_created_at(created), modified);
    let dest = roots.videos.join("2023").join("04-April").join("vid.mp4");

    let first = organizer(roots.config())
        .with_file_system(StampFailsFirst { failures: Cell::new(1) })
        .run(&mut Vec::new())
        .unwrap();

    assert_eq!(first[0].status, ProcessingStatus::Failed);
    assert!(!dest.exists());
    assert!(source.exists());

    let second = organizer(roots.config()).run(&mut Vec::new()).unwrap();

    assert_eq!(second[0].status, ProcessingStatus::Organized);
    assert_eq!(mtime(&dest), created);
    assert!(!source.exists());
}

#[test]
fn unsupported_file_stays_in_place() {
    let roots = Roots::new();
    let source = roots.add("file.unknown", b"?", Utc::now());
    let mut events = Vec::new();

    let mut organizer = organizer(roots.config());
    organizer.run(&mut events).unwrap();

    assert!(source.exists());
    assert!(!roots.pictures.exists());
    assert!(!roots.videos.exists());
    assert!(!roots.backup.exists());
    assert!(matches!(events[0], Event::Ignored { .. }));
    assert_eq!(organizer.stats().ignored, 1);
}

#[test]
fn existing_destination_is_never_overwritten() {
    let roots = Roots::new();
    let taken = Utc.with_ymd_and_hms(2022, 1, 1, 3, 0, 0).unwrap();
    let earlier = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
    let dest_dir = roots.pictures.join("2022").join("01-January");
    fs::create_dir_all(&dest_dir).unwrap();
    let dest = dest_dir.join("pic.jpg");
    fs::write(&dest, b"archived").unwrap();
    set_mtime(&dest, earlier);
    let source = roots.add("pic.jpg", b"incoming", taken);

    let reports = organizer(roots.config()).run(&mut Vec::new()).unwrap();

    assert_eq!(reports[0].status, ProcessingStatus::Skipped);
    assert_eq!(fs::read(&dest).unwrap(), b"archived");
    assert_eq!(mtime(&dest), earlier);
    assert_eq!(fs::read(&source).unwrap(), b"incoming");
    assert!(!roots.backup.exists());
}

#[test]
fn nested_files_keep_their_relative_path_in_backup() {
    let roots = Roots::new();
    let taken = Utc.with_ymd_and_hms(2022, 7, 4, 20, 0, 0).unwrap();
    roots.add("trip/day1/a.jpeg", b"a", taken);
    roots.add("trip/day2/a.jpeg", b"b", taken);

    let reports = organizer(roots.config()).run(&mut Vec::new()).unwrap();

    // Walk order decides which of the two same-named files reaches the archive
    let organized: Vec<_> = reports
        .iter()
        .filter(|r| r.status == ProcessingStatus::Organized)
        .collect();
    let skipped: Vec<_> = reports
        .iter()
        .filter(|r| r.status == ProcessingStatus::Skipped)
        .collect();
    assert_eq!((organized.len(), skipped.len()), (1, 1));

    let moved = organized[0].source.strip_prefix(&roots.source).unwrap();
    let backup = roots.backup_of(moved.to_str().unwrap());
    assert_eq!(organized[0].backup.as_deref(), Some(backup.as_path()));
    assert!(backup.exists());
    assert!(moved.starts_with("trip"));
    assert!(!organized[0].source.exists());

    assert!(skipped[0].source.exists());
    assert!(roots.pictures.join("2022").join("07-July").join("a.jpeg").exists());
}

#[test]
fn dry_run_changes_nothing() {
    let roots = Roots::new();
    let taken = Utc.with_ymd_and_hms(2022, 1, 1, 3, 0, 0).unwrap();
    let source = roots.add("pic.jpg", b"x", taken);
    let mut config = roots.config();
    config.dry_run = true;
    let mut events = Vec::new();

    let reports = organizer(config).run(&mut events).unwrap();

    assert_eq!(reports[0].status, ProcessingStatus::DryRun);
    assert_eq!(reports[0].backup.as_deref(), Some(roots.backup_of("pic.jpg").as_path()));
    assert!(source.exists());
    assert_eq!(mtime(&source), taken);
    assert!(!roots.pictures.exists());
    assert!(!roots.backup.exists());
    assert!(matches!(events[0], Event::Planned { .. }));
}

#[test]
fn roots_inside_source_are_rejected() {
    let roots = Roots::new();
    let config = Config::new(
        &roots.source,
        roots.source.join("pictures"),
        &roots.videos,
        &roots.backup,
    );
    assert!(matches!(config.validate(), Err(Error::NestedRoots { .. })));
    assert!(roots.config().validate().is_ok());
}

#[test]
fn missing_source_root_is_fatal() {
    let roots = Roots::new();
    let mut config = roots.config();
    config.source_dir = roots.source.join("does-not-exist");

    let result = organizer(config).run(&mut Vec::new());

    assert!(matches!(result, Err(Error::WalkDir(_))));
}

#[test]
fn modified_time_reaches_archive_copy() {
    let roots = Roots::new();
    let taken = Utc.with_ymd_and_hms(2020, 2, 29, 23, 59, 59).unwrap();
    roots.add("leap.png", b"png", taken);

    organizer(roots.config()).run(&mut Vec::new()).unwrap();

    let dest = roots.pictures.join("2020").join("02-February").join("leap.png");
    assert_eq!(
        fs::metadata(&dest).unwrap().modified().unwrap(),
        SystemTime::from(taken)
    );
}
