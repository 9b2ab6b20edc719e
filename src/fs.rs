//! File system access used by the transfer engine
//!
//! All mutation goes through [`FileSystem`] so the organizing logic can be
//! exercised without touching a disk.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, trace, warn};

/// Narrow file system interface; every operation may fail with an I/O error
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Copy contents and attributes (permissions, access and modification
    /// time) to a new file. Fails with [`io::ErrorKind::AlreadyExists`]
    /// instead of overwriting.
    fn copy_new(&self, source: &Path, dest: &Path) -> io::Result<u64>;

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()>;

    /// Move a file, renaming where possible
    fn move_file(&self, source: &Path, dest: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by `std::fs` and `filetime`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

const COPY_BUFFER: usize = 256 * 1024;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        // A dangling symlink still occupies the name
        path.symlink_metadata().is_ok()
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn copy_new(&self, source: &Path, dest: &Path) -> io::Result<u64> {
        let metadata = fs::metadata(source)?;
        let src_file = File::open(source)?;
        let dest_file = OpenOptions::new().write(true).create_new(true).open(dest)?;

        let copied = copy_contents(src_file, dest_file).and_then(|bytes| {
            fs::set_permissions(dest, metadata.permissions())?;
            let atime = filetime::FileTime::from_last_access_time(&metadata);
            let mtime = filetime::FileTime::from_last_modification_time(&metadata);
            filetime::set_file_times(dest, atime, mtime)?;
            Ok(bytes)
        });

        match copied {
            Ok(bytes) => {
                trace!(?source, ?dest, bytes, "Copied file");
                Ok(bytes)
            }
            Err(e) => {
                // A partial or unstamped copy would later pass for an organized file
                if let Err(cleanup) = fs::remove_file(dest) {
                    warn!(?dest, error = %cleanup, "Failed to remove partial copy");
                }
                Err(e)
            }
        }
    }

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(time))
    }

    fn move_file(&self, source: &Path, dest: &Path) -> io::Result<()> {
        if self.exists(dest) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", dest.display()),
            ));
        }

        // Try rename first (faster for same filesystem)
        match fs::rename(source, dest) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(?source, ?dest, error = %e, "Rename failed, falling back to copy and delete");
                self.copy_new(source, dest)?;
                fs::remove_file(source)
            }
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Copy with buffered I/O
fn copy_contents(source: File, dest: File) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER, source);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER, dest);

    let mut buffer = vec![0u8; COPY_BUFFER];
    let mut total = 0u64;
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
        total += bytes_read as u64;
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(total)
}
