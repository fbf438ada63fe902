//! Log files under `LOG_DIR`.
//!
//! `server.log` receives everything at the configured level and `error.log`
//! only errors. Each file rotates once it would grow past [`MAX_LOG_BYTES`],
//! keeping [`MAX_LOG_FILES`] generations in total (`server.log`,
//! `server.log.1`). Writes go through `tracing-appender`'s non-blocking
//! worker so request handling never waits on disk.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

pub const SERVER_LOG: &str = "server.log";
pub const ERROR_LOG: &str = "error.log";
pub const MAX_LOG_BYTES: u64 = 1024 * 1024;
pub const MAX_LOG_FILES: usize = 2;

#[derive(Debug, Error)]
pub enum LogDirError {
    #[error("Log directory {path} is not usable: {source}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Log directory {0} is not a directory")]
    NotDirectory(PathBuf),

    #[error("Log file {0} is not a file")]
    NotFile(PathBuf),

    #[error("Log file {path} is not writable: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Append-only file that rotates by size.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    max_files: usize,
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl RotatingFile {
    pub fn open(path: PathBuf, max_bytes: u64, max_files: usize) -> io::Result<Self> {
        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            file,
            written,
            max_bytes,
            max_files,
        })
    }

    fn generation(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    /// Shift `path.N` to `path.N+1`, dropping the oldest, and start afresh.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let backups = self.max_files.saturating_sub(1);
        if backups == 0 {
            self.file.set_len(0)?;
        } else {
            for n in (1..backups).rev() {
                let from = self.generation(n);
                if from.exists() {
                    fs::rename(&from, self.generation(n + 1))?;
                }
            }
            fs::rename(&self.path, self.generation(1))?;
            self.file = open_append(&self.path)?;
        }
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Non-blocking writers for the two log files.
pub struct LogWriters {
    pub server: NonBlocking,
    pub error: NonBlocking,
}

/// Flushes pending lines when dropped; hold it for the process lifetime.
pub struct LogGuard {
    _guards: [WorkerGuard; 2],
}

/// Create `dir` if needed and make sure both log files are writable files.
fn prepare_log_dir(dir: &Path) -> Result<[PathBuf; 2], LogDirError> {
    match fs::metadata(dir) {
        Ok(metadata) if !metadata.is_dir() => {
            return Err(LogDirError::NotDirectory(dir.to_path_buf()));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|source| LogDirError::Inaccessible {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Err(source) => {
            return Err(LogDirError::Inaccessible {
                path: dir.to_path_buf(),
                source,
            });
        }
    }

    let paths = [dir.join(SERVER_LOG), dir.join(ERROR_LOG)];
    for path in &paths {
        if let Ok(metadata) = fs::symlink_metadata(path) {
            if !metadata.is_file() {
                return Err(LogDirError::NotFile(path.clone()));
            }
        }
    }
    Ok(paths)
}

fn rotating(path: PathBuf) -> Result<RotatingFile, LogDirError> {
    RotatingFile::open(path.clone(), MAX_LOG_BYTES, MAX_LOG_FILES)
        .map_err(|source| LogDirError::Unwritable { path, source })
}

/// Open `server.log` and `error.log` under `dir`.
pub fn open_log_dir(dir: &Path) -> Result<(LogWriters, LogGuard), LogDirError> {
    let [server_path, error_path] = prepare_log_dir(dir)?;
    let (server, server_guard) = tracing_appender::non_blocking(rotating(server_path)?);
    let (error, error_guard) = tracing_appender::non_blocking(rotating(error_path)?);
    Ok((
        LogWriters { server, error },
        LogGuard {
            _guards: [server_guard, error_guard],
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn rotates_when_size_would_be_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SERVER_LOG);
        let mut file = RotatingFile::open(path.clone(), 10, 2).unwrap();

        file.write_all(b"first---\n").unwrap();
        file.write_all(b"second--\n").unwrap();
        assert_eq!(read(&path), "second--\n");
        assert_eq!(read(&dir.path().join("server.log.1")), "first---\n");

        file.write_all(b"third---\n").unwrap();
        assert_eq!(read(&path), "third---\n");
        assert_eq!(read(&dir.path().join("server.log.1")), "second--\n");
        assert!(!dir.path().join("server.log.2").exists());
    }

    #[test]
    fn keeps_configured_number_of_generations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ERROR_LOG);
        let mut file = RotatingFile::open(path.clone(), 4, 3).unwrap();
        for line in [b"aaa\n", b"bbb\n", b"ccc\n", b"ddd\n"] {
            file.write_all(line).unwrap();
        }
        assert_eq!(read(&path), "ddd\n");
        assert_eq!(read(&dir.path().join("error.log.1")), "ccc\n");
        assert_eq!(read(&dir.path().join("error.log.2")), "bbb\n");
        assert!(!dir.path().join("error.log.3").exists());
    }

    #[test]
    fn existing_content_counts_toward_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SERVER_LOG);
        fs::write(&path, b"old-line\n").unwrap();

        let mut file = RotatingFile::open(path.clone(), 12, 2).unwrap();
        file.write_all(b"new-line\n").unwrap();
        assert_eq!(read(&path), "new-line\n");
        assert_eq!(read(&dir.path().join("server.log.1")), "old-line\n");
    }

    #[test]
    fn creates_missing_directory_and_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs/nested");

        let (mut writers, guard) = open_log_dir(&log_dir).unwrap();
        writers.server.write_all(b"server line\n").unwrap();
        writers.error.write_all(b"error line\n").unwrap();
        drop(guard);

        assert_eq!(read(&log_dir.join(SERVER_LOG)), "server line\n");
        assert_eq!(read(&log_dir.join(ERROR_LOG)), "error line\n");
    }

    #[test]
    fn rejects_unusable_locations() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"").unwrap();
        assert!(matches!(
            open_log_dir(&file),
            Err(LogDirError::NotDirectory(_))
        ));

        let log_dir = dir.path().join("logs");
        fs::create_dir_all(log_dir.join(ERROR_LOG)).unwrap();
        assert!(matches!(
            open_log_dir(&log_dir),
            Err(LogDirError::NotFile(_))
        ));
    }
}
