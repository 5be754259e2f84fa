use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

const LOCK_FILE: &str = ".lock";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Exclusive advisory lock on a `todo/` directory, held by every `tch`
/// command that writes the board. Released on drop.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not lock {path} within {waited:?}: another tch process is writing the board")]
    Timeout { path: PathBuf, waited: Duration },
}

impl FileLock {
    /// Lock `todo_dir`, retrying until `timeout` has passed.
    pub fn acquire(todo_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = todo_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::CreateError {
                path: path.clone(),
                source: e,
            })?;

        let start = Instant::now();
        while try_lock(&file).is_err() {
            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path,
                    waited: timeout,
                });
            }
            std::thread::sleep(RETRY_INTERVAL);
        }
        debug!(path = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "lock acquired");
        Ok(FileLock { _file: file, path })
    }

    pub fn acquire_default(todo_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(todo_dir, DEFAULT_TIMEOUT)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // flock is released with the descriptor; the file itself is just litter
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor belongs to `file`, which outlives the call
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn todo_dir(tmp: &TempDir) -> PathBuf {
        let dir = tmp.path().join("todo");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_lock_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        let dir = todo_dir(&tmp);

        let lock = FileLock::acquire_default(&dir).unwrap();
        assert!(dir.join(LOCK_FILE).exists());
        drop(lock);
        assert!(!dir.join(LOCK_FILE).exists());

        assert!(FileLock::acquire_default(&dir).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_second_writer_times_out() {
        let tmp = TempDir::new().unwrap();
        let dir = todo_dir(&tmp);

        let _held = FileLock::acquire_default(&dir).unwrap();
        let err = FileLock::acquire(&dir, Duration::from_millis(50)).err().unwrap();
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn test_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let err = FileLock::acquire_default(&tmp.path().join("nope")).err().unwrap();
        assert!(matches!(err, LockError::CreateError { .. }));
    }
}
