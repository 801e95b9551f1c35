//! Advisory file locking for the PID-file single-instance guard and the
//! rollrec lock file (spec 4.E, 5).
//!
//! `daemonbase` handles daemonization and PID-file bookkeeping but does
//! not expose a raw single-instance lock primitive suited to holding an
//! exclusive advisory lock across the daemon's lifetime, so `fs2` is used
//! directly for both locks (grounded in the wider example pack: the Neon
//! manifests and the `keeper-rs` example both reach for `fs2::FileExt`
//! for exactly this purpose).

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;

/// An exclusive advisory lock held for the lifetime of the value.
///
/// Used both for the PID file (single-instance guard) and for
/// `rollrec.lock` (coarse mutex over the rollrec's on-disk state).
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Attempts to acquire an exclusive, non-blocking lock on `path`,
    /// creating the file if it does not exist. Fails immediately if
    /// another process already holds the lock.
    pub fn try_acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.try_lock_exclusive().map_err(|_| {
            io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("{} is already locked by another instance", path.display()),
            )
        })?;
        Ok(Self { file })
    }

    /// Acquires an exclusive lock on `path`, blocking until it becomes
    /// available. Used for the rollrec lock, which every read-mutate-write
    /// sequence must hold across its entirety.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Overwrites the locked file's contents (used to write the PID into
    /// the PID file once the lock is held).
    pub fn write_contents(&mut self, contents: &str) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(contents.as_bytes())?;
        self.file.flush()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_try_acquire_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollerd.lock");

        let _first = FileLock::try_acquire(&path).unwrap();
        let second = FileLock::try_acquire(&path);
        assert!(second.is_err());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollerd.lock");

        {
            let _first = FileLock::try_acquire(&path).unwrap();
        }
        let second = FileLock::try_acquire(&path);
        assert!(second.is_ok());
    }
}
