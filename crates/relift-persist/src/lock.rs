//! Advisory whole-file locks for coordinating with external editors.
//!
//! The core never takes these itself; they exist so an editor working on
//! a single cluster file can fence off a concurrent save. The lock is
//! released on drop, or explicitly with [`FileLock::unlock`].

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use nix::fcntl::{Flock, FlockArg};

use crate::error::PersistError;

/// An acquired advisory lock; dropping it releases the lock.
#[derive(Debug)]
pub struct FileLock {
    flock: Flock<File>,
}

impl FileLock {
    /// Explicitly releases the lock.
    pub fn unlock(self) -> Result<(), PersistError> {
        self.flock
            .unlock()
            .map(|_| ())
            .map_err(|(_, e)| PersistError::Io(io::Error::from_raw_os_error(e as i32)))
    }
}

/// Takes a shared (read) lock on the file, blocking until available.
pub fn lock_file_read(path: &Path) -> Result<FileLock, PersistError> {
    let file = File::open(path)?;
    let flock = Flock::lock(file, FlockArg::LockShared)
        .map_err(|(_, e)| PersistError::Io(io::Error::from_raw_os_error(e as i32)))?;
    Ok(FileLock { flock })
}

/// Takes an exclusive (write) lock on the file, blocking until available.
pub fn lock_file_write(path: &Path) -> Result<FileLock, PersistError> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let flock = Flock::lock(file, FlockArg::LockExclusive)
        .map_err(|(_, e)| PersistError::Io(io::Error::from_raw_os_error(e as i32)))?;
    Ok(FileLock { flock })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_lock_acquires_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.xml");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "<prog/>").unwrap();

        let lock = lock_file_read(&path).unwrap();
        lock.unlock().unwrap();

        // Re-acquirable after release.
        let again = lock_file_read(&path).unwrap();
        drop(again);
    }

    #[test]
    fn write_lock_needs_a_writable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.xml");
        File::create(&path).unwrap();
        let lock = lock_file_write(&path).unwrap();
        drop(lock);
    }
}
