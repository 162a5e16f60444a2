//! Per-table exclusive locks.
//!
//! A table is held by at most one guard at a time. Acquisition first claims
//! the table inside this process, then takes an OS advisory lock on
//! `<table file>.lock` next to it so other processes sharing the directory
//! are excluded too. Both claims use the same deadline. Dropping the guard
//! releases both. The OS drops the advisory lock when its holder exits, so a
//! crashed process never leaves the table blocked. The lock file itself is
//! never deleted: unlinking it would let a waiter lock an orphaned inode
//! while a newcomer locks a fresh file.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use parking_lot::{Condvar, Mutex};

use super::error::StoreError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct TableLocks {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
    timeout: Duration,
}

impl TableLocks {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
        })
    }

    /// Acquire the table stored at `path`.
    ///
    /// Fails with `LockTimeout` if another guard in this process holds the
    /// table past the deadline, and with `Locked` if another process (or
    /// another registry) still holds the lock file at the deadline.
    pub fn acquire(self: &Arc<Self>, path: &Path) -> Result<TableGuard, StoreError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let table = path.to_path_buf();

        {
            let mut held = self.held.lock();
            while held.contains(&table) {
                if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(&table) {
                    return Err(StoreError::LockTimeout {
                        table: table.display().to_string(),
                        waited_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }
            held.insert(table.clone());
        }

        // From here on, dropping the guard releases the in-process claim.
        let mut guard = TableGuard {
            locks: Arc::clone(self),
            table,
            lock_file: None,
        };

        let lock_path = lock_file_path(path);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| StoreError::io(&lock_path, err))?;

        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    record_holder(&mut file);
                    guard.lock_file = Some(file);
                    return Ok(guard);
                }
                Err(err) if is_contended(&err) => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::Locked {
                            table: path.display().to_string(),
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) => return Err(StoreError::io(&lock_path, err)),
            }
        }
    }

    fn release(&self, table: &Path) {
        self.held.lock().remove(table);
        self.released.notify_all();
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Best effort: the pid in the lock file only helps an operator see who holds it.
fn record_holder(file: &mut File) {
    let written = file
        .set_len(0)
        .and_then(|_| file.rewind())
        .and_then(|_| writeln!(file, "{}", std::process::id()));
    if let Err(err) = written {
        tracing::debug!(error = %err, "could not record lock holder");
    }
}

/// Exclusive hold on one table. Mutating table methods require a reference
/// to the guard of that table.
#[derive(Debug)]
pub struct TableGuard {
    locks: Arc<TableLocks>,
    table: PathBuf,
    lock_file: Option<File>,
}

impl TableGuard {
    pub fn covers(&self, path: &Path) -> bool {
        self.table == path
    }
}

impl Drop for TableGuard {
    fn drop(&mut self) {
        if let Some(file) = self.lock_file.take() {
            if let Err(err) = FileExt::unlock(&file) {
                tracing::warn!(table = %self.table.display(), error = %err, "failed to unlock table");
            }
        }
        self.locks.release(&self.table);
    }
}

fn lock_file_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
