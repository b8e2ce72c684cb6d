//! The backing-stream pool (C5): reusable handles over the physical
//! archive file, each leased to at most one reader adapter at a time.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

struct PoolEntry {
    handle: File,
    leased: bool,
}

/// A pool of random-access handles onto one archive file.
///
/// Not thread-safe by design (§4.5, §5): a backend and every reader
/// adapter it has vended share one thread of control.
pub struct HandlePool {
    os_path: PathBuf,
    entries: Vec<PoolEntry>,
}

impl HandlePool {
    pub fn new(os_path: impl AsRef<Path>) -> Self {
        HandlePool {
            os_path: os_path.as_ref().to_path_buf(),
            entries: Vec::new(),
        }
    }

    /// Lease an unused handle, opening a fresh one if none is free, and
    /// return its pool index.
    pub fn lease(&mut self) -> io::Result<usize> {
        if let Some(idx) = self.entries.iter().position(|e| !e.leased) {
            self.entries[idx].leased = true;
            return Ok(idx);
        }

        let handle = File::open(&self.os_path)?;
        self.entries.push(PoolEntry {
            handle,
            leased: true,
        });
        Ok(self.entries.len() - 1)
    }

    /// Release a previously leased handle back to the pool.
    pub fn release(&mut self, idx: usize) {
        if let Some(entry) = self.entries.get_mut(idx) {
            entry.leased = false;
        }
    }

    pub fn handle_mut(&mut self, idx: usize) -> &mut File {
        &mut self.entries[idx].handle
    }

    /// Number of entries currently leased out; equals the number of live
    /// reader adapters (§8 property 7).
    pub fn leased_count(&self) -> usize {
        self.entries.iter().filter(|e| e.leased).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_archive() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"some archive bytes").unwrap();
        f
    }

    #[test]
    fn lease_reuses_released_handles() {
        let archive = temp_archive();
        let mut pool = HandlePool::new(archive.path());

        let a = pool.lease().unwrap();
        assert_eq!(pool.len(), 1);
        pool.release(a);

        let b = pool.lease().unwrap();
        assert_eq!(b, a);
        assert_eq!(pool.len(), 1, "a released handle should be reused, not reopened");
    }

    #[test]
    fn concurrent_leases_open_distinct_handles() {
        let archive = temp_archive();
        let mut pool = HandlePool::new(archive.path());

        let a = pool.lease().unwrap();
        let b = pool.lease().unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.leased_count(), 2);

        pool.release(a);
        assert_eq!(pool.leased_count(), 1);
    }
}
