//! The host-OS backend (C2): directory traversal and path composition
//! over a root directory on the host filesystem.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use crate::vfs::{DirectoryEntry, Filesystem, InputStream, OpenMode, OutputStream};

/// Process-wide flag for whether the platform populates the fast
/// directory-entry-kind field (§4.2, §9). Downgraded at most once.
static HAS_FAST_DIR_STAT: AtomicBool = AtomicBool::new(true);
static SLOW_PATH_WARNING: Once = Once::new();

fn record_slow_path() {
    if HAS_FAST_DIR_STAT.swap(false, Ordering::Relaxed) {
        SLOW_PATH_WARNING.call_once(|| {
            log::warn!(
                "file system does not populate directory entry kind; \
                 directory listing will fall back to per-entry stat calls"
            );
        });
    }
}

/// A filesystem backend rooted at an arbitrary host-OS directory.
pub struct OsBackend {
    root: String,
}

impl OsBackend {
    pub fn new(root: impl Into<String>) -> Self {
        OsBackend { root: root.into() }
    }

    fn abs(&self, path: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.root, path))
    }
}

impl Filesystem for OsBackend {
    /// Always `false` (§4.2): callers distinguish files from directories
    /// via `exists(p) && !is_directory(p)`.
    fn is_file(&self, _path: &str) -> bool {
        false
    }

    fn is_directory(&self, path: &str) -> bool {
        self.abs(path).is_dir()
    }

    fn exists(&self, path: &str) -> bool {
        self.abs(path).exists()
    }

    fn get_filesize(&self, path: &str) -> u32 {
        match fs::metadata(self.abs(path)) {
            Ok(meta) => meta.len() as u32,
            Err(_) => u32::MAX,
        }
    }

    fn open_input(&self, path: &str, mode: OpenMode) -> Option<Box<dyn InputStream>> {
        let _ = mode;
        File::open(self.abs(path)).ok().map(|f| Box::new(f) as Box<dyn InputStream>)
    }

    fn open_output(&mut self, path: &str, mode: OpenMode) -> Option<Box<dyn OutputStream>> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true);
        if mode.contains(OpenMode::WRITE) {
            options.truncate(true);
        }
        options.open(self.abs(path)).ok().map(|f| Box::new(f) as Box<dyn OutputStream>)
    }

    fn list(&self, path: &str, visitor: &mut dyn FnMut(DirectoryEntry)) -> bool {
        let dir = match fs::read_dir(self.abs(path)) {
            Ok(dir) => dir,
            Err(e) => {
                log::debug!("error opening dir {path}: {e}");
                return false;
            }
        };

        for entry in dir {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "." || name == ".." {
                continue;
            }

            let is_directory = if HAS_FAST_DIR_STAT.load(Ordering::Relaxed) {
                match entry.file_type() {
                    Ok(ft) if ft.is_dir() => true,
                    Ok(ft) if ft.is_file() => false,
                    _ => {
                        record_slow_path();
                        entry.path().is_dir()
                    }
                }
            } else {
                entry.path().is_dir()
            };

            visitor(DirectoryEntry { name, is_directory });
        }

        true
    }
}
