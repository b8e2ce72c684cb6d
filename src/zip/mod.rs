/*
   Zip file reader and writer, in pure Rust.
   Copyright (C) 2022 Matheus Xavier <mxavier@neonimp.com>

   This program is free software: you can redistribute it and/or modify
   it under the terms of the GNU Lesser General Public License as published by
   the Free Software Foundation, either version 3 of the License, or
   (at your option) any later version.

   This program is distributed in the hope that it will be useful,
   but WITHOUT ANY WARRANTY; without even the implied warranty of
   MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
   GNU General Public License for more details.

   You should have received a copy of the GNU Lesser General Public License
   along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! The ZIP-mounted filesystem backend (C4 + C5 + C6/C7 wiring, §4.4).

mod deflate;
mod index;
mod parser;
mod pool;
mod stored;
mod structures;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use deflate::DeflateReader;
use index::ZipIndex;
use pool::HandlePool;
use stored::StoredReader;
use structures::CompressionMethod;

use crate::vfs::{DirectoryEntry, Filesystem, InputStream, OpenMode, OutputStream};
use crate::Result;

/// A filesystem backend that mounts a ZIP archive (or a sub-path within
/// one) as a read-only tree rooted at `"/"` (§4.4).
///
/// `index` is `None` when the archive could not be opened or parsed; no
/// construction failure escapes as an exception (§7). Every `Filesystem`
/// method on an invalid backend answers as if the tree were empty.
pub struct ZipBackend {
    index: Option<ZipIndex>,
    pool: Rc<RefCell<HandlePool>>,
}

impl ZipBackend {
    /// Mount `os_path` (a ZIP archive on the host filesystem), exposing
    /// only the subtree rooted at `sub_path` within it (`""` for the
    /// archive root). `encoding_hint` overrides automatic filename
    /// encoding detection when the caller already knows it.
    ///
    /// Always succeeds (§7): if the archive cannot be opened, has no
    /// end-of-central-directory record, or its filename encoding cannot
    /// be resolved, the returned backend is simply invalid.
    pub fn mount(os_path: impl AsRef<Path>, sub_path: &str, encoding_hint: Option<&str>) -> Self {
        let os_path = os_path.as_ref();
        let pool = Rc::new(RefCell::new(HandlePool::new(os_path)));

        let index = match pool.borrow_mut().lease() {
            Ok(idx) => {
                let built = {
                    let mut pool_ref = pool.borrow_mut();
                    let handle = pool_ref.handle_mut(idx);
                    ZipIndex::build(handle, sub_path, encoding_hint)
                };
                pool.borrow_mut().release(idx);
                built.ok()
            }
            Err(_) => None,
        };

        ZipBackend { index, pool }
    }

    /// Probe `os_path`'s central directory for `filename` without
    /// mounting it, reporting where it is nested if found (§4.4).
    pub fn contains(
        os_path: impl AsRef<Path>,
        filename: &str,
        encoding_hint: Option<&str>,
    ) -> Result<(bool, String, String)> {
        let mut handle = std::fs::File::open(os_path).map_err(crate::ZipError::Io)?;
        index::contains(&mut handle, filename, encoding_hint)
    }
}

impl Filesystem for ZipBackend {
    fn is_file(&self, path: &str) -> bool {
        self.index.as_ref().is_some_and(|i| i.is_file(path))
    }

    fn is_directory(&self, path: &str) -> bool {
        self.index.as_ref().is_some_and(|i| i.is_directory(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.index.as_ref().is_some_and(|i| i.exists(path))
    }

    fn get_filesize(&self, path: &str) -> u32 {
        self.index.as_ref().map_or(0, |i| i.get_filesize(path))
    }

    fn open_input(&self, path: &str, _mode: OpenMode) -> Option<Box<dyn InputStream>> {
        let entry = self.index.as_ref()?.get(path)?;
        if entry.is_directory {
            return None;
        }

        let idx = self.pool.borrow_mut().lease().ok()?;
        let header = {
            let mut pool = self.pool.borrow_mut();
            let handle = pool.handle_mut(idx);
            parser::read_local_header(handle, entry.fileoffset).ok()
        };
        let header = match header {
            Some(h) => h,
            None => {
                self.pool.borrow_mut().release(idx);
                return None;
            }
        };

        match header.compression {
            CompressionMethod::Plain => {
                StoredReader::new(
                    self.pool.clone(),
                    idx,
                    header.data_offset as u64,
                    entry.filesize as u64,
                )
                .ok()
                .map(|r| Box::new(r) as Box<dyn InputStream>)
            }
            CompressionMethod::Deflate => {
                DeflateReader::new(
                    self.pool.clone(),
                    idx,
                    header.data_offset as u64,
                    entry.filesize as u64,
                    header.compressed_size as u64,
                )
                .ok()
                .map(|r| Box::new(r) as Box<dyn InputStream>)
            }
            CompressionMethod::Unknown(_) => {
                self.pool.borrow_mut().release(idx);
                None
            }
        }
    }

    /// ZIP archives are read-only in this design (§4.4 Non-goals).
    fn open_output(&mut self, _path: &str, _mode: OpenMode) -> Option<Box<dyn OutputStream>> {
        None
    }

    fn list(&self, path: &str, visitor: &mut dyn FnMut(DirectoryEntry)) -> bool {
        match &self.index {
            Some(index) => index.list(path, visitor),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn write_test_zip(entries: &[(&str, &[u8], bool)]) -> tempfile::NamedTempFile {
        let mut body = Vec::new();
        let mut central = Vec::new();

        for (name, content, deflate) in entries {
            let stored = if *deflate {
                let mut encoder = flate2::write::DeflateEncoder::new(
                    Vec::new(),
                    flate2::Compression::default(),
                );
                encoder.write_all(content).unwrap();
                encoder.finish().unwrap()
            } else {
                content.to_vec()
            };
            let method: u16 = if *deflate { 8 } else { 0 };

            let offset = body.len() as u32;
            body.extend_from_slice(&crate::LFH_SIG.to_le_bytes());
            body.extend_from_slice(&20u16.to_le_bytes());
            body.extend_from_slice(&0u16.to_le_bytes());
            body.extend_from_slice(&method.to_le_bytes());
            body.extend_from_slice(&0u16.to_le_bytes());
            body.extend_from_slice(&0u16.to_le_bytes());
            body.extend_from_slice(&0u32.to_le_bytes());
            body.extend_from_slice(&(stored.len() as u32).to_le_bytes());
            body.extend_from_slice(&(content.len() as u32).to_le_bytes());
            body.extend_from_slice(&(name.len() as u16).to_le_bytes());
            body.extend_from_slice(&0u16.to_le_bytes());
            body.extend_from_slice(name.as_bytes());
            body.extend_from_slice(&stored);

            central.extend_from_slice(&crate::CD_SIG.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&method.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u32.to_le_bytes());
            central.extend_from_slice(&(stored.len() as u32).to_le_bytes());
            central.extend_from_slice(&(content.len() as u32).to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u32.to_le_bytes());
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }

        let cd_offset = body.len() as u32;
        let cd_size = central.len() as u32;
        let mut archive = body;
        archive.extend_from_slice(&central);
        archive.extend_from_slice(&crate::EOCD_SIG.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        archive.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        archive.extend_from_slice(&cd_size.to_le_bytes());
        archive.extend_from_slice(&cd_offset.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&archive).unwrap();
        f
    }

    #[test]
    fn mount_reads_stored_entry() {
        let archive = write_test_zip(&[("readme.txt", b"hello stored world", false)]);
        let backend = ZipBackend::mount(archive.path(), "", Some("utf-8"));

        assert!(backend.is_file("readme.txt"));
        let mut stream = backend.open_input("ReadMe.TXT", OpenMode::READ).unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello stored world");
    }

    #[test]
    fn mount_reads_deflated_entry() {
        let payload = b"a payload that is long enough to actually benefit from deflate compression in this test case";
        let archive = write_test_zip(&[("data.bin", payload, true)]);
        let backend = ZipBackend::mount(archive.path(), "", Some("utf-8"));

        let mut stream = backend.open_input("data.bin", OpenMode::READ).unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(&buf[..], &payload[..]);
    }

    #[test]
    fn mount_sub_path_scopes_listing() {
        let archive = write_test_zip(&[
            ("sub/a.txt", b"1", false),
            ("sub/b.txt", b"2", false),
            ("other/c.txt", b"3", false),
        ]);
        let backend = ZipBackend::mount(archive.path(), "sub", Some("utf-8"));

        let mut names = Vec::new();
        let ok = backend.list("", &mut |e| names.push(e.name));
        assert!(ok);
        names.sort();
        assert_eq!(names, vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert!(!backend.exists("c.txt"));
    }

    #[test]
    fn unparsable_archive_mounts_invalid_instead_of_failing() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"not a zip file at all").unwrap();

        let mut backend = ZipBackend::mount(f.path(), "", Some("utf-8"));
        assert!(!backend.exists("anything"));
        assert!(!backend.is_file("anything"));
        assert!(!backend.is_directory("anything"));
        assert_eq!(backend.get_filesize("anything"), 0);
        assert!(backend.open_input("anything", OpenMode::READ).is_none());
        assert!(backend.open_output("anything", OpenMode::WRITE).is_none());
        assert!(!backend.list("anything", &mut |_| {}));
    }

    #[test]
    fn open_output_is_always_none() {
        let archive = write_test_zip(&[("a.txt", b"1", false)]);
        let mut backend = ZipBackend::mount(archive.path(), "", Some("utf-8"));
        assert!(backend.open_output("a.txt", OpenMode::WRITE).is_none());
    }
}
