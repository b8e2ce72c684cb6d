//! The archive namespace index (C4): the recoded, normalized map from
//! logical path to entry metadata, built once at mount time (§4.4).

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use super::parser::{find_eocd, read_central_directory};
use super::structures::ZipEntry;
use crate::encoding::{detect_encoding, recode};
use crate::path::normalize;
use crate::{Result, ZipError};

pub struct ZipIndex {
    entries: BTreeMap<String, ZipEntry>,
}

/// Detect (or accept an explicit hint for) the filename encoding, then
/// decode every raw central-directory filename with it (§4.4 step 2).
fn recode_all(raw_entries: &[super::structures::RawCentralDirEntry], encoding_hint: Option<&str>) -> Result<Vec<String>> {
    let encoding = match encoding_hint {
        Some(hint) => hint.to_string(),
        None => {
            let sample: Vec<u8> = raw_entries
                .iter()
                .flat_map(|e| e.filename.iter().copied())
                .collect();
            let detected = detect_encoding(&sample);
            if detected.is_empty() {
                return Err(ZipError::EncodingDetectionFailed);
            }
            detected
        }
    };

    raw_entries
        .iter()
        .map(|raw| {
            recode(&raw.filename, &encoding)
                .map(|s| s.to_lowercase())
                .ok_or_else(|| ZipError::UnknownEncoding(encoding.clone()))
        })
        .collect()
}

impl ZipIndex {
    /// Build the index for one archive, scoped to `sub_path` (§4.4 steps
    /// 1-4): locate the EOCD and walk the central directory; decode and
    /// lowercase every filename; keep only entries under `sub_path`,
    /// stripping that prefix; insert a synthetic root entry.
    pub fn build<R: Read + Seek>(
        reader: &mut R,
        sub_path: &str,
        encoding_hint: Option<&str>,
    ) -> Result<Self> {
        let eocd = find_eocd(reader)?;
        let raw_entries = read_central_directory(reader, eocd.central_directory_offset as u64)?;
        let decoded = recode_all(&raw_entries, encoding_hint)?;

        let scope = normalize(sub_path);
        let scope_prefix = if scope.is_empty() {
            String::new()
        } else {
            format!("{scope}/")
        };

        let mut entries = BTreeMap::new();
        entries.insert(
            String::new(),
            ZipEntry {
                filesize: 0,
                fileoffset: 0,
                is_directory: true,
            },
        );

        for (raw, s) in raw_entries.iter().zip(decoded.iter()) {
            if !scope_prefix.is_empty() && !s.starts_with(&scope_prefix) {
                continue;
            }
            let remainder = &s[scope_prefix.len()..];

            let (remainder, is_directory) = match remainder.strip_suffix('/') {
                Some(stripped) => (stripped, true),
                None => (remainder, false),
            };
            if remainder.is_empty() {
                continue;
            }

            entries.insert(
                remainder.to_string(),
                ZipEntry {
                    filesize: raw.uncompressed_size,
                    fileoffset: raw.local_header_offset,
                    is_directory,
                },
            );
        }

        Ok(ZipIndex { entries })
    }

    pub fn get(&self, path: &str) -> Option<&ZipEntry> {
        self.entries.get(&normalize(path))
    }

    pub fn is_file(&self, path: &str) -> bool {
        matches!(self.get(path), Some(e) if !e.is_directory)
    }

    pub fn is_directory(&self, path: &str) -> bool {
        matches!(self.get(path), Some(e) if e.is_directory)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// `0` for a missing path or a directory (§3, §4.4), never a sentinel:
    /// that's the OS backend's stat-failure convention, not this one's.
    pub fn get_filesize(&self, path: &str) -> u32 {
        match self.get(path) {
            Some(e) if !e.is_directory => e.filesize,
            _ => 0,
        }
    }

    /// Enumerate direct children of `path`, excluding `path` itself
    /// (§4.4; the original's prefix-match listing included the directory
    /// being listed unless explicitly excluded).
    pub fn list(&self, path: &str, visitor: &mut dyn FnMut(crate::vfs::DirectoryEntry)) -> bool {
        let dir = normalize(path);
        if !dir.is_empty() && !self.is_directory(&dir) {
            return false;
        }
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        for (key, entry) in self.entries.range(prefix.clone()..) {
            if key == &dir {
                continue;
            }
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            if rest.is_empty() {
                continue;
            }
            if rest.contains('/') {
                continue;
            }
            visitor(crate::vfs::DirectoryEntry {
                name: rest.to_string(),
                is_directory: entry.is_directory,
            });
        }

        true
    }
}

/// Parse `reader`'s central directory without mounting an index, and
/// report where `filename` lives, if at all (§4.4 probe utility).
///
/// Returns `(found, sub_path, encoding)`: `sub_path` is the
/// archive-relative directory containing the first entry whose basename
/// matches `filename` case-insensitively, and `encoding` is whichever
/// label was used (the caller's hint, or the detected one) to decode it.
pub fn contains<R: Read + Seek>(
    reader: &mut R,
    filename: &str,
    encoding_hint: Option<&str>,
) -> Result<(bool, String, String)> {
    let eocd = find_eocd(reader)?;
    let raw_entries = read_central_directory(reader, eocd.central_directory_offset as u64)?;

    let encoding = match encoding_hint {
        Some(hint) => hint.to_string(),
        None => {
            let sample: Vec<u8> = raw_entries
                .iter()
                .flat_map(|e| e.filename.iter().copied())
                .collect();
            let detected = detect_encoding(&sample);
            if detected.is_empty() {
                return Err(ZipError::EncodingDetectionFailed);
            }
            detected
        }
    };

    let target = filename.to_lowercase();
    for raw in &raw_entries {
        let decoded = recode(&raw.filename, &encoding)
            .ok_or_else(|| ZipError::UnknownEncoding(encoding.clone()))?
            .to_lowercase();
        let trimmed = decoded.strip_suffix('/').unwrap_or(&decoded);
        let (dir, base) = match trimmed.rsplit_once('/') {
            Some((dir, base)) => (dir, base),
            None => ("", trimmed),
        };
        if base == target {
            return Ok((true, dir.to_string(), encoding));
        }
    }

    Ok((false, String::new(), encoding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_test_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        let mut central = Vec::new();

        for (name, content) in entries {
            let offset = body.len() as u32;
            body.extend_from_slice(&crate::LFH_SIG.to_le_bytes());
            body.extend_from_slice(&20u16.to_le_bytes()); // version
            body.extend_from_slice(&0u16.to_le_bytes()); // flags
            body.extend_from_slice(&0u16.to_le_bytes()); // method: stored
            body.extend_from_slice(&0u16.to_le_bytes()); // mod time
            body.extend_from_slice(&0u16.to_le_bytes()); // mod date
            body.extend_from_slice(&0u32.to_le_bytes()); // crc32
            body.extend_from_slice(&(content.len() as u32).to_le_bytes()); // compressed size
            body.extend_from_slice(&(content.len() as u32).to_le_bytes()); // uncompressed size
            body.extend_from_slice(&(name.len() as u16).to_le_bytes());
            body.extend_from_slice(&0u16.to_le_bytes()); // extra len
            body.extend_from_slice(name.as_bytes());
            body.extend_from_slice(content);

            central.extend_from_slice(&crate::CD_SIG.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // version made by
            central.extend_from_slice(&20u16.to_le_bytes()); // version needed
            central.extend_from_slice(&0u16.to_le_bytes()); // flags
            central.extend_from_slice(&0u16.to_le_bytes()); // method
            central.extend_from_slice(&0u16.to_le_bytes()); // time
            central.extend_from_slice(&0u16.to_le_bytes()); // date
            central.extend_from_slice(&0u32.to_le_bytes()); // crc32
            central.extend_from_slice(&(content.len() as u32).to_le_bytes());
            central.extend_from_slice(&(content.len() as u32).to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // extra len
            central.extend_from_slice(&0u16.to_le_bytes()); // comment len
            central.extend_from_slice(&0u16.to_le_bytes()); // disk number
            central.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            central.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }

        let cd_offset = body.len() as u32;
        let cd_size = central.len() as u32;
        let mut archive = body;
        archive.extend_from_slice(&central);

        archive.extend_from_slice(&crate::EOCD_SIG.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes()); // disk
        archive.extend_from_slice(&0u16.to_le_bytes()); // cd start disk
        archive.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        archive.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        archive.extend_from_slice(&cd_size.to_le_bytes());
        archive.extend_from_slice(&cd_offset.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes()); // comment len

        archive
    }

    #[test]
    fn builds_index_and_folds_case() {
        let data = build_test_zip(&[("Docs/ReadMe.TXT", b"hello"), ("Docs/", b"")]);
        let mut cursor = Cursor::new(data);
        let index = ZipIndex::build(&mut cursor, "", Some("utf-8")).unwrap();

        assert!(index.is_file("docs/readme.txt"));
        assert!(index.is_directory("docs"));
        assert_eq!(index.get_filesize("docs/readme.txt"), 5);
        assert!(!index.exists("docs/missing.txt"));
    }

    #[test]
    fn get_filesize_is_zero_for_missing_path_and_for_directories() {
        let data = build_test_zip(&[("docs/readme.txt", b"hello"), ("docs/", b"")]);
        let mut cursor = Cursor::new(data);
        let index = ZipIndex::build(&mut cursor, "", Some("utf-8")).unwrap();

        assert_eq!(index.get_filesize("docs/missing.txt"), 0);
        assert_eq!(index.get_filesize("docs"), 0);
        assert_eq!(index.get_filesize(""), 0);
    }

    #[test]
    fn build_scopes_entries_under_sub_path() {
        let data = build_test_zip(&[
            ("root/sub/a.txt", b"1"),
            ("root/sub/dir/b.txt", b"22"),
            ("root/other/c.txt", b"333"),
        ]);
        let mut cursor = Cursor::new(data);
        let index = ZipIndex::build(&mut cursor, "root/sub", Some("utf-8")).unwrap();

        assert!(index.exists("a.txt"));
        assert!(index.exists("dir/b.txt"));
        assert!(!index.exists("c.txt"));
        assert!(!index.exists("root/sub/a.txt"));
    }

    #[test]
    fn list_enumerates_direct_children_only() {
        let data = build_test_zip(&[("a/b.txt", b"1"), ("a/c/d.txt", b"22")]);
        let mut cursor = Cursor::new(data);
        let index = ZipIndex::build(&mut cursor, "", Some("utf-8")).unwrap();

        let mut names = Vec::new();
        let ok = index.list("a", &mut |e| names.push(e.name));
        assert!(ok);
        names.sort();
        assert_eq!(names, vec!["b.txt".to_string(), "c".to_string()]);
    }

    #[test]
    fn contains_finds_nested_entry_and_reports_sub_path() {
        let data = build_test_zip(&[("a/b/target.txt", b"1"), ("a/other.txt", b"2")]);
        let mut cursor = Cursor::new(data);
        let (found, sub_path, _encoding) = contains(&mut cursor, "target.txt", Some("utf-8")).unwrap();
        assert!(found);
        assert_eq!(sub_path, "a/b");
    }

    #[test]
    fn contains_reports_not_found() {
        let data = build_test_zip(&[("a/b.txt", b"1")]);
        let mut cursor = Cursor::new(data);
        let (found, _sub_path, _encoding) = contains(&mut cursor, "missing.txt", Some("utf-8")).unwrap();
        assert!(!found);
    }
}
