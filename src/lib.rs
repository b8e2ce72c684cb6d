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

//! A virtual filesystem core: a uniform, read-oriented directory/file
//! abstraction over a host-OS root directory and a mountable ZIP archive.
//!
//! The [`Filesystem`] trait is the façade; [`OsBackend`] and
//! [`zip::ZipBackend`] are its two implementations.

pub mod encoding;
pub mod os_backend;
pub mod path;
pub mod vfs;
pub mod zip;

pub use os_backend::OsBackend;
pub use vfs::{combine_path, DirectoryEntry, Filesystem, OpenMode};
pub use zip::ZipBackend;

pub const EOCD_SIG: u32 = 0x0605_4b50;
pub const CD_SIG: u32 = 0x0201_4b50;
pub const LFH_SIG: u32 = 0x0403_4b50;

#[derive(Debug, thiserror::Error)]
pub enum ZipError {
    #[error("IO exception: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid signature: {0:#010x}")]
    InvalidSignature(u32),
    #[error("end of central directory record not found")]
    EndOfCentralDirectoryNotFound,
    #[error("local header for entry at offset {0} could not be read")]
    InvalidEntry(u64),
    #[error("could not detect a text encoding for the archive's filenames")]
    EncodingDetectionFailed,
    #[error("encoding label {0:?} is not recognized")]
    UnknownEncoding(String),
}

pub type Result<T> = std::result::Result<T, ZipError>;
