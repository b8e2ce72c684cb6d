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

//! The ZIP parser (C3): EOCD discovery, central-directory iteration, and
//! local-header resolution.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

use super::structures::{CompressionMethod, EndOfCentralDirectory, LocalHeader, RawCentralDirEntry};
use crate::{Result, ZipError, CD_SIG, EOCD_SIG, LFH_SIG};

const EOCD_RECORD_SIZE: u64 = 22;
/// Bounded by the maximum length of the ZIP comment field (§4.3).
const MAX_EOCD_BACKSTEPS: u64 = u16::MAX as u64;

/// Locate and parse the end-of-central-directory record (§4.3).
///
/// `byteorder`'s explicit-endianness reads make the on-disk little-endian
/// fields portable without the native-read-then-byteswap dance the
/// original C++ used on big-endian hosts.
pub fn find_eocd<R: Read + Seek>(reader: &mut R) -> Result<EndOfCentralDirectory> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    if file_len < EOCD_RECORD_SIZE {
        return Err(ZipError::EndOfCentralDirectoryNotFound);
    }

    let mut pos = file_len - EOCD_RECORD_SIZE;
    let mut steps = 0u64;
    loop {
        reader.seek(SeekFrom::Start(pos))?;
        let sig = reader.read_u32::<LittleEndian>()?;
        if sig == EOCD_SIG {
            break;
        }
        if pos == 0 || steps >= MAX_EOCD_BACKSTEPS {
            return Err(ZipError::EndOfCentralDirectoryNotFound);
        }
        pos -= 1;
        steps += 1;
    }

    reader.seek(SeekFrom::Current(6))?;
    let number_of_entries = reader.read_u16::<LittleEndian>()?;
    let central_directory_size = reader.read_u32::<LittleEndian>()?;
    let central_directory_offset = reader.read_u32::<LittleEndian>()?;

    Ok(EndOfCentralDirectory {
        number_of_entries,
        central_directory_size,
        central_directory_offset,
    })
}

/// Parse every central-directory record starting at `offset`, stopping
/// as soon as a record's signature does not match (§4.3: "otherwise
/// iteration ends" — not an error, just the end of the directory).
pub fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
) -> Result<Vec<RawCentralDirEntry>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut entries = Vec::new();

    loop {
        let sig = match reader.read_u32::<LittleEndian>() {
            Ok(sig) => sig,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if sig != CD_SIG {
            break;
        }

        reader.seek(SeekFrom::Current(20))?;
        let uncompressed_size = reader.read_u32::<LittleEndian>()?;
        let filepath_length = reader.read_u16::<LittleEndian>()? as usize;
        let extra_field_length = reader.read_u16::<LittleEndian>()? as usize;
        let comment_length = reader.read_u16::<LittleEndian>()? as usize;
        reader.seek(SeekFrom::Current(8))?;
        let local_header_offset = reader.read_u32::<LittleEndian>()?;

        let mut filename = vec![0u8; filepath_length];
        reader.read_exact(&mut filename)?;
        reader.seek(SeekFrom::Current((extra_field_length + comment_length) as i64))?;

        entries.push(RawCentralDirEntry {
            filename,
            uncompressed_size,
            local_header_offset,
        });
    }

    Ok(entries)
}

/// Resolve a local file header at the given absolute offset (§4.3).
pub fn read_local_header<R: Read + Seek>(reader: &mut R, fileoffset: u32) -> Result<LocalHeader> {
    reader.seek(SeekFrom::Start(fileoffset as u64))?;

    let sig = match reader.read_u32::<LittleEndian>() {
        Ok(sig) => sig,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(ZipError::InvalidEntry(fileoffset as u64))
        }
        Err(e) => return Err(e.into()),
    };
    if sig != LFH_SIG {
        return Err(ZipError::InvalidSignature(sig));
    }

    reader.seek(SeekFrom::Current(2))?;
    let _flags = reader.read_u16::<LittleEndian>()?;
    let compression = reader.read_u16::<LittleEndian>()?;
    reader.seek(SeekFrom::Current(8))?;
    let compressed_size = reader.read_u32::<LittleEndian>()?;
    reader.seek(SeekFrom::Current(4))?;
    let filepath_length = reader.read_u16::<LittleEndian>()? as u32;
    let extra_field_length = reader.read_u16::<LittleEndian>()? as u32;

    let compression = match compression {
        0 => CompressionMethod::Plain,
        8 => CompressionMethod::Deflate,
        other => CompressionMethod::Unknown(other),
    };
    let data_offset = fileoffset + 30 + filepath_length + extra_field_length;

    Ok(LocalHeader {
        compression,
        compressed_size,
        data_offset,
    })
}
