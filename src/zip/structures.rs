//! Raw ZIP data-model types (§3, §6).

/// A descriptor stored per archive entry in the namespace index (§3).
#[derive(Debug, Clone, Copy)]
pub struct ZipEntry {
    /// Uncompressed size.
    pub filesize: u32,
    /// Absolute byte offset of the entry's *local header* (not the data).
    pub fileoffset: u32,
    /// `true` iff the raw central-directory filename ended with `/`.
    pub is_directory: bool,
}

/// A raw, not-yet-recoded central-directory record as parsed off disk.
pub struct RawCentralDirEntry {
    pub filename: Vec<u8>,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
}

/// The parsed end-of-central-directory record (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory {
    pub number_of_entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
}

/// Compression method read from a local file header (§4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Plain,
    Deflate,
    Unknown(u16),
}

/// The fields of a local file header needed to stream an entry's data.
#[derive(Debug, Clone, Copy)]
pub struct LocalHeader {
    pub compression: CompressionMethod,
    pub compressed_size: u32,
    /// Absolute offset where the entry's payload begins.
    pub data_offset: u32,
}
