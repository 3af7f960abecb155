use std::path::PathBuf;

use crate::Result;

use super::format::MODE_MASK;

/// Header from the `begin` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuHeader {
    /// Permission mode as written in the header (octal on the wire)
    pub mode: u32,
    /// Target file name, possibly `~user/path`, for display
    ///
    /// Lossy UTF-8 rendering of `raw_name`.
    pub name: String,
    /// Target file name exactly as it appears on the wire
    pub raw_name: Vec<u8>,
}

impl UuHeader {
    /// Create a header from a mode and a target name
    pub fn new(mode: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            mode,
            raw_name: name.as_bytes().to_vec(),
            name,
        }
    }

    /// Create a header from a name that need not be UTF-8
    pub fn from_raw(mode: u32, raw_name: impl Into<Vec<u8>>) -> Self {
        let raw_name = raw_name.into();
        Self {
            mode,
            name: String::from_utf8_lossy(&raw_name).into_owned(),
            raw_name,
        }
    }

    /// Permission bits applied to the output file
    pub fn permissions(&self) -> u32 {
        self.mode & MODE_MASK
    }
}

/// Complete in-memory decode result
#[derive(Debug, Clone)]
pub struct UuDecoded {
    /// Parsed header information
    pub header: UuHeader,
    /// Decoded binary data
    pub data: Vec<u8>,
    /// Calculated CRC32 of decoded data
    pub calculated_crc32: u32,
}

/// Outcome of one stream in a multi-stream decode
#[derive(Debug)]
pub struct StreamReport {
    /// Label of the input the stream came from (file name or `stdin`)
    pub source: String,
    /// Zero-based position of the stream within its input
    pub index: usize,
    /// Header, when one was found and parsed
    pub header: Option<UuHeader>,
    /// Output path, when the header name was resolved
    pub target: Option<PathBuf>,
    /// Number of bytes written, or why the stream failed
    pub result: Result<u64>,
}

impl StreamReport {
    /// Whether the stream decoded completely
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
