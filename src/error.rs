//! uuencode/uudecode error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while encoding or decoding a uuencoded stream
#[derive(Error, Debug)]
pub enum UuError {
    /// IO error on the underlying reader or writer
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input ended before a `begin` line was found
    #[error("no `begin' line")]
    NoBeginLine,

    /// A `begin` line that does not carry an octal mode and a name
    #[error("invalid begin line: {0}")]
    InvalidHeader(String),

    /// Input ended inside the data section
    #[error("short file")]
    ShortFile,

    /// The line after the data section is not `end`
    #[error("no `end' line")]
    NoEndLine,

    /// Data line whose length character is out of range
    #[error("invalid data line: {0}")]
    InvalidLine(String),

    /// `~user` name without a `/` separator
    #[error("illegal ~user: {0}")]
    IllegalUser(String),

    /// `~user` name whose user has no home directory entry
    #[error("no user `{0}'")]
    NoSuchUser(String),

    /// Output file could not be created or its mode could not be set
    #[error("{}: {source}", .path.display())]
    Target {
        /// Path of the output file
        path: PathBuf,
        /// Underlying system error
        source: std::io::Error,
    },

    /// Permission mode outside `0..=0o777`
    #[error("invalid mode: {0:o}")]
    InvalidMode(u32),

    /// Remote name that cannot be carried in a header
    #[error("invalid name: {0:?}")]
    InvalidName(String),
}

impl UuError {
    /// Missing or malformed framing (`begin`, data section, `end`)
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            UuError::NoBeginLine
                | UuError::InvalidHeader(_)
                | UuError::ShortFile
                | UuError::NoEndLine
                | UuError::InvalidLine(_)
        )
    }

    /// Failure to resolve a `~user` output name
    pub fn is_resolution(&self) -> bool {
        matches!(self, UuError::IllegalUser(_) | UuError::NoSuchUser(_))
    }
}

/// Result type alias using UuError
pub type Result<T> = std::result::Result<T, UuError>;
