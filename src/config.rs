//! Encoder configuration

use std::path::Path;

use crate::Result;
use crate::uu::UuHeader;
use crate::uu::format::MODE_MASK;

/// Read/write for owner, group and other, before the umask is applied
const DEFAULT_RW: u32 = 0o666;

/// Encoder configuration
///
/// Carries the values written into the `begin` line.
///
/// # Example
///
/// ```
/// use uucodec::EncodeConfig;
///
/// let config = EncodeConfig::new(0o644, "report.pdf");
/// assert_eq!(config.header().mode, 0o644);
/// ```
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodeConfig {
    /// Permission bits recorded in the header (`0..=0o777`)
    pub mode: u32,

    /// Name the decoder will create
    pub name: String,
}

impl EncodeConfig {
    /// Create a configuration from an explicit mode and name
    pub fn new(mode: u32, name: impl Into<String>) -> Self {
        Self {
            mode,
            name: name.into(),
        }
    }

    /// Take the mode from the permission bits of the file at `path`
    pub fn from_file(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::new(file_mode(&metadata), name))
    }

    /// Use the default mode for data read from a pipe: `0o666` minus the umask
    pub fn from_umask(name: impl Into<String>) -> Self {
        Self::new(default_mode(), name)
    }

    /// Header written for this configuration
    pub fn header(&self) -> UuHeader {
        UuHeader::new(self.mode, self.name.clone())
    }
}

/// `0o666` with the process umask cleared from it
#[cfg(unix)]
pub fn default_mode() -> u32 {
    // umask can only be read by setting it, so put the old value straight back
    // SAFETY: umask has no failure mode and touches no memory
    let mask = unsafe {
        let old = libc::umask(0o022);
        libc::umask(old);
        old
    };
    DEFAULT_RW & !(mask as u32)
}

/// `0o666` with the process umask cleared from it
#[cfg(not(unix))]
pub fn default_mode() -> u32 {
    DEFAULT_RW
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & MODE_MASK
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444 & MODE_MASK
    } else {
        DEFAULT_RW & MODE_MASK
    }
}
