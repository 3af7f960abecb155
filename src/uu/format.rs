//! Wire format shared by the encoder and decoder
//!
//! ```text
//! begin <mode:octal> <name>\n
//! <len-char><data-chars...>\n      (len in 1..=45)
//! `\n                              (len 0 terminates the data section)
//! end\n
//! ```

use crate::{Result, UuError};

use super::types::UuHeader;

/// Prefix that marks a header line
pub const BEGIN_PREFIX: &str = "begin ";

/// Exact trailer line, including its newline
pub const END_LINE: &[u8] = b"end\n";

/// Maximum number of source bytes carried by one data line
pub const MAX_LINE_BYTES: usize = 45;

/// Characters per encoded group of 3 source bytes
pub const GROUP_CHARS: usize = 4;

/// Permission bits kept from a header mode (rwx for owner/group/other)
pub const MODE_MASK: u32 = 0o777;

/// Map a 6-bit value to its printable character.
///
/// Zero becomes a backtick rather than a space so that trailing-blank
/// stripping cannot eat encoded data.
#[inline]
pub fn encode_char(value: u8) -> u8 {
    match value & 0x3F {
        0 => b'`',
        v => v + b' ',
    }
}

/// Map a character back to its 6-bit value.
///
/// Both `` ` `` and space decode to 0. Unsigned wrapping keeps bytes above
/// 0x7F inside `0..64`.
#[inline]
pub fn decode_char(c: u8) -> u8 {
    c.wrapping_sub(b' ') & 0x3F
}

/// Format the header line for `header`
pub(crate) fn format_begin(header: &UuHeader) -> Vec<u8> {
    let mut line = format!("{}{:o} ", BEGIN_PREFIX, header.mode).into_bytes();
    line.extend_from_slice(&header.raw_name);
    line.push(b'\n');
    line
}

/// Parse a `begin` line
///
/// Format: `begin <octal mode> <name>`; anything after the name is ignored.
/// The name is taken as raw bytes, so non-UTF-8 names survive.
pub(crate) fn parse_begin(line: &[u8]) -> Result<UuHeader> {
    let invalid = |what: &str| {
        UuError::InvalidHeader(format!("{} in {:?}", what, String::from_utf8_lossy(line)))
    };

    let rest = line
        .strip_prefix(BEGIN_PREFIX.as_bytes())
        .ok_or_else(|| invalid("missing begin tag"))?;

    let mut fields = rest
        .split(|b| b.is_ascii_whitespace())
        .filter(|field| !field.is_empty());

    let mode = fields
        .next()
        .and_then(|field| std::str::from_utf8(field).ok())
        .and_then(|s| u32::from_str_radix(s, 8).ok())
        .ok_or_else(|| invalid("missing octal mode"))?;

    let name = fields.next().ok_or_else(|| invalid("missing name"))?;

    Ok(UuHeader::from_raw(mode, name))
}

/// Check that a header can be written and read back unchanged
pub(crate) fn validate_header(header: &UuHeader) -> Result<()> {
    if header.mode > MODE_MASK {
        return Err(UuError::InvalidMode(header.mode));
    }
    if header.raw_name.is_empty() || header.raw_name.iter().any(|b| b.is_ascii_whitespace()) {
        return Err(UuError::InvalidName(header.name.clone()));
    }
    Ok(())
}
