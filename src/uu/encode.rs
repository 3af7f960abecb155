use std::io::{self, Read, Write};

use tracing::debug;

use crate::{Result, UuError};

use super::format::{
    END_LINE, GROUP_CHARS, MAX_LINE_BYTES, encode_char, format_begin, validate_header,
};
use super::types::UuHeader;

/// Encode binary data to uuencode format
///
/// # Arguments
/// * `data` - Binary data to encode
/// * `mode` - Permission bits recorded in the header (`0..=0o777`)
/// * `name` - Name the decoder will create
///
/// # Returns
/// The complete encoded stream: `begin` line, data lines, terminator, `end` line
///
/// # Example
/// ```
/// let encoded = uucodec::uu_encode(b"Cat", 0o644, "cat.txt").unwrap();
/// assert_eq!(encoded, b"begin 644 cat.txt\n#0V%T\n`\nend\n");
/// ```
pub fn encode(data: &[u8], mode: u32, name: &str) -> Result<Vec<u8>> {
    let header = UuHeader::new(mode, name);
    let mut output = Vec::with_capacity(header.raw_name.len() + 16 + encoded_len(data.len()));
    let mut reader = data;
    encode_stream(&mut reader, &mut output, &header)?;
    Ok(output)
}

/// Encode everything `reader` yields into `writer`
///
/// Reads the source 45 bytes at a time and writes one data line per chunk.
/// Any read or write failure aborts the whole stream.
///
/// # Returns
/// Number of source bytes encoded
pub fn encode_stream<R, W>(reader: &mut R, writer: &mut W, header: &UuHeader) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    validate_header(header)?;
    writer.write_all(&format_begin(header))?;

    let mut chunk = [0u8; MAX_LINE_BYTES];
    let mut line = Vec::with_capacity(line_len(MAX_LINE_BYTES));
    let mut total = 0u64;

    loop {
        let n = read_chunk(reader, &mut chunk)?;
        if n == 0 {
            break;
        }

        line.clear();
        encode_line(&chunk[..n], &mut line)?;
        writer.write_all(&line)?;
        total += n as u64;

        // A short chunk means the source is exhausted
        if n < MAX_LINE_BYTES {
            break;
        }
    }

    // Zero-length line ends the data section
    line.clear();
    encode_line(&[], &mut line)?;
    writer.write_all(&line)?;
    writer.write_all(END_LINE)?;
    writer.flush()?;

    debug!("Encoded {} bytes as {} (mode {:o})", total, header.name, header.mode);
    Ok(total)
}

/// Encode one data line of at most 45 bytes, newline included
///
/// Each group of 3 bytes becomes 4 characters. A trailing group of 1 or 2
/// bytes is padded with zeros and still takes 4 characters; the length
/// character tells the decoder how many bytes are real.
pub fn encode_line(chunk: &[u8], out: &mut Vec<u8>) -> Result<()> {
    if chunk.len() > MAX_LINE_BYTES {
        return Err(UuError::InvalidLine(format!(
            "{} bytes exceed the {} byte line capacity",
            chunk.len(),
            MAX_LINE_BYTES
        )));
    }

    out.push(encode_char(chunk.len() as u8));
    for group in chunk.chunks(3) {
        let b0 = group[0];
        let b1 = group.get(1).copied().unwrap_or(0);
        let b2 = group.get(2).copied().unwrap_or(0);

        out.extend_from_slice(&[
            encode_char(b0 >> 2),
            encode_char(((b0 << 4) | (b1 >> 4)) & 0x3F),
            encode_char(((b1 << 2) | (b2 >> 6)) & 0x3F),
            encode_char(b2 & 0x3F),
        ]);
    }
    out.push(b'\n');

    Ok(())
}

/// Size of the data section (data lines, terminator and `end` line) for `len` source bytes
pub fn encoded_len(len: usize) -> usize {
    let full = len / MAX_LINE_BYTES;
    let rem = len % MAX_LINE_BYTES;
    let partial = if rem > 0 { line_len(rem) } else { 0 };
    full * line_len(MAX_LINE_BYTES) + partial + line_len(0) + END_LINE.len()
}

/// Length of one encoded data line carrying `n` bytes, newline included
fn line_len(n: usize) -> usize {
    1 + n.div_ceil(3) * GROUP_CHARS + 1
}

/// Fill `buf` from `reader`, stopping early only at end of input
fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
