use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use tracing::{debug, warn};

use crate::{Result, UuError};

use super::format::{
    BEGIN_PREFIX, END_LINE, GROUP_CHARS, MAX_LINE_BYTES, MODE_MASK, decode_char, parse_begin,
};
use super::home::HomeResolver;
use super::types::{StreamReport, UuDecoded, UuHeader};

/// Decode a single uuencoded stream held in memory
///
/// Lines before the `begin` line are skipped. Only the first stream in
/// `input` is decoded; use [`UuDecoder`] or [`decode_all`] for concatenated
/// streams.
///
/// # Example
/// ```
/// let decoded = uucodec::uu_decode(b"begin 644 cat.txt\n#0V%T\n`\nend\n").unwrap();
/// assert_eq!(decoded.data, b"Cat");
/// assert_eq!(decoded.header.name, "cat.txt");
/// ```
pub fn decode(input: &[u8]) -> Result<UuDecoded> {
    let mut decoder = UuDecoder::new(input);
    let header = decoder.next_header()?.ok_or(UuError::NoBeginLine)?;

    let mut data = Vec::with_capacity(input.len() / 4 * 3);
    decoder.decode_body(&mut data)?;

    let mut hasher = Hasher::new();
    hasher.update(&data);
    let calculated_crc32 = hasher.finalize();

    Ok(UuDecoded {
        header,
        data,
        calculated_crc32,
    })
}

/// Line-oriented decoder over a buffered reader
///
/// Walks the `begin` / data / `end` framing of one stream at a time:
/// [`next_header`](Self::next_header) finds the next `begin` line and
/// [`decode_body`](Self::decode_body) writes the data section out.
pub struct UuDecoder<R> {
    reader: R,
    line: Vec<u8>,
    /// `line` holds a line that was read but not consumed
    pending: bool,
}

impl<R: BufRead> UuDecoder<R> {
    /// Create a decoder reading from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(128),
            pending: false,
        }
    }

    /// Return the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Skip to the next `begin` line and parse it
    ///
    /// Returns `Ok(None)` when the input ends first.
    pub fn next_header(&mut self) -> Result<Option<UuHeader>> {
        while self.read_line()? {
            if !self.line.starts_with(BEGIN_PREFIX.as_bytes()) {
                continue;
            }

            let header = parse_begin(&self.line)?;

            debug!("Found begin line: mode {:o}, name {}", header.mode, header.name);
            return Ok(Some(header));
        }
        Ok(None)
    }

    /// Decode the data section after a header into `writer` and check the `end` line
    ///
    /// Bytes already written are kept when the stream turns out to be
    /// truncated or unterminated. After a write failure the rest of the data
    /// section is still read, so the decoder stays positioned for the next
    /// stream.
    ///
    /// # Returns
    /// Number of bytes written
    pub fn decode_body<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<u64> {
        self.decode_body_to(writer).map_err(|e| match e {
            BodyError::Input(e) => e,
            BodyError::Output(e) => UuError::Io(e),
        })
    }

    fn decode_body_to<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
    ) -> std::result::Result<u64, BodyError> {
        let mut decoded = Vec::with_capacity(MAX_LINE_BYTES);
        let mut total = 0u64;
        let mut write_err: Option<io::Error> = None;

        let framing = loop {
            match self.read_line() {
                Ok(true) => {}
                Ok(false) => break Err(UuError::ShortFile),
                Err(e) => break Err(e),
            }

            decoded.clear();
            match decode_line(&self.line, &mut decoded) {
                Ok(true) => {}
                Ok(false) => break self.expect_end(),
                Err(e) => break Err(e),
            }

            if write_err.is_none() {
                match writer.write_all(&decoded) {
                    Ok(()) => total += decoded.len() as u64,
                    Err(e) => write_err = Some(e),
                }
            }
        };

        if write_err.is_none() {
            write_err = writer.flush().err();
        }
        if let Some(e) = write_err {
            return Err(BodyError::Output(e));
        }
        framing.map_err(BodyError::Input)?;

        Ok(total)
    }

    /// Consume the line after the data section, which must be `end`
    fn expect_end(&mut self) -> Result<()> {
        if !self.read_line()? {
            return Err(UuError::NoEndLine);
        }
        if self.line != END_LINE {
            // Leave a following header for the next stream
            self.pending = self.line.starts_with(BEGIN_PREFIX.as_bytes());
            return Err(UuError::NoEndLine);
        }
        Ok(())
    }

    /// Read one line into `self.line`; false at end of input
    fn read_line(&mut self) -> Result<bool> {
        if self.pending {
            self.pending = false;
            return Ok(true);
        }
        self.line.clear();
        Ok(self.reader.read_until(b'\n', &mut self.line)? > 0)
    }
}

/// Side of a stream body that failed
enum BodyError {
    /// Reading or framing the encoded input
    Input(UuError),
    /// Writing the decoded bytes
    Output(io::Error),
}

/// Decode one data line, appending its bytes to `out`
///
/// Returns `Ok(false)` for the zero-length line that ends the data section.
/// An empty line counts as zero-length, since the `` ` `` may have been
/// written as a blank and stripped in transit. Characters missing from a
/// short line decode as 0 for the same reason; characters beyond the
/// declared length are ignored.
pub fn decode_line(line: &[u8], out: &mut Vec<u8>) -> Result<bool> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let Some((&len_char, data)) = line.split_first() else {
        return Ok(false);
    };

    // Masked to 0..64, so 0 is the only terminating value
    let n = decode_char(len_char) as usize;
    if n == 0 {
        return Ok(false);
    }
    if n > MAX_LINE_BYTES {
        return Err(UuError::InvalidLine(format!(
            "length {} exceeds {} bytes",
            n, MAX_LINE_BYTES
        )));
    }

    let char_at = |i: usize| data.get(i).map_or(0, |&c| decode_char(c));

    let mut remaining = n;
    let mut pos = 0;
    while remaining > 0 {
        let c0 = char_at(pos);
        let c1 = char_at(pos + 1);
        let c2 = char_at(pos + 2);
        let c3 = char_at(pos + 3);

        out.push((c0 << 2) | (c1 >> 4));
        if remaining >= 2 {
            out.push((c1 << 4) | (c2 >> 2));
        }
        if remaining >= 3 {
            out.push((c2 << 6) | c3);
        }

        remaining = remaining.saturating_sub(3);
        pos += GROUP_CHARS;
    }

    Ok(true)
}

/// Turn a header name into an output path
///
/// `~user/rest` becomes `<home of user>/rest`; other names are used as is.
/// Names are raw header bytes and need not be UTF-8.
pub fn resolve_target<H: HomeResolver + ?Sized>(name: &[u8], resolver: &H) -> Result<PathBuf> {
    let Some(tilde) = name.strip_prefix(b"~") else {
        return Ok(PathBuf::from(os_string_from_bytes(name)));
    };

    let slash = tilde
        .iter()
        .position(|&b| b == b'/')
        .ok_or_else(|| UuError::IllegalUser(String::from_utf8_lossy(name).into_owned()))?;
    let (user, rest) = (&tilde[..slash], &tilde[slash + 1..]);

    let home = std::str::from_utf8(user)
        .ok()
        .and_then(|user| resolver.resolve_home(user))
        .ok_or_else(|| UuError::NoSuchUser(String::from_utf8_lossy(user).into_owned()))?;

    let mut path = home.into_os_string();
    path.push("/");
    path.push(os_string_from_bytes(rest));
    Ok(PathBuf::from(path))
}

#[cfg(unix)]
fn os_string_from_bytes(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
fn os_string_from_bytes(bytes: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Create (or truncate) the output file and give it `mode & 0o777`
pub fn create_target(path: &Path, mode: u32) -> Result<File> {
    let target_err = |source: io::Error| UuError::Target {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(target_err)?;
    set_mode(&file, mode & MODE_MASK).map_err(target_err)?;
    Ok(file)
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    let mut permissions = file.metadata()?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    file.set_permissions(permissions)
}

/// Decode every stream in `reader` to the files named in their headers
///
/// A failing stream is reported and decoding moves on to the next `begin`
/// line, so one bad stream does not take its successors down with it. Input
/// without any stream yields a single [`UuError::NoBeginLine`] report.
///
/// # Arguments
/// * `reader` - Encoded input
/// * `source` - Label for the input in reports and logs (file name or `stdin`)
/// * `resolver` - Home directory lookup for `~user` names
pub fn decode_all<R, H>(reader: R, source: &str, resolver: &H) -> Vec<StreamReport>
where
    R: BufRead,
    H: HomeResolver + ?Sized,
{
    let mut decoder = UuDecoder::new(reader);
    let mut reports = Vec::new();

    loop {
        let index = reports.len();
        let mut report = StreamReport {
            source: source.to_string(),
            index,
            header: None,
            target: None,
            result: Ok(0),
        };

        match decoder.next_header() {
            Ok(Some(header)) => {
                let (target, result) = decode_to_target(&mut decoder, &header, resolver);
                report.header = Some(header);
                report.target = target;
                report.result = result;
            }
            Ok(None) if index == 0 => report.result = Err(UuError::NoBeginLine),
            Ok(None) => break,
            Err(e) => report.result = Err(e),
        }

        let stop = match &report.result {
            Ok(n) => {
                debug!("{}: stream {} decoded, {} bytes", source, index, n);
                false
            }
            Err(e) => {
                warn!("{}: stream {} failed: {}", source, index, e);
                // Io here only comes from reading the input; output failures
                // are reported as Target
                matches!(e, UuError::NoBeginLine | UuError::ShortFile | UuError::Io(_))
            }
        };

        reports.push(report);
        if stop {
            break;
        }
    }

    reports
}

/// Resolve, create and fill the output for one stream
fn decode_to_target<R, H>(
    decoder: &mut UuDecoder<R>,
    header: &UuHeader,
    resolver: &H,
) -> (Option<PathBuf>, Result<u64>)
where
    R: BufRead,
    H: HomeResolver + ?Sized,
{
    let path = match resolve_target(&header.raw_name, resolver) {
        Ok(path) => path,
        Err(e) => {
            skip_body(decoder);
            return (None, Err(e));
        }
    };

    let file = match create_target(&path, header.mode) {
        Ok(file) => file,
        Err(e) => {
            skip_body(decoder);
            return (Some(path), Err(e));
        }
    };
    debug!("Created {} with mode {:o}", path.display(), header.permissions());

    let mut writer = BufWriter::new(file);
    let result = decoder.decode_body_to(&mut writer).map_err(|e| match e {
        BodyError::Input(e) => e,
        BodyError::Output(source) => UuError::Target {
            path: path.clone(),
            source,
        },
    });
    (Some(path), result)
}

/// Consume a data section whose output could not be opened
fn skip_body<R: BufRead>(decoder: &mut UuDecoder<R>) {
    if let Err(e) = decoder.decode_body(&mut io::sink()) {
        debug!("Skipped stream body ended with: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        let result = decode(b"begin 644 cat.txt\n#0V%T\n`\nend\n").unwrap();
        assert_eq!(result.data, b"Cat");
        assert_eq!(result.header, UuHeader::new(0o644, "cat.txt"));
    }

    /// Writer on a full disk
    struct Full;

    impl Write for Full {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_decode_non_utf8_name() {
        let result = decode(b"begin 644 caf\xe9.txt\n#0V%T\n`\nend\n").unwrap();
        assert_eq!(result.data, b"Cat");
        assert_eq!(result.header.raw_name, b"caf\xe9.txt");
        assert_eq!(result.header.name, "caf\u{FFFD}.txt");
    }

    #[test]
    fn test_write_failure_consumes_body() {
        let input = b"begin 644 a\n#0V%T\n#0V%T\n`\nend\nbegin 600 b\n!0P``\n`\nend\n";
        let mut decoder = UuDecoder::new(&input[..]);

        decoder.next_header().unwrap().unwrap();
        assert!(matches!(decoder.decode_body(&mut Full), Err(UuError::Io(_))));

        let second = decoder.next_header().unwrap().unwrap();
        let mut out = Vec::new();
        decoder.decode_body(&mut out).unwrap();
        assert_eq!(second.name, "b");
        assert_eq!(out, b"C");
    }

    #[test]
    fn test_decode_skips_preamble() {
        let input = b"From: someone\nSubject: file\n\nbegin 600 x\n#0V%T\n`\nend\n";
        let result = decode(input).unwrap();
        assert_eq!(result.data, b"Cat");
        assert_eq!(result.header.mode, 0o600);
    }

    #[test]
    fn test_decode_crc32() {
        let result = decode(b"begin 644 cat.txt\n#0V%T\n`\nend\n").unwrap();
        let mut hasher = Hasher::new();
        hasher.update(b"Cat");
        assert_eq!(result.calculated_crc32, hasher.finalize());
    }

    #[test]
    fn test_decode_line_terminator() {
        let mut out = Vec::new();
        assert!(!decode_line(b"`\n", &mut out).unwrap());
        assert!(!decode_line(b" \n", &mut out).unwrap());
        assert!(!decode_line(b"\n", &mut out).unwrap());
        assert!(!decode_line(b"", &mut out).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn test_decode_line_high_byte_length_terminates() {
        // 0xE0 and 0x60 both mask to a length of 0
        let mut out = Vec::new();
        assert!(!decode_line(b"\xE0#0V%T\n", &mut out).unwrap());
        assert!(!decode_line(b"\x60#0V%T\n", &mut out).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn test_decode_line_high_byte_length_nonzero() {
        // 0xE3 masks to 3, same as '#'
        let mut out = Vec::new();
        assert!(decode_line(b"\xE30V%T\n", &mut out).unwrap());
        assert_eq!(out, b"Cat");
    }

    #[test]
    fn test_decode_line_partial_groups() {
        let mut out = Vec::new();
        assert!(decode_line(b"!0P``\n", &mut out).unwrap());
        assert_eq!(out, b"C");

        out.clear();
        assert!(decode_line(b"\"0V$`\n", &mut out).unwrap());
        assert_eq!(out, b"Ca");
    }

    #[test]
    fn test_decode_line_ignores_excess_groups() {
        let mut out = Vec::new();
        assert!(decode_line(b"!0P``0V%T0V%T\n", &mut out).unwrap());
        assert_eq!(out, b"C");
    }

    #[test]
    fn test_decode_line_short_line_pads_with_zero() {
        // Trailing backticks stripped in transit
        let mut out = Vec::new();
        assert!(decode_line(b"!0P\n", &mut out).unwrap());
        assert_eq!(out, b"C");
    }

    #[test]
    fn test_decode_line_rejects_oversized_length() {
        // 'N' = 46
        let mut out = Vec::new();
        assert!(matches!(
            decode_line(b"N````\n", &mut out),
            Err(UuError::InvalidLine(_))
        ));
    }

    #[test]
    fn test_decode_no_begin_line() {
        assert!(matches!(
            decode(b"hello\nworld\n"),
            Err(UuError::NoBeginLine)
        ));
        assert!(matches!(decode(b""), Err(UuError::NoBeginLine)));
    }

    #[test]
    fn test_decode_short_file() {
        assert!(matches!(
            decode(b"begin 644 x\n"),
            Err(UuError::ShortFile)
        ));
        assert!(matches!(
            decode(b"begin 644 x\n#0V%T\n"),
            Err(UuError::ShortFile)
        ));
    }

    #[test]
    fn test_decode_no_end_line() {
        assert!(matches!(
            decode(b"begin 644 x\n#0V%T\n`\n"),
            Err(UuError::NoEndLine)
        ));
        assert!(matches!(
            decode(b"begin 644 x\n#0V%T\n`\nend"),
            Err(UuError::NoEndLine)
        ));
        assert!(matches!(
            decode(b"begin 644 x\n#0V%T\n`\nEND\n"),
            Err(UuError::NoEndLine)
        ));
    }

    #[test]
    fn test_decode_body_keeps_written_bytes_on_missing_end() {
        let mut decoder = UuDecoder::new(&b"begin 644 x\n#0V%T\n`\n"[..]);
        decoder.next_header().unwrap().unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            decoder.decode_body(&mut out),
            Err(UuError::NoEndLine)
        ));
        assert_eq!(out, b"Cat");
    }

    #[test]
    fn test_decoder_reads_concatenated_streams() {
        let input = b"begin 644 a\n#0V%T\n`\nend\nnoise\nbegin 600 b\n!0P``\n`\nend\n";
        let mut decoder = UuDecoder::new(&input[..]);

        let first = decoder.next_header().unwrap().unwrap();
        let mut out = Vec::new();
        decoder.decode_body(&mut out).unwrap();
        assert_eq!(first.name, "a");
        assert_eq!(out, b"Cat");

        let second = decoder.next_header().unwrap().unwrap();
        out.clear();
        decoder.decode_body(&mut out).unwrap();
        assert_eq!(second, UuHeader::new(0o600, "b"));
        assert_eq!(out, b"C");

        assert!(decoder.next_header().unwrap().is_none());
    }

    #[test]
    fn test_missing_end_does_not_swallow_next_header() {
        let input = b"begin 644 a\n#0V%T\n`\nbegin 600 b\n!0P``\n`\nend\n";
        let mut decoder = UuDecoder::new(&input[..]);

        decoder.next_header().unwrap().unwrap();
        assert!(matches!(
            decoder.decode_body(&mut io::sink()),
            Err(UuError::NoEndLine)
        ));

        let second = decoder.next_header().unwrap().unwrap();
        assert_eq!(second.name, "b");
    }

    #[test]
    fn test_resolve_target_plain_name() {
        let resolver = |_: &str| -> Option<PathBuf> { None };
        assert_eq!(
            resolve_target(b"out/file.bin", &resolver).unwrap(),
            PathBuf::from("out/file.bin")
        );
    }

    #[test]
    fn test_resolve_target_home_relative() {
        let resolver = |user: &str| (user == "joe").then(|| PathBuf::from("/home/joe"));
        assert_eq!(
            resolve_target(b"~joe/docs/a.txt", &resolver).unwrap(),
            PathBuf::from("/home/joe/docs/a.txt")
        );
    }

    #[test]
    fn test_resolve_target_unknown_user() {
        let resolver = |_: &str| -> Option<PathBuf> { None };
        let err = resolve_target(b"~nobody/a.txt", &resolver).unwrap_err();
        assert!(matches!(&err, UuError::NoSuchUser(user) if user == "nobody"));
        assert!(err.is_resolution());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_target_non_utf8_name() {
        use std::os::unix::ffi::OsStrExt;

        let resolver = |user: &str| (user == "joe").then(|| PathBuf::from("/home/joe"));

        let plain = resolve_target(b"caf\xe9.txt", &resolver).unwrap();
        assert_eq!(plain.as_os_str().as_bytes(), b"caf\xe9.txt");

        let home = resolve_target(b"~joe/caf\xe9.txt", &resolver).unwrap();
        assert_eq!(home.as_os_str().as_bytes(), b"/home/joe/caf\xe9.txt");
    }

    #[test]
    fn test_resolve_target_non_utf8_user() {
        let resolver = |_: &str| Some(PathBuf::from("/home/x"));
        assert!(matches!(
            resolve_target(b"~j\xf6e/a.txt", &resolver),
            Err(UuError::NoSuchUser(_))
        ));
    }

    #[test]
    fn test_resolve_target_missing_slash() {
        let resolver = |_: &str| Some(PathBuf::from("/home/x"));
        assert!(matches!(
            resolve_target(b"~joe", &resolver),
            Err(UuError::IllegalUser(_))
        ));
    }
}
