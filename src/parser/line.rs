//! Byte-at-a-time metadata line parsing.
//!
//! Start-lines and header fields are read one byte at a time from the
//! underlying stream with strict per-byte validation, so that errors can
//! point at the exact offending index and so that no body byte is ever
//! consumed ahead of the framing decision. Callers wanting throughput
//! should hand in a buffered reader.

use std::io::Read;

use tracing::trace;

use crate::chars::{FIELD_VALUE_CHARS, TOKEN_CHARS, VISIBLE_CHARS};
use crate::error::{Error, Header, StartLine};
use crate::headers::{Headers, HeadersBuilder, decode_latin1};
use crate::options::HttpOptions;

pub(crate) struct LineParser<'a, R: Read> {
    inner: &'a mut R,
    options: &'a HttpOptions,
}

impl<'a, R: Read> LineParser<'a, R> {
    pub(crate) fn new(inner: &'a mut R, options: &'a HttpOptions) -> Self {
        Self { inner, options }
    }

    fn read_byte(&mut self) -> crate::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::new_io(err)),
            }
        }
    }

    fn lenient_lf(&self) -> bool {
        self.options.allow_new_line_without_return
    }

    /// Reads the start-line, optionally skipping one leading blank line.
    /// Returns the line without its terminator, decoded as Latin-1.
    pub(crate) fn read_start_line(&mut self) -> crate::Result<String> {
        let lenient_chars = self.options.allow_illegal_start_line_characters;
        let mut bytes: Vec<u8> = Vec::with_capacity(64);
        let mut may_skip_blank = self.options.ignore_leading_blank_line;
        loop {
            let Some(b) = self.read_byte()? else {
                return Err(Error::new_start_line(StartLine::Eof));
            };
            match b {
                b'\r' => {
                    match self.read_byte()? {
                        Some(b'\n') => {}
                        _ => {
                            return Err(Error::new_start_line(StartLine::IllegalChar(
                                bytes.len(),
                            )));
                        }
                    }
                    if bytes.is_empty() && may_skip_blank {
                        may_skip_blank = false;
                        continue;
                    }
                    if bytes.is_empty() {
                        return Err(Error::new_start_line(StartLine::Eof));
                    }
                    break;
                }
                b'\n' => {
                    if !self.lenient_lf() {
                        return Err(Error::new_start_line(StartLine::IllegalChar(bytes.len())));
                    }
                    if bytes.is_empty() && may_skip_blank {
                        may_skip_blank = false;
                        continue;
                    }
                    if bytes.is_empty() {
                        return Err(Error::new_start_line(StartLine::Eof));
                    }
                    break;
                }
                _ => {
                    let allowed = b == b' ' || VISIBLE_CHARS[b as usize];
                    if !allowed && !lenient_chars {
                        return Err(Error::new_start_line(StartLine::IllegalChar(bytes.len())));
                    }
                    bytes.push(b);
                }
            }
        }
        let line = decode_latin1(&bytes);
        trace!("start-line: {line:?}");
        Ok(line)
    }

    /// Parses a full header block, up to and including the blank line
    /// terminating it. Also used for chunked-body trailers.
    pub(crate) fn read_header_block(&mut self) -> crate::Result<Headers> {
        // the parser validates each byte itself, no need to re-check
        let mut builder = HeadersBuilder::skip_validation();
        let mut line = 0usize;
        loop {
            line += 1;
            match self.read_header_field(line)? {
                Some((name, value)) => {
                    // infallible with validation off
                    let _ = builder.add(name, value);
                }
                None => break,
            }
        }
        Ok(builder.build())
    }

    /// Reads one `Name: value` field; `None` signals the blank line ending
    /// the block.
    fn read_header_field(&mut self, line: usize) -> crate::Result<Option<(String, String)>> {
        let max_name = self.options.max_header_name_length;
        let max_value = self.options.max_header_value_length;

        // name, terminated by ':'
        let mut name: Vec<u8> = Vec::with_capacity(16);
        loop {
            let Some(b) = self.read_byte()? else {
                return Err(Error::new_header(Header::LineBreak, line));
            };
            match b {
                b':' => {
                    if name.is_empty() {
                        return Err(Error::new_header(Header::NameChar(0), line));
                    }
                    break;
                }
                b'\r' => {
                    match self.read_byte()? {
                        Some(b'\n') => {}
                        _ => return Err(Error::new_header(Header::LineBreak, line)),
                    }
                    if name.is_empty() {
                        return Ok(None);
                    }
                    return Err(Error::new_header(Header::MissingColon, line));
                }
                b'\n' => {
                    if !self.lenient_lf() {
                        return Err(Error::new_header(Header::LineBreak, line));
                    }
                    if name.is_empty() {
                        return Ok(None);
                    }
                    return Err(Error::new_header(Header::MissingColon, line));
                }
                _ => {
                    if !TOKEN_CHARS[b as usize] {
                        return Err(Error::new_header(Header::NameChar(name.len()), line));
                    }
                    if name.len() >= max_name {
                        return Err(Error::new_header(Header::NameTooLong(max_name), line));
                    }
                    name.push(b);
                }
            }
        }

        // value, terminated by CRLF (or bare LF when lenient)
        let mut value: Vec<u8> = Vec::with_capacity(32);
        loop {
            let Some(b) = self.read_byte()? else {
                return Err(Error::new_header(Header::LineBreak, line));
            };
            match b {
                b'\r' => match self.read_byte()? {
                    Some(b'\n') => break,
                    _ => return Err(Error::new_header(Header::LineBreak, line)),
                },
                b'\n' => {
                    if !self.lenient_lf() {
                        return Err(Error::new_header(Header::LineBreak, line));
                    }
                    break;
                }
                _ => {
                    if !FIELD_VALUE_CHARS[b as usize] {
                        return Err(Error::new_header(Header::ValueChar(value.len()), line));
                    }
                    if value.len() >= max_value {
                        return Err(Error::new_header(Header::ValueTooLong(max_value), line));
                    }
                    value.push(b);
                }
            }
        }

        let name = decode_latin1(&name);
        let value = decode_latin1(&value).trim().to_owned();
        Ok(Some((name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_headers(input: &[u8], options: &HttpOptions) -> crate::Result<Headers> {
        let mut cursor = std::io::Cursor::new(input.to_vec());
        LineParser::new(&mut cursor, options).read_header_block()
    }

    #[test]
    fn reads_simple_header_block() {
        let options = HttpOptions::default();
        let headers =
            parse_headers(b"Host: a.com\r\nAccept: */*\r\n\r\nrest", &options).unwrap();
        assert_eq!(headers.get("host"), vec!["a.com"]);
        assert_eq!(headers.get("accept"), vec!["*/*"]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn value_is_trimmed() {
        let options = HttpOptions::default();
        let headers = parse_headers(b"X:   padded \t\r\n\r\n", &options).unwrap();
        assert_eq!(headers.get("x"), vec!["padded"]);
    }

    #[test]
    fn bare_lf_requires_lenient_mode() {
        let lenient = HttpOptions::default();
        let headers = parse_headers(b"A: 1\nB: 2\n\n", &lenient).unwrap();
        assert_eq!(headers.len(), 2);

        let strict = HttpOptions::default().with_allow_new_line_without_return(false);
        let err = parse_headers(b"A: 1\n\n", &strict).unwrap_err();
        assert!(err.is_malformed_header());
    }

    #[test]
    fn missing_colon_is_reported_with_line_number() {
        let options = HttpOptions::default();
        let err = parse_headers(b"Ok: 1\r\nNoColonHere\r\n\r\n", &options).unwrap_err();
        assert!(err.is_malformed_header());
        assert_eq!(err.line_number(), Some(2));
    }

    #[test]
    fn illegal_name_byte_is_fatal_with_index() {
        let options = HttpOptions::default();
        let err = parse_headers(b"Bad Name: 1\r\n\r\n", &options).unwrap_err();
        assert!(err.is_malformed_header());
        assert_eq!(err.char_index(), Some(3));
    }

    #[test]
    fn name_and_value_limits_are_distinct_errors() {
        let options = HttpOptions::default()
            .with_max_header_name_length(4)
            .with_max_header_value_length(4);
        let err = parse_headers(b"TooLongName: 1\r\n\r\n", &options).unwrap_err();
        assert!(err.is_malformed_header());
        assert_eq!(err.char_index(), None);

        let err = parse_headers(b"N: tooolongvalue\r\n\r\n", &options).unwrap_err();
        assert!(err.is_malformed_header());
    }

    #[test]
    fn start_line_skips_single_leading_blank_line() {
        let options = HttpOptions::default();
        let mut cursor = std::io::Cursor::new(b"\r\nGET / HTTP/1.1\r\n".to_vec());
        let line = LineParser::new(&mut cursor, &options)
            .read_start_line()
            .unwrap();
        assert_eq!(line, "GET / HTTP/1.1");

        // a second blank line is not forgiven
        let mut cursor = std::io::Cursor::new(b"\r\n\r\nGET / HTTP/1.1\r\n".to_vec());
        assert!(
            LineParser::new(&mut cursor, &options)
                .read_start_line()
                .is_err()
        );
    }

    #[test]
    fn start_line_rejects_control_bytes_with_index() {
        let options = HttpOptions::default();
        let mut cursor = std::io::Cursor::new(b"GET /\x01 HTTP/1.1\r\n".to_vec());
        let err = LineParser::new(&mut cursor, &options)
            .read_start_line()
            .unwrap_err();
        assert!(err.is_malformed_start_line());
        assert_eq!(err.line_number(), Some(1));
        assert_eq!(err.char_index(), Some(5));
    }

    #[test]
    fn eof_before_start_line_is_an_error() {
        let options = HttpOptions::default();
        let mut cursor = std::io::Cursor::new(Vec::new());
        let err = LineParser::new(&mut cursor, &options)
            .read_start_line()
            .unwrap_err();
        assert!(err.is_malformed_start_line());
    }
}
