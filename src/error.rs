//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;

/// Result type often returned from methods that can have `rawhttp` errors.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents errors that can occur while parsing, framing or writing
/// HTTP/1.x messages.
///
/// The `Display` implementation only prints this level of error; sources
/// are exposed via `Error::source()` as erased types and must not be
/// depended on.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// The start-line of a message was malformed. Always line 1.
    StartLine(StartLine),
    /// A header field was malformed; carries the 1-based line number
    /// relative to the header section.
    Header { reason: Header, line: usize },
    /// The framing headers of a message contradict each other or are
    /// otherwise unusable.
    Framing(Framing),
    /// The chunked transfer coding was structurally invalid.
    Chunk(Chunk),
    /// Misuse of the API by the caller.
    User(User),
    /// An `io::Error` from the underlying byte source or sink.
    Io,
}

#[derive(Debug)]
pub(crate) enum StartLine {
    /// Illegal character in the method token, at this byte index.
    MethodChar(usize),
    /// Illegal character anywhere in the start-line, at this byte index.
    IllegalChar(usize),
    /// Not 2 or 3 whitespace-separated parts.
    TokenCount,
    /// Third token did not parse as a known HTTP version literal.
    Version,
    /// Only 2 tokens and version-insertion is disabled.
    MissingVersion,
    /// The request target could not be turned into a URI.
    Uri,
    /// Status code was not exactly 3 digits.
    StatusCode,
    /// No host in either the request target or a `Host` header, and
    /// host-insertion is disabled.
    MissingHost,
    /// The stream ended before a start-line was read.
    Eof,
}

#[derive(Debug)]
pub(crate) enum Header {
    /// No `:` separator before the end of the line.
    MissingColon,
    /// Illegal character in a header name, at this byte index.
    NameChar(usize),
    /// Illegal character in a header value, at this byte index.
    ValueChar(usize),
    /// Header name exceeded the configured limit.
    NameTooLong(usize),
    /// Header value exceeded the configured limit.
    ValueTooLong(usize),
    /// A bare `\r` not followed by `\n`, or the stream ended mid-line.
    LineBreak,
}

#[derive(Debug)]
pub(crate) enum Framing {
    /// More than one `Content-Length` value, identical or not.
    AmbiguousContentLength,
    /// `Content-Length` value was not a non-negative integer.
    ContentLengthInvalid,
    /// The stream ended before `Content-Length` bytes were read.
    ContentLengthMismatch { expected: u64, read: u64 },
    /// More than one `Host` header.
    AmbiguousHost,
    /// A request advertised a body it cannot frame (e.g. a
    /// `Transfer-Encoding` that does not end in `chunked`); requests may
    /// never be close-terminated.
    RequestBodyUnframed,
}

#[derive(Debug)]
pub(crate) enum Chunk {
    /// No hex digits before the chunk-size terminator.
    MissingSize,
    /// More significant hex digits than allowed.
    SizeTooLong,
    /// A byte that is neither a hex digit nor a valid terminator.
    InvalidSizeChar,
    /// Stream ended in the middle of chunk data or chunk metadata.
    UnexpectedEof,
    /// Chunk data was not terminated by CRLF.
    MissingCrlf,
    /// A chunk was requested after the terminal chunk was already read.
    Finished,
}

#[derive(Debug)]
pub(crate) enum User {
    /// A chunked-only operation was invoked on a non-chunked body.
    BodyNotChunked,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Self {
        Self {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with_cause<C: Into<Cause>>(mut self, cause: C) -> Self {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn new_start_line(reason: StartLine) -> Self {
        Self::new(Kind::StartLine(reason))
    }

    pub(crate) fn new_header(reason: Header, line: usize) -> Self {
        Self::new(Kind::Header { reason, line })
    }

    pub(crate) fn new_framing(reason: Framing) -> Self {
        Self::new(Kind::Framing(reason))
    }

    pub(crate) fn new_chunk(reason: Chunk) -> Self {
        Self::new(Kind::Chunk(reason))
    }

    pub(crate) fn new_io(cause: std::io::Error) -> Self {
        Self::new(Kind::Io).with_cause(cause)
    }

    pub(crate) fn new_body_not_chunked() -> Self {
        Self::new(Kind::User(User::BodyNotChunked))
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Returns true if the start-line of the message was malformed.
    #[must_use]
    pub fn is_malformed_start_line(&self) -> bool {
        matches!(self.inner.kind, Kind::StartLine(_))
    }

    /// Returns true if a header field was malformed.
    #[must_use]
    pub fn is_malformed_header(&self) -> bool {
        matches!(self.inner.kind, Kind::Header { .. })
    }

    /// Returns true if the message's framing headers were ambiguous or
    /// contradictory.
    #[must_use]
    pub fn is_ambiguous_framing(&self) -> bool {
        matches!(self.inner.kind, Kind::Framing(_))
    }

    /// Returns true if a chunked body was structurally invalid.
    #[must_use]
    pub fn is_invalid_chunk(&self) -> bool {
        matches!(self.inner.kind, Kind::Chunk(_))
    }

    /// Returns true if the underlying transport failed.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self.inner.kind, Kind::Io)
    }

    /// The 1-based line number the error refers to, when it refers to one.
    ///
    /// Start-line errors always report line 1; header errors report their
    /// position relative to the header section.
    #[must_use]
    pub fn line_number(&self) -> Option<usize> {
        match self.inner.kind {
            Kind::StartLine(_) => Some(1),
            Kind::Header { line, .. } => Some(line),
            _ => None,
        }
    }

    /// The 0-based byte index of the offending character, for
    /// illegal-character errors.
    #[must_use]
    pub fn char_index(&self) -> Option<usize> {
        match self.inner.kind {
            Kind::StartLine(StartLine::MethodChar(i) | StartLine::IllegalChar(i)) => Some(i),
            Kind::Header {
                reason: Header::NameChar(i) | Header::ValueChar(i),
                ..
            } => Some(i),
            _ => None,
        }
    }

    fn description(&self) -> String {
        match &self.inner.kind {
            Kind::StartLine(reason) => {
                let what = match reason {
                    StartLine::MethodChar(i) => {
                        format!("illegal character in method at index {i}")
                    }
                    StartLine::IllegalChar(i) => format!("illegal character at index {i}"),
                    StartLine::TokenCount => "expected 2 or 3 whitespace-separated parts".into(),
                    StartLine::Version => "unknown HTTP version".into(),
                    StartLine::MissingVersion => "missing HTTP version".into(),
                    StartLine::Uri => "invalid request target".into(),
                    StartLine::StatusCode => "status code must be exactly 3 digits".into(),
                    StartLine::MissingHost => "no host in request target or Host header".into(),
                    StartLine::Eof => "stream ended before a start-line".into(),
                };
                format!("invalid start-line (line 1): {what}")
            }
            Kind::Header { reason, line } => {
                let what = match reason {
                    Header::MissingColon => "missing ':' separator".into(),
                    Header::NameChar(i) => format!("illegal character in name at index {i}"),
                    Header::ValueChar(i) => format!("illegal character in value at index {i}"),
                    Header::NameTooLong(limit) => format!("name longer than {limit} bytes"),
                    Header::ValueTooLong(limit) => format!("value longer than {limit} bytes"),
                    Header::LineBreak => "invalid line break".into(),
                };
                format!("invalid header (line {line}): {what}")
            }
            Kind::Framing(reason) => match reason {
                Framing::AmbiguousContentLength => {
                    "more than one Content-Length value".into()
                }
                Framing::ContentLengthInvalid => "invalid Content-Length value".into(),
                Framing::ContentLengthMismatch { expected, read } => format!(
                    "stream ended after {read} bytes, Content-Length promised {expected}"
                ),
                Framing::AmbiguousHost => "more than one Host header".into(),
                Framing::RequestBodyUnframed => {
                    "request body cannot be framed (requests may not be close-terminated)".into()
                }
            },
            Kind::Chunk(reason) => match reason {
                Chunk::MissingSize => "missing chunk-size".into(),
                Chunk::SizeTooLong => "chunk-size has too many hex digits".into(),
                Chunk::InvalidSizeChar => "invalid character in chunk-size".into(),
                Chunk::UnexpectedEof => "stream ended inside a chunk".into(),
                Chunk::MissingCrlf => "chunk data not terminated by CRLF".into(),
                Chunk::Finished => "chunked body already fully read".into(),
            },
            Kind::User(User::BodyNotChunked) => {
                "operation requires a chunked body".into()
            }
            Kind::Io => "error reading or writing the underlying stream".into(),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("rawhttp::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new_io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_kinds() {
        let err = Error::new_header(Header::MissingColon, 3);
        assert!(err.is_malformed_header());
        assert!(!err.is_malformed_start_line());
        assert_eq!(err.line_number(), Some(3));

        let err = Error::new_start_line(StartLine::MethodChar(2));
        assert!(err.is_malformed_start_line());
        assert_eq!(err.line_number(), Some(1));
        assert_eq!(err.char_index(), Some(2));

        let err = Error::new_framing(Framing::AmbiguousContentLength);
        assert!(err.is_ambiguous_framing());
        assert_eq!(err.line_number(), None);
    }

    #[test]
    fn io_cause_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "boom");
        let err = Error::new_io(io);
        assert!(err.is_io());
        assert!(err.source().is_some());
    }
}
