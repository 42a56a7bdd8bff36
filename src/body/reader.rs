//! Lazy and eager body readers.
//!
//! A [`LazyBodyReader`] wraps the live stream left over after the message
//! head was parsed; it is move-only, and every consuming operation takes
//! it by value, so a body can never be read twice (the stream behind it
//! only exists once). An [`EagerBodyReader`] is fully buffered, cloneable
//! and survives the connection closing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{self, Read, Write};

use bytes::Bytes;

use crate::body::chunked::{ChunkedBody, ChunkedDecoder};
use crate::body::encoding::{self, TerminalSink};
use crate::body::framing::BodyType;
use crate::error::{Error, Framing};
use crate::headers::Headers;
use crate::options::HttpOptions;

const COPY_BUF_SIZE: usize = 8 * 1024;

/// Either variant gives access to raw framed bytes, decoded bytes and
/// (for chunked bodies) the structured chunk list.
pub enum BodyReader {
    Lazy(LazyBodyReader),
    Eager(EagerBodyReader),
}

impl BodyReader {
    #[must_use]
    pub fn framing(&self) -> &BodyType {
        match self {
            Self::Lazy(lazy) => lazy.framing(),
            Self::Eager(eager) => eager.framing(),
        }
    }

    /// Forces full consumption into an eager reader. Idempotent: an
    /// already-eager reader is returned as-is.
    pub fn eager(self) -> crate::Result<EagerBodyReader> {
        match self {
            Self::Lazy(lazy) => lazy.eager(),
            Self::Eager(eager) => Ok(eager),
        }
    }

    /// Streams the framed-but-undecoded bytes to `out`.
    pub fn write_to<W: Write>(self, out: &mut W) -> crate::Result<()> {
        match self {
            Self::Lazy(lazy) => lazy.write_to(out),
            Self::Eager(eager) => eager.write_to(out),
        }
    }

    /// Streams the body to `out` with framing removed and the decoder
    /// chain applied.
    pub fn write_decoded_to<W: Write>(self, out: &mut W) -> crate::Result<()> {
        match self {
            Self::Lazy(lazy) => lazy.write_decoded_to(out),
            Self::Eager(eager) => eager.write_decoded_to(out),
        }
    }

    /// The unframed, decoded body bytes.
    pub fn decoded_bytes(self) -> crate::Result<Bytes> {
        match self {
            Self::Lazy(lazy) => lazy.decoded_bytes(),
            Self::Eager(eager) => eager.decoded_bytes(),
        }
    }

    /// The structured chunk list plus trailer. Fails unless the framing
    /// is chunked.
    pub fn into_chunked_body(self) -> crate::Result<ChunkedBody> {
        match self {
            Self::Lazy(lazy) => lazy.into_chunked_body(),
            Self::Eager(eager) => eager
                .into_chunked_body()
                .ok_or_else(Error::new_body_not_chunked),
        }
    }
}

impl fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lazy(lazy) => lazy.fmt(f),
            Self::Eager(eager) => eager.fmt(f),
        }
    }
}

impl From<EagerBodyReader> for BodyReader {
    fn from(eager: EagerBodyReader) -> Self {
        Self::Eager(eager)
    }
}

/// Stream-backed, single-consumption body reader.
///
/// Must not be shared across threads or call sites: consuming operations
/// take `self` by value, and dropping it drops (closes) the stream.
pub struct LazyBodyReader {
    framing: BodyType,
    stream: Box<dyn Read>,
    options: HttpOptions,
}

impl LazyBodyReader {
    #[must_use]
    pub fn new(framing: BodyType, stream: Box<dyn Read>, options: HttpOptions) -> Self {
        Self {
            framing,
            stream,
            options,
        }
    }

    #[must_use]
    pub fn framing(&self) -> &BodyType {
        &self.framing
    }

    /// Fully consumes the stream into an [`EagerBodyReader`].
    pub fn eager(self) -> crate::Result<EagerBodyReader> {
        let Self {
            framing,
            mut stream,
            options,
        } = self;
        match &framing {
            BodyType::ContentLength {
                length,
                allow_mismatch,
            } => {
                let mut raw = Vec::with_capacity(usize::try_from(*length).unwrap_or(0));
                copy_exact(&mut stream, &mut raw, *length, *allow_mismatch)?;
                Ok(EagerBodyReader {
                    framing,
                    raw: Bytes::from(raw),
                    chunked: None,
                    options,
                })
            }
            BodyType::Chunked { .. } => {
                let body = ChunkedDecoder::new(stream, options.clone()).read_all()?;
                let mut raw = Vec::with_capacity(body.size() + 64);
                body.write_to(&mut raw, options.header_values_charset())
                    .map_err(Error::new_io)?;
                Ok(EagerBodyReader {
                    framing,
                    raw: Bytes::from(raw),
                    chunked: Some(body),
                    options,
                })
            }
            BodyType::CloseTerminated { .. } => {
                let mut raw = Vec::new();
                stream.read_to_end(&mut raw).map_err(Error::new_io)?;
                Ok(EagerBodyReader {
                    framing,
                    raw: Bytes::from(raw),
                    chunked: None,
                    options,
                })
            }
        }
    }

    /// Streams the raw framed bytes to `out` without buffering the whole
    /// body. For chunked bodies each chunk is re-framed as it arrives.
    pub fn write_to<W: Write>(self, out: &mut W) -> crate::Result<()> {
        let Self {
            framing,
            mut stream,
            options,
        } = self;
        match framing {
            BodyType::ContentLength {
                length,
                allow_mismatch,
            } => {
                copy_exact(&mut stream, out, length, allow_mismatch)?;
                Ok(())
            }
            BodyType::Chunked { .. } => {
                let mut decoder = ChunkedDecoder::new(stream, options.clone());
                loop {
                    let chunk = decoder.read_chunk()?;
                    chunk.write_to(out).map_err(Error::new_io)?;
                    if chunk.is_terminal() {
                        break;
                    }
                }
                let trailer = decoder.trailer().cloned().unwrap_or_default();
                trailer
                    .write_to(out, options.header_values_charset())
                    .map_err(Error::new_io)
            }
            BodyType::CloseTerminated { .. } => copy_until_eof(&mut stream, out),
        }
    }

    /// Streams the body to `out`, unframed, with the decoder chain
    /// applied and finalized.
    pub fn write_decoded_to<W: Write>(self, out: &mut W) -> crate::Result<()> {
        let Self {
            framing,
            mut stream,
            options,
        } = self;
        match framing {
            BodyType::ContentLength {
                length,
                allow_mismatch,
            } => {
                copy_exact(&mut stream, out, length, allow_mismatch)?;
                Ok(())
            }
            BodyType::Chunked { ref encodings } => {
                let mut sink = encoding::wrap_chain(
                    options.encodings(),
                    encodings,
                    Box::new(TerminalSink::new(&mut *out)),
                );
                let mut decoder = ChunkedDecoder::new(stream, options.clone());
                loop {
                    let chunk = decoder.read_chunk()?;
                    if chunk.is_terminal() {
                        break;
                    }
                    sink.write_all(chunk.data()).map_err(Error::new_io)?;
                }
                sink.finish().map_err(Error::new_io)
            }
            BodyType::CloseTerminated { ref encodings } => {
                let mut sink = encoding::wrap_chain(
                    options.encodings(),
                    encodings,
                    Box::new(TerminalSink::new(&mut *out)),
                );
                copy_until_eof(&mut stream, &mut sink)?;
                sink.finish().map_err(Error::new_io)
            }
        }
    }

    /// The unframed, decoded body bytes.
    pub fn decoded_bytes(self) -> crate::Result<Bytes> {
        let mut out = Vec::new();
        self.write_decoded_to(&mut out)?;
        Ok(Bytes::from(out))
    }

    /// Consumes the stream into a structured chunk list plus trailer.
    /// Fails unless the framing is chunked.
    pub fn into_chunked_body(self) -> crate::Result<ChunkedBody> {
        match self.framing {
            BodyType::Chunked { .. } => {
                ChunkedDecoder::new(self.stream, self.options).read_all()
            }
            _ => Err(Error::new_body_not_chunked()),
        }
    }
}

impl fmt::Debug for LazyBodyReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyBodyReader")
            .field("framing", &self.framing)
            .finish_non_exhaustive()
    }
}

/// Fully-buffered body reader. Cheap to clone; equality and hashing are
/// over the raw byte content.
#[derive(Clone)]
pub struct EagerBodyReader {
    framing: BodyType,
    raw: Bytes,
    chunked: Option<ChunkedBody>,
    options: HttpOptions,
}

impl EagerBodyReader {
    /// A reader over in-memory bytes, framed as their exact length.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let raw = bytes.into();
        Self {
            framing: BodyType::ContentLength {
                length: raw.len() as u64,
                allow_mismatch: false,
            },
            raw,
            chunked: None,
            options: HttpOptions::default(),
        }
    }

    #[must_use]
    pub fn framing(&self) -> &BodyType {
        &self.framing
    }

    /// The framed-but-undecoded bytes.
    #[must_use]
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The unframed, decoded body bytes.
    pub fn decoded_bytes(&self) -> crate::Result<Bytes> {
        match (&self.framing, &self.chunked) {
            (BodyType::Chunked { encodings }, Some(body)) => {
                apply_chain(&self.options, encodings, &body.data())
            }
            (BodyType::CloseTerminated { encodings }, _) => {
                apply_chain(&self.options, encodings, &self.raw)
            }
            _ => Ok(self.raw.clone()),
        }
    }

    /// The structured chunk list, when this body was chunked.
    #[must_use]
    pub fn chunked_body(&self) -> Option<&ChunkedBody> {
        self.chunked.as_ref()
    }

    #[must_use]
    pub(crate) fn into_chunked_body(self) -> Option<ChunkedBody> {
        self.chunked
    }

    /// Trailer headers, when this body was chunked.
    #[must_use]
    pub fn trailer(&self) -> Option<&Headers> {
        self.chunked.as_ref().map(ChunkedBody::trailer)
    }

    /// Writes the raw framed bytes to `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> crate::Result<()> {
        out.write_all(&self.raw).map_err(Error::new_io)
    }

    /// Writes the decoded body bytes to `out`.
    pub fn write_decoded_to<W: Write>(&self, out: &mut W) -> crate::Result<()> {
        let decoded = self.decoded_bytes()?;
        out.write_all(&decoded).map_err(Error::new_io)
    }
}

fn apply_chain(
    options: &HttpOptions,
    encodings: &[String],
    input: &[u8],
) -> crate::Result<Bytes> {
    if encodings.is_empty() {
        return Ok(Bytes::copy_from_slice(input));
    }
    let mut out = Vec::with_capacity(input.len());
    {
        let mut sink = encoding::wrap_chain(
            options.encodings(),
            encodings,
            Box::new(TerminalSink::new(&mut out)),
        );
        sink.write_all(input).map_err(Error::new_io)?;
        sink.finish().map_err(Error::new_io)?;
    }
    Ok(Bytes::from(out))
}

impl PartialEq for EagerBodyReader {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for EagerBodyReader {}

impl Hash for EagerBodyReader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for EagerBodyReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerBodyReader")
            .field("framing", &self.framing)
            .field("len", &self.raw.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for EagerBodyReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.raw))
    }
}

/// Copies exactly `length` bytes; a stream ending early is a framing
/// error unless mismatches are allowed.
fn copy_exact<R: Read + ?Sized, W: Write>(
    reader: &mut R,
    out: &mut W,
    length: u64,
    allow_mismatch: bool,
) -> crate::Result<u64> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut copied: u64 = 0;
    while copied < length {
        let want = usize::try_from((length - copied).min(COPY_BUF_SIZE as u64)).unwrap_or(0);
        match reader.read(&mut buf[..want]) {
            Ok(0) => {
                if allow_mismatch {
                    return Ok(copied);
                }
                return Err(Error::new_framing(Framing::ContentLengthMismatch {
                    expected: length,
                    read: copied,
                }));
            }
            Ok(n) => {
                out.write_all(&buf[..n]).map_err(Error::new_io)?;
                copied += n as u64;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(Error::new_io(err)),
        }
    }
    Ok(copied)
}

fn copy_until_eof<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    out: &mut W,
) -> crate::Result<()> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => out.write_all(&buf[..n]).map_err(Error::new_io)?,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(Error::new_io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lazy(framing: BodyType, input: &[u8]) -> LazyBodyReader {
        LazyBodyReader::new(
            framing,
            Box::new(Cursor::new(input.to_vec())),
            HttpOptions::default(),
        )
    }

    #[test]
    fn content_length_eager_reads_exactly() {
        let reader = lazy(
            BodyType::ContentLength {
                length: 5,
                allow_mismatch: false,
            },
            b"HelloMore",
        );
        let eager = reader.eager().unwrap();
        assert_eq!(eager.raw_bytes(), b"Hello");
        assert_eq!(eager.decoded_bytes().unwrap(), Bytes::from_static(b"Hello"));
    }

    #[test]
    fn short_content_length_stream_is_an_error() {
        let reader = lazy(
            BodyType::ContentLength {
                length: 10,
                allow_mismatch: false,
            },
            b"Hello",
        );
        let err = reader.eager().unwrap_err();
        assert!(err.is_ambiguous_framing());
    }

    #[test]
    fn short_stream_tolerated_when_mismatch_allowed() {
        let reader = lazy(
            BodyType::ContentLength {
                length: 10,
                allow_mismatch: true,
            },
            b"Hello",
        );
        let eager = reader.eager().unwrap();
        assert_eq!(eager.raw_bytes(), b"Hello");
    }

    #[test]
    fn chunked_eager_keeps_structure_and_raw_frames() {
        let reader = lazy(
            BodyType::Chunked {
                encodings: Vec::new(),
            },
            b"5\r\nHello\r\n0\r\nX-T: 1\r\n\r\n",
        );
        let eager = reader.eager().unwrap();
        assert_eq!(eager.decoded_bytes().unwrap(), Bytes::from_static(b"Hello"));
        assert_eq!(eager.raw_bytes(), b"5\r\nHello\r\n0\r\nX-T: 1\r\n\r\n");
        assert_eq!(eager.trailer().unwrap().get_first("x-t"), Some("1"));
    }

    #[test]
    fn close_terminated_reads_to_eof() {
        let reader = lazy(
            BodyType::CloseTerminated {
                encodings: Vec::new(),
            },
            b"everything until the end",
        );
        let eager = reader.eager().unwrap();
        assert_eq!(eager.raw_bytes(), b"everything until the end");
    }

    #[test]
    fn write_decoded_to_unframes_chunked() {
        let reader = lazy(
            BodyType::Chunked {
                encodings: Vec::new(),
            },
            b"3\r\nabc\r\n3\r\ndef\r\n0\r\n\r\n",
        );
        let mut out = Vec::new();
        reader.write_decoded_to(&mut out).unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[test]
    fn write_to_preserves_chunk_frames() {
        let reader = lazy(
            BodyType::Chunked {
                encodings: Vec::new(),
            },
            b"3\r\nabc\r\n0\r\n\r\n",
        );
        let mut out = Vec::new();
        reader.write_to(&mut out).unwrap();
        assert_eq!(out, b"3\r\nabc\r\n0\r\n\r\n");
    }

    #[test]
    fn into_chunked_body_requires_chunked_framing() {
        let reader = lazy(
            BodyType::ContentLength {
                length: 2,
                allow_mismatch: false,
            },
            b"ab",
        );
        assert!(reader.into_chunked_body().is_err());
    }

    #[test]
    fn eager_reader_equality_and_display() {
        let a = EagerBodyReader::from_bytes(&b"hello"[..]);
        let b = EagerBodyReader::from_bytes(b"hello".to_vec());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "hello");
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn eager_is_idempotent_through_body_reader() {
        let eager = EagerBodyReader::from_bytes(&b"x"[..]);
        let reader = BodyReader::from(eager.clone());
        assert_eq!(reader.eager().unwrap(), eager);
    }
}
