//! Chunked transfer coding: streaming decoder and encoder.
//!
//! The decoder reads `hex-size[;ext]* CRLF data CRLF` frames one at a
//! time, which makes effectively-infinite chunked streams (long-poll,
//! duplex messaging) consumable without buffering. The terminal
//! zero-length chunk is followed by a trailer header block parsed with
//! the same rules as message headers.

use std::io::{self, Read, Write};

use bytes::Bytes;
use tracing::trace;

use crate::error::{Chunk as ChunkError, Error};
use crate::headers::{Charset, Headers, HeadersBuilder, decode_latin1};
use crate::options::HttpOptions;
use crate::parser::line::LineParser;

/// Chunk-sizes with more significant hex digits than this are rejected;
/// leading zeros do not count.
const MAX_SIZE_DIGITS: usize = 7;

/// One chunk of a chunked body: optional per-chunk extensions plus data.
/// The terminal chunk has empty data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    extensions: Headers,
    data: Bytes,
}

impl Chunk {
    #[must_use]
    pub fn new(extensions: Headers, data: Bytes) -> Self {
        Self { extensions, data }
    }

    /// The terminal zero-length chunk without extensions.
    #[must_use]
    pub fn terminal() -> Self {
        Self {
            extensions: Headers::empty(),
            data: Bytes::new(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// True for the zero-length chunk terminating the body.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Extensions attached to this chunk only; never merged into the
    /// message headers.
    #[must_use]
    pub fn extensions(&self) -> &Headers {
        &self.extensions
    }

    /// Writes the wire form of this chunk. Non-terminal chunks are
    /// `<hex-size>[;ext]* CRLF data CRLF`; the terminal chunk writes only
    /// its size line, since the trailer block follows it.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{:x}", self.data.len())?;
        for (name, value) in self.extensions.iter() {
            if value.is_empty() {
                write!(out, ";{name}")?;
            } else {
                write!(out, ";{name}={value}")?;
            }
        }
        out.write_all(b"\r\n")?;
        if !self.is_terminal() {
            out.write_all(&self.data)?;
            out.write_all(b"\r\n")?;
        }
        Ok(())
    }
}

/// A fully-read chunked body: every chunk in order (terminal included)
/// plus the trailer headers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkedBody {
    chunks: Vec<Chunk>,
    trailer: Headers,
}

impl ChunkedBody {
    #[must_use]
    pub fn new(chunks: Vec<Chunk>, trailer: Headers) -> Self {
        Self { chunks, trailer }
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[must_use]
    pub fn trailer(&self) -> &Headers {
        &self.trailer
    }

    /// Total decoded size: the sum of all chunk sizes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.chunks.iter().map(Chunk::size).sum()
    }

    /// The decoded body: all chunk data concatenated in order.
    #[must_use]
    pub fn data(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.size());
        for chunk in &self.chunks {
            out.extend_from_slice(chunk.data());
        }
        Bytes::from(out)
    }

    /// Re-serializes the body in wire form, trailer included.
    pub fn write_to<W: Write>(&self, out: &mut W, charset: Charset) -> io::Result<()> {
        let mut wrote_terminal = false;
        for chunk in &self.chunks {
            chunk.write_to(out)?;
            wrote_terminal = chunk.is_terminal();
        }
        if !wrote_terminal {
            Chunk::terminal().write_to(out)?;
        }
        self.trailer.write_to(out, charset)
    }
}

/// Streaming chunked-body parser over a blocking reader.
///
/// Yields one [`Chunk`] at a time, terminal chunk last; the trailer is
/// available once the terminal chunk was read. As an [`Iterator`] it
/// fuses after the terminal chunk; calling [`ChunkedDecoder::read_chunk`]
/// past that point fails fast rather than re-reading the stream.
pub struct ChunkedDecoder<R: Read> {
    inner: R,
    options: HttpOptions,
    finished: bool,
    trailer: Option<Headers>,
}

impl<R: Read> ChunkedDecoder<R> {
    pub fn new(inner: R, options: HttpOptions) -> Self {
        Self {
            inner,
            options,
            finished: false,
            trailer: None,
        }
    }

    /// The trailer header block; `Some` only after the terminal chunk was
    /// read.
    #[must_use]
    pub fn trailer(&self) -> Option<&Headers> {
        self.trailer.as_ref()
    }

    fn read_byte(&mut self) -> crate::Result<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Err(Error::new_chunk(ChunkError::UnexpectedEof)),
                Ok(_) => return Ok(buf[0]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::new_io(err)),
            }
        }
    }

    /// Accumulates hex digits until `;` (extensions follow) or CRLF.
    fn read_chunk_size(&mut self) -> crate::Result<(usize, bool)> {
        let mut size: usize = 0;
        let mut significant = 0usize;
        let mut any_digit = false;
        loop {
            let b = self.read_byte()?;
            match b {
                b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => {
                    any_digit = true;
                    let digit = (b as char).to_digit(16).unwrap_or(0) as usize;
                    // a run of leading zeros carries no information and
                    // must not count against the digit limit
                    if !(size == 0 && digit == 0) {
                        significant += 1;
                        if significant > MAX_SIZE_DIGITS {
                            return Err(Error::new_chunk(ChunkError::SizeTooLong));
                        }
                    }
                    size = size * 16 + digit;
                }
                b';' => {
                    if !any_digit {
                        return Err(Error::new_chunk(ChunkError::MissingSize));
                    }
                    return Ok((size, true));
                }
                b'\r' => {
                    if self.read_byte()? != b'\n' {
                        return Err(Error::new_chunk(ChunkError::MissingCrlf));
                    }
                    if !any_digit {
                        return Err(Error::new_chunk(ChunkError::MissingSize));
                    }
                    return Ok((size, false));
                }
                b'\n' if self.options.allow_new_line_without_return => {
                    if !any_digit {
                        return Err(Error::new_chunk(ChunkError::MissingSize));
                    }
                    return Ok((size, false));
                }
                _ => return Err(Error::new_chunk(ChunkError::InvalidSizeChar)),
            }
        }
    }

    /// Parses `name[=value]` pairs separated by `;`, up to CRLF.
    fn read_extensions(&mut self) -> crate::Result<Headers> {
        let mut bytes: Vec<u8> = Vec::with_capacity(32);
        loop {
            let b = self.read_byte()?;
            match b {
                b'\r' => {
                    if self.read_byte()? != b'\n' {
                        return Err(Error::new_chunk(ChunkError::MissingCrlf));
                    }
                    break;
                }
                b'\n' if self.options.allow_new_line_without_return => break,
                _ => bytes.push(b),
            }
        }
        let mut builder = HeadersBuilder::skip_validation();
        for pair in decode_latin1(&bytes).split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((name, value)) => {
                    let _ = builder.add(name.trim(), value.trim());
                }
                None => {
                    let _ = builder.add(pair, "");
                }
            }
        }
        Ok(builder.build())
    }

    fn read_data(&mut self, size: usize) -> crate::Result<Bytes> {
        let mut data = vec![0u8; size];
        let mut read = 0usize;
        while read < size {
            match self.inner.read(&mut data[read..]) {
                Ok(0) => return Err(Error::new_chunk(ChunkError::UnexpectedEof)),
                Ok(n) => read += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::new_io(err)),
            }
        }
        // mandatory CRLF terminating the chunk data
        match self.read_byte()? {
            b'\r' => {
                if self.read_byte()? != b'\n' {
                    return Err(Error::new_chunk(ChunkError::MissingCrlf));
                }
            }
            b'\n' if self.options.allow_new_line_without_return => {}
            _ => return Err(Error::new_chunk(ChunkError::MissingCrlf)),
        }
        Ok(Bytes::from(data))
    }

    /// Reads the next chunk. The zero-length terminal chunk is returned
    /// as a normal chunk, after which the trailer is available; reading
    /// past it is an error.
    pub fn read_chunk(&mut self) -> crate::Result<Chunk> {
        if self.finished {
            return Err(Error::new_chunk(ChunkError::Finished));
        }
        let (size, has_extensions) = self.read_chunk_size()?;
        let extensions = if has_extensions {
            self.read_extensions()?
        } else {
            Headers::empty()
        };
        trace!("chunk: size={size} extensions={}", extensions.len());
        if size == 0 {
            let trailer =
                LineParser::new(&mut self.inner, &self.options).read_header_block()?;
            self.trailer = Some(trailer);
            self.finished = true;
            return Ok(Chunk::new(extensions, Bytes::new()));
        }
        let data = self.read_data(size)?;
        Ok(Chunk::new(extensions, data))
    }

    /// Consumes the whole body into a [`ChunkedBody`].
    pub fn read_all(mut self) -> crate::Result<ChunkedBody> {
        let mut chunks = Vec::new();
        loop {
            let chunk = self.read_chunk()?;
            let terminal = chunk.is_terminal();
            chunks.push(chunk);
            if terminal {
                break;
            }
        }
        let trailer = self.trailer.take().unwrap_or_default();
        Ok(ChunkedBody::new(chunks, trailer))
    }
}

impl<R: Read> Iterator for ChunkedDecoder<R> {
    type Item = crate::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_chunk() {
            Ok(chunk) => Some(Ok(chunk)),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Wraps an arbitrary byte stream into chunks of up to `chunk_size`
/// bytes; EOF on the source produces the terminal chunk.
pub struct ChunkedEncoder<R: Read> {
    src: R,
    chunk_size: usize,
    done: bool,
}

impl<R: Read> ChunkedEncoder<R> {
    pub fn new(src: R, chunk_size: usize) -> Self {
        Self {
            src,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }

    /// Produces the next chunk, filling up to `chunk_size` bytes from the
    /// source; `None` after the terminal chunk was produced.
    pub fn read_chunk(&mut self) -> crate::Result<Option<Chunk>> {
        if self.done {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.src.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::new_io(err)),
            }
        }
        if filled == 0 {
            self.done = true;
            return Ok(Some(Chunk::terminal()));
        }
        buf.truncate(filled);
        Ok(Some(Chunk::new(Headers::empty(), Bytes::from(buf))))
    }

    /// Writes the whole source as a chunked stream, terminal chunk and
    /// empty trailer included.
    pub fn write_to<W: Write>(mut self, out: &mut W) -> crate::Result<()> {
        while let Some(chunk) = self.read_chunk()? {
            chunk.write_to(out).map_err(Error::new_io)?;
            if chunk.is_terminal() {
                out.write_all(b"\r\n").map_err(Error::new_io)?;
            }
        }
        Ok(())
    }
}

impl<R: Read> Iterator for ChunkedEncoder<R> {
    type Item = crate::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decoder(input: &[u8]) -> ChunkedDecoder<Cursor<Vec<u8>>> {
        ChunkedDecoder::new(Cursor::new(input.to_vec()), HttpOptions::default())
    }

    #[test]
    fn decodes_simple_body() {
        let body = decoder(b"5\r\nHello\r\n0\r\n\r\n").read_all().unwrap();
        assert_eq!(body.data(), Bytes::from_static(b"Hello"));
        assert_eq!(body.chunks().len(), 2);
        assert!(body.chunks()[1].is_terminal());
        assert!(body.trailer().is_empty());
    }

    #[test]
    fn leading_zeros_do_not_count_as_significant_digits() {
        let body = decoder(b"000001\r\nx\r\n0\r\n\r\n").read_all().unwrap();
        assert_eq!(body.data(), Bytes::from_static(b"x"));
    }

    #[test]
    fn too_many_significant_digits_is_rejected() {
        // 8 significant digits
        let err = decoder(b"10000000\r\n").read_all().unwrap_err();
        assert!(err.is_invalid_chunk());
        // 7 significant digits with leading zeros is fine size-wise
        let mut dec = decoder(b"0001000000\r\n");
        assert!(dec.read_chunk_size().is_ok());
    }

    #[test]
    fn missing_chunk_size_is_rejected() {
        let err = decoder(b"\r\n").read_all().unwrap_err();
        assert!(err.is_invalid_chunk());
        let err = decoder(b";ext\r\n").read_all().unwrap_err();
        assert!(err.is_invalid_chunk());
    }

    #[test]
    fn hex_size_is_case_insensitive() {
        let body = decoder(b"A\r\n0123456789\r\n0\r\n\r\n").read_all().unwrap();
        assert_eq!(body.data().len(), 10);
        let body = decoder(b"a\r\n0123456789\r\n0\r\n\r\n").read_all().unwrap();
        assert_eq!(body.data().len(), 10);
    }

    #[test]
    fn extensions_are_attached_to_their_chunk_only() {
        let body = decoder(b"5;speed=fast; note\r\nHello\r\n0\r\n\r\n")
            .read_all()
            .unwrap();
        let ext = body.chunks()[0].extensions();
        assert_eq!(ext.get_first("speed"), Some("fast"));
        assert!(ext.contains("note"));
        assert!(body.chunks()[1].extensions().is_empty());
    }

    #[test]
    fn terminal_chunk_extensions_are_still_parsed() {
        let body = decoder(b"0;closing=yes\r\n\r\n").read_all().unwrap();
        assert_eq!(body.chunks()[0].extensions().get_first("closing"), Some("yes"));
    }

    #[test]
    fn trailer_headers_are_parsed() {
        let body = decoder(b"5\r\nHello\r\n0\r\nX-Trailer: done\r\n\r\n")
            .read_all()
            .unwrap();
        assert_eq!(body.trailer().get_first("x-trailer"), Some("done"));
    }

    #[test]
    fn eof_mid_chunk_is_fatal() {
        let err = decoder(b"a\r\nhal").read_all().unwrap_err();
        assert!(err.is_invalid_chunk());
    }

    #[test]
    fn missing_crlf_after_data_is_fatal() {
        let err = decoder(b"5\r\nHelloX0\r\n\r\n").read_all().unwrap_err();
        assert!(err.is_invalid_chunk());
    }

    #[test]
    fn bare_lf_accepted_only_in_lenient_mode() {
        let body = decoder(b"5\nHello\n0\n\n").read_all().unwrap();
        assert_eq!(body.data(), Bytes::from_static(b"Hello"));

        let strict = HttpOptions::default().with_allow_new_line_without_return(false);
        let err = ChunkedDecoder::new(Cursor::new(b"5\nHello\n0\n\n".to_vec()), strict)
            .read_all()
            .unwrap_err();
        assert!(err.is_invalid_chunk());
    }

    #[test]
    fn iterator_yields_terminal_chunk_then_fuses() {
        let mut dec = decoder(b"5\r\nHello\r\n0\r\n\r\n");
        let first = dec.next().unwrap().unwrap();
        assert_eq!(first.data(), &Bytes::from_static(b"Hello"));
        let last = dec.next().unwrap().unwrap();
        assert!(last.is_terminal());
        assert!(dec.next().is_none());
        assert!(dec.read_chunk().is_err());
        assert_eq!(dec.trailer().map(Headers::len), Some(0));
    }

    #[test]
    fn encoder_chunks_at_requested_size() {
        let encoder = ChunkedEncoder::new(Cursor::new(b"Hello RawHTTP".to_vec()), 4);
        let chunks: Vec<Chunk> = encoder.map(|c| c.unwrap()).collect();
        let sizes: Vec<usize> = chunks.iter().map(Chunk::size).collect();
        assert_eq!(sizes, vec![4, 4, 4, 1, 0]);
        assert_eq!(chunks[0].data(), &Bytes::from_static(b"Hell"));
        assert_eq!(chunks[3].data(), &Bytes::from_static(b"P"));
        assert!(chunks[4].is_terminal());
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let mut wire = Vec::new();
        ChunkedEncoder::new(Cursor::new(b"Hello RawHTTP".to_vec()), 4)
            .write_to(&mut wire)
            .unwrap();
        let body = decoder(&wire).read_all().unwrap();
        assert_eq!(body.data(), Bytes::from_static(b"Hello RawHTTP"));
        let sizes: Vec<usize> = body.chunks().iter().map(Chunk::size).collect();
        assert_eq!(sizes, vec![4, 4, 4, 1, 0]);
    }

    #[test]
    fn chunk_wire_form() {
        let mut out = Vec::new();
        Chunk::new(Headers::empty(), Bytes::from_static(b"Hello"))
            .write_to(&mut out)
            .unwrap();
        assert_eq!(out, b"5\r\nHello\r\n");

        let mut out = Vec::new();
        let mut ext = HeadersBuilder::skip_validation();
        ext.add("speed", "fast").unwrap();
        Chunk::new(ext.build(), Bytes::from_static(b"abcdefghijkl"))
            .write_to(&mut out)
            .unwrap();
        assert_eq!(out, b"c;speed=fast\r\nabcdefghijkl\r\n");
    }

    #[test]
    fn chunked_body_serialization_includes_trailer() {
        let body = decoder(b"5\r\nHello\r\n0\r\nX-Done: 1\r\n\r\n")
            .read_all()
            .unwrap();
        let mut out = Vec::new();
        body.write_to(&mut out, Charset::default()).unwrap();
        assert_eq!(out, b"5\r\nHello\r\n0\r\nX-Done: 1\r\n\r\n");
    }
}
