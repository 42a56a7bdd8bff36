//! Pluggable body decoders.
//!
//! Encoding names found in `Content-Encoding` / `Transfer-Encoding` are
//! resolved against an [`EncodingRegistry`] supplied through the parser
//! options. The registry is plain dependency injection: a name-to-decoder
//! map resolved at construction time, no runtime discovery.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::warn;

/// A byte sink that must be finalized once all input was written, so
/// decoders can flush buffered state.
pub trait DecoderSink: Write {
    fn finish(&mut self) -> io::Result<()>;
}

/// Terminal sink adapting any [`Write`]; `finish` is a flush.
pub(crate) struct TerminalSink<W: Write> {
    inner: W,
}

impl<W: Write> TerminalSink<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for TerminalSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> DecoderSink for TerminalSink<W> {
    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decoder for one content or transfer coding.
///
/// A decoder wraps a sink: encoded bytes are written into the wrapper,
/// decoded bytes come out into the wrapped sink. `finish` on the wrapper
/// must finalize this coding and then finish the inner sink.
pub trait BodyDecoder: Send + Sync {
    /// The coding name this decoder handles, e.g. `gzip`.
    fn encoding(&self) -> &str;

    /// Wraps `sink` so that writes are decoded into it.
    fn wrap<'a>(&self, sink: Box<dyn DecoderSink + 'a>) -> Box<dyn DecoderSink + 'a>;
}

/// Maps encoding names (case-insensitive) to decoders.
#[derive(Default)]
pub struct EncodingRegistry {
    decoders: HashMap<String, Arc<dyn BodyDecoder>>,
}

impl EncodingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, decoder: Arc<dyn BodyDecoder>) {
        self.decoders
            .insert(decoder.encoding().to_ascii_lowercase(), decoder);
    }

    #[must_use]
    pub fn get(&self, encoding: &str) -> Option<&Arc<dyn BodyDecoder>> {
        self.decoders.get(&encoding.to_ascii_lowercase())
    }
}

impl fmt::Debug for EncodingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}

/// Builds the decoder chain for `encodings` (listed in the order they were
/// applied by the sender) around `sink`. Writing the encoded bytes into
/// the returned sink yields fully decoded bytes in `sink`.
///
/// Unknown encodings pass through undecoded; the message itself is still
/// usable, so this logs rather than fails.
pub(crate) fn wrap_chain<'a>(
    registry: &EncodingRegistry,
    encodings: &[String],
    sink: Box<dyn DecoderSink + 'a>,
) -> Box<dyn DecoderSink + 'a> {
    let mut sink = sink;
    for encoding in encodings {
        match registry.get(encoding) {
            Some(decoder) => sink = decoder.wrap(sink),
            None => {
                warn!("no decoder registered for encoding {encoding:?}, passing through");
            }
        }
    }
    sink
}
