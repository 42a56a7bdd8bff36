//! Body framing, codecs and readers.

pub mod chunked;
pub mod encoding;
pub mod framing;
pub mod reader;

pub use chunked::{Chunk, ChunkedBody, ChunkedDecoder, ChunkedEncoder};
pub use encoding::{BodyDecoder, DecoderSink, EncodingRegistry};
pub use framing::{BodyType, Direction};
pub use reader::{BodyReader, EagerBodyReader, LazyBodyReader};
