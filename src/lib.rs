//! A low-level, blocking HTTP/1.x message engine.
//!
//! This crate parses and serializes HTTP/1.x messages while keeping the
//! details most HTTP libraries normalize away: header casing and order,
//! chunk boundaries, chunk extensions and trailers all survive a
//! parse/serialize round trip. Parsing is synchronous and byte-exact over
//! any [`std::io::Read`], which makes it suitable for tooling that needs
//! to observe, replay or deliberately malform traffic rather than just
//! exchange it.
//!
//! The entry point is [`RawHttp`]:
//!
//! ```
//! use rawhttp::RawHttp;
//!
//! let http = RawHttp::new();
//! let mut response = http.parse_response_str(
//!     "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello",
//! )?;
//! assert!(response.is_success());
//! let body = response.take_body_bytes()?;
//! assert_eq!(&body[..], b"hello");
//! # Ok::<(), rawhttp::Error>(())
//! ```
//!
//! Strictness is configurable per parser via [`HttpOptions`]: bare-LF
//! line endings, missing HTTP versions and illegal start-line characters
//! can each be tolerated or rejected. Bodies are lazy by default; they
//! hold the live stream and are consumed at most once, enforced by
//! ownership rather than runtime flags.

mod chars;
mod error;
mod options;
mod parser;

pub mod body;
pub mod headers;
pub mod message;
pub mod proto;

pub use body::{
    BodyDecoder, BodyReader, BodyType, Chunk, ChunkedBody, ChunkedDecoder, ChunkedEncoder,
    DecoderSink, EagerBodyReader, EncodingRegistry, LazyBodyReader,
};
pub use error::{Error, Result};
pub use headers::{Charset, Headers, HeadersBuilder};
pub use message::{Request, Response};
pub use options::{HeaderValidator, HttpOptions};
pub use parser::RawHttp;
pub use proto::{HttpVersion, RequestLine, StatusLine, Uri};
