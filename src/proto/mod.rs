//! Wire-level HTTP/1.x value types: versions, start-lines and the minimal
//! request-target URI model they carry.

pub mod startline;
pub mod uri;

pub use startline::{HttpVersion, RequestLine, StatusLine, canonical_reason};
pub use uri::Uri;
