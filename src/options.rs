//! Parser configuration surface.

use std::fmt;
use std::sync::Arc;

use crate::body::encoding::EncodingRegistry;
use crate::headers::{Charset, Headers};

/// Callback invoked once all headers of a message are parsed.
pub type HeaderValidator = dyn Fn(&Headers) -> crate::Result<()> + Send + Sync;

/// Options controlling leniency, limits and pluggable behavior of the
/// message parser. Built with consuming `with_*` methods:
///
/// ```
/// use rawhttp::HttpOptions;
///
/// let options = HttpOptions::default()
///     .with_insert_host_header(false)
///     .with_max_header_value_length(16 * 1024);
/// ```
#[derive(Clone)]
pub struct HttpOptions {
    pub(crate) insert_host_header: bool,
    pub(crate) insert_http_version: bool,
    pub(crate) allow_new_line_without_return: bool,
    pub(crate) ignore_leading_blank_line: bool,
    pub(crate) allow_illegal_start_line_characters: bool,
    pub(crate) allow_content_length_mismatch: bool,
    pub(crate) max_header_name_length: usize,
    pub(crate) max_header_value_length: usize,
    pub(crate) header_values_charset: Charset,
    pub(crate) header_validator: Arc<HeaderValidator>,
    pub(crate) encodings: Arc<EncodingRegistry>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            insert_host_header: true,
            insert_http_version: true,
            allow_new_line_without_return: true,
            ignore_leading_blank_line: true,
            allow_illegal_start_line_characters: false,
            allow_content_length_mismatch: false,
            max_header_name_length: 1000,
            max_header_value_length: 4000,
            header_values_charset: Charset::default(),
            header_validator: Arc::new(|_| Ok(())),
            encodings: Arc::new(EncodingRegistry::new()),
        }
    }
}

impl HttpOptions {
    /// Synthesize a `Host` header from the request target when none is
    /// present. Default: enabled.
    #[must_use]
    pub fn with_insert_host_header(mut self, enable: bool) -> Self {
        self.insert_host_header = enable;
        self
    }

    /// Default a 2-token request-line to HTTP/1.1 instead of failing.
    /// Default: enabled.
    #[must_use]
    pub fn with_insert_http_version(mut self, enable: bool) -> Self {
        self.insert_http_version = enable;
        self
    }

    /// Accept a bare `\n` as a line terminator. Default: enabled.
    #[must_use]
    pub fn with_allow_new_line_without_return(mut self, enable: bool) -> Self {
        self.allow_new_line_without_return = enable;
        self
    }

    /// Skip one blank line before the start-line, a robustness
    /// recommendation of the HTTP spec. Default: enabled.
    #[must_use]
    pub fn with_ignore_leading_blank_line(mut self, enable: bool) -> Self {
        self.ignore_leading_blank_line = enable;
        self
    }

    /// Best-effort parsing of start-lines with embedded spaces in the
    /// target. Default: disabled.
    #[must_use]
    pub fn with_allow_illegal_start_line_characters(mut self, enable: bool) -> Self {
        self.allow_illegal_start_line_characters = enable;
        self
    }

    /// Return the bytes read so far instead of failing when a stream ends
    /// before `Content-Length` bytes. Default: disabled.
    #[must_use]
    pub fn with_allow_content_length_mismatch(mut self, enable: bool) -> Self {
        self.allow_content_length_mismatch = enable;
        self
    }

    /// Upper bound on header name length; bounds memory use against
    /// adversarial input. Default: 1000.
    #[must_use]
    pub fn with_max_header_name_length(mut self, limit: usize) -> Self {
        self.max_header_name_length = limit;
        self
    }

    /// Upper bound on header value length. Default: 4000.
    #[must_use]
    pub fn with_max_header_value_length(mut self, limit: usize) -> Self {
        self.max_header_value_length = limit;
        self
    }

    /// Charset used when serializing header values. Default: Latin-1.
    #[must_use]
    pub fn with_header_values_charset(mut self, charset: Charset) -> Self {
        self.header_values_charset = charset;
        self
    }

    /// Callback invoked with the full header container after parsing;
    /// returning an error fails the message. Default: no-op.
    #[must_use]
    pub fn with_header_validator(mut self, validator: Arc<HeaderValidator>) -> Self {
        self.header_validator = validator;
        self
    }

    /// Registry resolving `Content-Encoding`/`Transfer-Encoding` names to
    /// decoders. Default: empty (everything passes through).
    #[must_use]
    pub fn with_encodings(mut self, encodings: Arc<EncodingRegistry>) -> Self {
        self.encodings = encodings;
        self
    }

    #[must_use]
    pub fn header_values_charset(&self) -> Charset {
        self.header_values_charset
    }

    #[must_use]
    pub fn encodings(&self) -> &Arc<EncodingRegistry> {
        &self.encodings
    }
}

impl fmt::Debug for HttpOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpOptions")
            .field("insert_host_header", &self.insert_host_header)
            .field("insert_http_version", &self.insert_http_version)
            .field(
                "allow_new_line_without_return",
                &self.allow_new_line_without_return,
            )
            .field("ignore_leading_blank_line", &self.ignore_leading_blank_line)
            .field(
                "allow_illegal_start_line_characters",
                &self.allow_illegal_start_line_characters,
            )
            .field(
                "allow_content_length_mismatch",
                &self.allow_content_length_mismatch,
            )
            .field("max_header_name_length", &self.max_header_name_length)
            .field("max_header_value_length", &self.max_header_value_length)
            .field("header_values_charset", &self.header_values_charset)
            .field("encodings", &self.encodings)
            .finish_non_exhaustive()
    }
}
