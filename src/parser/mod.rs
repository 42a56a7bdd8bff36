//! Message-level parsing: start-line tokenization, header blocks, host
//! reconciliation and body attachment.

pub(crate) mod line;

use std::io::{Cursor, Read};

use tracing::debug;

use crate::body::framing::{Direction, decide_body_type};
use crate::body::reader::{BodyReader, LazyBodyReader};
use crate::error::{Error, Framing, StartLine};
use crate::headers::Headers;
use crate::message::{Request, Response};
use crate::options::HttpOptions;
use crate::proto::{HttpVersion, RequestLine, StatusLine, Uri};

use self::line::LineParser;

/// Entry point for parsing HTTP/1.x messages off blocking byte streams.
///
/// Parsing takes ownership of the stream: the message head is read
/// synchronously, and the remainder of the stream becomes the (lazy)
/// body. On any fatal head-parse error the stream is dropped, and with
/// it the connection: a stream whose position is corrupted must never be
/// handed back for further reads.
///
/// ```
/// use rawhttp::RawHttp;
///
/// let http = RawHttp::new();
/// let request = http
///     .parse_request_str("GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n")?;
/// assert_eq!(request.method(), "GET");
/// assert_eq!(request.headers().get_first("host"), Some("example.com"));
/// # Ok::<(), rawhttp::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RawHttp {
    options: HttpOptions,
}

impl RawHttp {
    /// A parser with default (lenient) options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: HttpOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &HttpOptions {
        &self.options
    }

    /// Parses a request head and attaches the rest of `stream` as a lazy
    /// body, when the framing calls for one.
    pub fn parse_request<R: Read + 'static>(&self, mut stream: R) -> crate::Result<Request> {
        let (line, headers) = {
            let mut parser = LineParser::new(&mut stream, &self.options);
            let start = parser.read_start_line()?;
            let line = parse_request_line(&start, &self.options)?;
            let headers = parser.read_header_block()?;
            (line, headers)
        };
        let (line, headers) = reconcile_host(line, headers, &self.options)?;
        (self.options.header_validator)(&headers)?;
        let body = decide_body_type(Direction::Request, &headers, None, None, &self.options)?
            .map(|framing| {
                BodyReader::Lazy(LazyBodyReader::new(
                    framing,
                    Box::new(stream),
                    self.options.clone(),
                ))
            });
        Ok(Request::new(line, headers, body))
    }

    /// Parses a response head. `request_method` is the method of the
    /// request this response answers; it participates in the
    /// body-presence decision (`HEAD`, `CONNECT`).
    pub fn parse_response<R: Read + 'static>(
        &self,
        mut stream: R,
        request_method: Option<&str>,
    ) -> crate::Result<Response> {
        let (line, headers) = {
            let mut parser = LineParser::new(&mut stream, &self.options);
            let start = parser.read_start_line()?;
            let line = parse_status_line(&start, &self.options)?;
            let headers = parser.read_header_block()?;
            (line, headers)
        };
        (self.options.header_validator)(&headers)?;
        let body = decide_body_type(
            Direction::Response,
            &headers,
            request_method,
            Some(line.code()),
            &self.options,
        )?
        .map(|framing| {
            BodyReader::Lazy(LazyBodyReader::new(
                framing,
                Box::new(stream),
                self.options.clone(),
            ))
        });
        Ok(Response::new(line, headers, body))
    }

    /// Parses an in-memory request and eagerly consumes its body.
    pub fn parse_request_bytes(&self, bytes: &[u8]) -> crate::Result<Request> {
        self.parse_request(Cursor::new(bytes.to_vec()))?.eager()
    }

    /// Convenience form of [`Self::parse_request_bytes`] for text.
    pub fn parse_request_str(&self, text: &str) -> crate::Result<Request> {
        self.parse_request_bytes(text.as_bytes())
    }

    /// Parses an in-memory response and eagerly consumes its body; a
    /// close-terminated body runs to the end of the buffer.
    pub fn parse_response_bytes(
        &self,
        bytes: &[u8],
        request_method: Option<&str>,
    ) -> crate::Result<Response> {
        self.parse_response(Cursor::new(bytes.to_vec()), request_method)?
            .eager()
    }

    /// Convenience form of [`Self::parse_response_bytes`] for text.
    pub fn parse_response_str(&self, text: &str) -> crate::Result<Response> {
        self.parse_response_bytes(text.as_bytes(), None)
    }
}

/// Splits a request-line into method, target and version.
fn parse_request_line(line: &str, options: &HttpOptions) -> crate::Result<RequestLine> {
    let (method, target, version) = if options.allow_illegal_start_line_characters {
        // best-effort: first token is the method, the last token is the
        // version iff it parses as one, everything between is the target
        // (runs of spaces collapse)
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(Error::new_start_line(StartLine::TokenCount));
        }
        match HttpVersion::parse(tokens[tokens.len() - 1]) {
            Some(version) if tokens.len() >= 3 => (
                tokens[0],
                tokens[1..tokens.len() - 1].join(" "),
                Some(version),
            ),
            _ => (tokens[0], tokens[1..].join(" "), None),
        }
    } else {
        let parts: Vec<&str> = line.split(' ').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(Error::new_start_line(StartLine::TokenCount));
        }
        match parts.as_slice() {
            [method, target] => (*method, (*target).to_owned(), None),
            [method, target, version] => {
                let version = HttpVersion::parse(version)
                    .ok_or_else(|| Error::new_start_line(StartLine::Version))?;
                (*method, (*target).to_owned(), Some(version))
            }
            _ => return Err(Error::new_start_line(StartLine::TokenCount)),
        }
    };

    let version = match version {
        Some(version) => version,
        None if options.insert_http_version => HttpVersion::Http11,
        None => return Err(Error::new_start_line(StartLine::MissingVersion)),
    };

    let uri = Uri::parse(&target)?;
    RequestLine::new(method, uri, version)
}

/// Splits a status-line into version, 3-digit code and reason phrase.
fn parse_status_line(line: &str, options: &HttpOptions) -> crate::Result<StatusLine> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Error::new_start_line(StartLine::TokenCount));
    }
    let (first, rest) = match line.split_once(' ') {
        Some((first, rest)) => (first, rest.trim_start()),
        None => (line, ""),
    };

    let (version, code_part, reason) = if first.starts_with("HTTP") {
        let version = HttpVersion::parse(first)
            .ok_or_else(|| Error::new_start_line(StartLine::Version))?;
        let (code_part, reason) = match rest.split_once(' ') {
            Some((code_part, reason)) => (code_part, reason),
            None => (rest, ""),
        };
        (version, code_part, reason)
    } else if options.insert_http_version {
        // lenient: the code comes first, with no version at all
        (HttpVersion::Http11, first, rest)
    } else {
        return Err(Error::new_start_line(StartLine::Version));
    };

    if code_part.len() != 3 || !code_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::new_start_line(StartLine::StatusCode));
    }
    let code: u16 = code_part
        .parse()
        .map_err(|_| Error::new_start_line(StartLine::StatusCode))?;

    StatusLine::new(version, code, reason.trim())
}

/// Reconciles the request target's host with the `Host` header.
fn reconcile_host(
    line: RequestLine,
    headers: Headers,
    options: &HttpOptions,
) -> crate::Result<(RequestLine, Headers)> {
    let hosts = headers.get("Host");
    match hosts.len() {
        0 => match line.uri().host_header_value() {
            Some(value) if options.insert_host_header => {
                let mut builder = headers.to_builder();
                let _ = builder.add("Host", value);
                Ok((line, builder.build()))
            }
            Some(_) => Ok((line, headers)),
            None => Err(Error::new_start_line(StartLine::MissingHost)),
        },
        1 => {
            if line.uri().host().is_none() {
                let host = hosts[0].to_owned();
                let line = line.with_host(&host)?;
                Ok((line, headers))
            } else {
                // both present: keep both as-is, even when they differ;
                // proxies are expected to prefer the target
                if line
                    .uri()
                    .host_header_value()
                    .is_some_and(|value| value != hosts[0])
                {
                    debug!("Host header differs from request target host");
                }
                Ok((line, headers))
            }
        }
        _ => Err(Error::new_framing(Framing::AmbiguousHost)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_strict_three_tokens() {
        let options = HttpOptions::default();
        let line = parse_request_line("GET /x HTTP/1.0", &options).unwrap();
        assert_eq!(line.method(), "GET");
        assert_eq!(line.uri().path(), "/x");
        assert_eq!(line.version(), HttpVersion::Http10);
    }

    #[test]
    fn request_line_version_defaulting() {
        let options = HttpOptions::default();
        let line = parse_request_line("GET /x", &options).unwrap();
        assert_eq!(line.version(), HttpVersion::Http11);

        let strict = HttpOptions::default().with_insert_http_version(false);
        let err = parse_request_line("GET /x", &strict).unwrap_err();
        assert!(err.is_malformed_start_line());
    }

    #[test]
    fn request_line_rejects_bad_token_counts() {
        let options = HttpOptions::default();
        for bad in ["GET", "GET  /x HTTP/1.1", "GET /x HTTP/1.1 extra", " GET /x"] {
            assert!(
                parse_request_line(bad, &options).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn request_line_rejects_unknown_version() {
        let options = HttpOptions::default();
        let err = parse_request_line("GET /x HTTP/9.9", &options).unwrap_err();
        assert!(err.is_malformed_start_line());
    }

    #[test]
    fn lenient_request_line_joins_target_spaces() {
        let options = HttpOptions::default().with_allow_illegal_start_line_characters(true);
        let line = parse_request_line("GET /a file.txt HTTP/1.1", &options).unwrap();
        assert_eq!(line.uri().path(), "/a file.txt");
        assert_eq!(line.version(), HttpVersion::Http11);

        // without a parseable version, everything after the method is target
        let line = parse_request_line("GET /a b", &options).unwrap();
        assert_eq!(line.uri().path(), "/a b");
    }

    #[test]
    fn status_line_forms() {
        let options = HttpOptions::default();
        let line = parse_status_line("HTTP/1.1 200 OK", &options).unwrap();
        assert_eq!(line.code(), 200);
        assert_eq!(line.reason(), "OK");

        let line = parse_status_line("HTTP/1.1 404 Not Found", &options).unwrap();
        assert_eq!(line.reason(), "Not Found");

        // code-only status lines get the version filled in
        let line = parse_status_line("200 OK", &options).unwrap();
        assert_eq!(line.version(), HttpVersion::Http11);
        assert_eq!(line.code(), 200);

        let strict = HttpOptions::default().with_insert_http_version(false);
        assert!(parse_status_line("200 OK", &strict).is_err());
    }

    #[test]
    fn status_code_must_be_three_digits() {
        let options = HttpOptions::default();
        for bad in ["HTTP/1.1 20 OK", "HTTP/1.1 2000 OK", "HTTP/1.1 2O0 OK", "HTTP/1.1"] {
            assert!(
                parse_status_line(bad, &options).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn host_header_synthesized_from_target() {
        let http = RawHttp::new();
        let request = http
            .parse_request_str("GET http://example.com:8080/x HTTP/1.1\r\n\r\n")
            .unwrap();
        assert_eq!(
            request.headers().get_first("host"),
            Some("example.com:8080")
        );
    }

    #[test]
    fn host_header_fills_hostless_target() {
        let http = RawHttp::new();
        let request = http
            .parse_request_str("GET /x HTTP/1.1\r\nHost: a.com\r\n\r\n")
            .unwrap();
        assert_eq!(request.uri().host(), Some("a.com"));
        assert_eq!(request.headers().get("host"), vec!["a.com"]);
    }

    #[test]
    fn multiple_host_headers_are_fatal() {
        let http = RawHttp::new();
        let err = http
            .parse_request_str("GET /x HTTP/1.1\r\nHost: a.com\r\nHost: b.com\r\n\r\n")
            .unwrap_err();
        assert!(err.is_ambiguous_framing());
    }

    #[test]
    fn conflicting_host_header_and_target_are_both_kept() {
        let http = RawHttp::new();
        let request = http
            .parse_request_str("GET http://a.com/x HTTP/1.1\r\nHost: b.com\r\n\r\n")
            .unwrap();
        assert_eq!(request.uri().host(), Some("a.com"));
        assert_eq!(request.headers().get("host"), vec!["b.com"]);
    }

    #[test]
    fn missing_host_everywhere_is_fatal_on_line_1() {
        let http = RawHttp::with_options(HttpOptions::default().with_insert_host_header(false));
        let err = http.parse_request_str("GET /x HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(err.is_malformed_start_line());
        assert_eq!(err.line_number(), Some(1));
    }

    #[test]
    fn header_validator_can_fail_the_parse() {
        use std::sync::Arc;
        let options = HttpOptions::default().with_header_validator(Arc::new(|headers| {
            if headers.contains("X-Forbidden") {
                Err(crate::error::Error::new_framing(Framing::AmbiguousHost))
            } else {
                Ok(())
            }
        }));
        let http = RawHttp::with_options(options);
        assert!(
            http.parse_request_str("GET /x HTTP/1.1\r\nHost: a\r\nX-Forbidden: 1\r\n\r\n")
                .is_err()
        );
        assert!(
            http.parse_request_str("GET /x HTTP/1.1\r\nHost: a\r\n\r\n")
                .is_ok()
        );
    }
}
