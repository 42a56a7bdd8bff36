//! Request and response models and their serialization.
//!
//! A message is a start-line, a header block and an optional body reader.
//! Messages are value types: the `with_*` methods consume `self` and
//! return an adjusted copy, leaving the original parts untouched where
//! they are shared.

use std::fmt;
use std::io::Write;

use bytes::Bytes;

use crate::body::framing::BodyType;
use crate::body::reader::{BodyReader, EagerBodyReader};
use crate::error::Error;
use crate::headers::{Charset, Headers};
use crate::proto::{RequestLine, StatusLine, Uri};

/// An HTTP request: request-line, headers and optional body.
#[derive(Debug)]
pub struct Request {
    line: RequestLine,
    headers: Headers,
    body: Option<BodyReader>,
}

impl Request {
    #[must_use]
    pub fn new(line: RequestLine, headers: Headers, body: Option<BodyReader>) -> Self {
        Self {
            line,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn start_line(&self) -> &RequestLine {
        &self.line
    }

    #[must_use]
    pub fn method(&self) -> &str {
        self.line.method()
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        self.line.uri()
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&BodyReader> {
        self.body.as_ref()
    }

    /// Detaches the body, leaving the message head intact.
    pub fn take_body(&mut self) -> Option<BodyReader> {
        self.body.take()
    }

    /// Detaches the body and returns its decoded bytes; empty when there
    /// is no body.
    pub fn take_body_bytes(&mut self) -> crate::Result<Bytes> {
        match self.body.take() {
            Some(body) => body.decoded_bytes(),
            None => Ok(Bytes::new()),
        }
    }

    /// Fully consumes a lazy body into memory. Trailer headers of a
    /// chunked body are appended to the message headers. Idempotent.
    pub fn eager(mut self) -> crate::Result<Self> {
        if let Some(body) = self.body.take() {
            let eager = body.eager()?;
            if let Some(trailer) = eager.trailer() {
                if !trailer.is_empty() {
                    self.headers = self.headers.merge(trailer);
                }
            }
            self.body = Some(eager.into());
        }
        Ok(self)
    }

    /// Replaces the body and rewrites the framing headers to match it:
    /// `Content-Length` for a sized body, `Transfer-Encoding: chunked`
    /// for a chunked one, neither when the body is removed.
    #[must_use]
    pub fn with_body(self, body: Option<EagerBodyReader>) -> Self {
        self.with_body_adjusting_headers(body, true)
    }

    /// Like [`Self::with_body`], but leaves the headers alone when
    /// `adjust_headers` is false. The caller then owns framing
    /// consistency.
    #[must_use]
    pub fn with_body_adjusting_headers(
        mut self,
        body: Option<EagerBodyReader>,
        adjust_headers: bool,
    ) -> Self {
        if adjust_headers {
            self.headers = framing_adjusted(&self.headers, body.as_ref());
        }
        self.body = body.map(Into::into);
        self
    }

    /// Replaces headers by name: for every name in `headers`, existing
    /// entries are dropped and the new ones appended.
    #[must_use]
    pub fn with_headers(mut self, headers: &Headers) -> Self {
        self.headers = self.headers.and(headers);
        self
    }

    /// Appends `headers` without replacing anything.
    #[must_use]
    pub fn with_appended_headers(mut self, headers: &Headers) -> Self {
        self.headers = self.headers.merge(headers);
        self
    }

    /// Writes the request-line and header block, including the blank line
    /// that terminates the head. Header values are written as Latin-1;
    /// use [`Headers::write_to`] directly for another charset.
    pub fn write_head_to<W: Write>(&self, out: &mut W) -> crate::Result<()> {
        self.line.write_to(out).map_err(Error::new_io)?;
        self.headers
            .write_to(out, Charset::default())
            .map_err(Error::new_io)
    }

    /// Writes the whole message in wire form, consuming the body.
    pub fn write_to<W: Write>(mut self, out: &mut W) -> crate::Result<()> {
        self.write_head_to(out)?;
        if let Some(body) = self.body.take() {
            body.write_to(out)?;
        }
        Ok(())
    }

    /// The whole message in wire form.
    pub fn into_bytes(self) -> crate::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n{}\r\n", self.line, self.headers)
    }
}

/// An HTTP response: status-line, headers and optional body.
#[derive(Debug)]
pub struct Response {
    line: StatusLine,
    headers: Headers,
    body: Option<BodyReader>,
}

impl Response {
    #[must_use]
    pub fn new(line: StatusLine, headers: Headers, body: Option<BodyReader>) -> Self {
        Self {
            line,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn start_line(&self) -> &StatusLine {
        &self.line
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.line.code()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.line.is_success()
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&BodyReader> {
        self.body.as_ref()
    }

    pub fn take_body(&mut self) -> Option<BodyReader> {
        self.body.take()
    }

    /// Detaches the body and returns its decoded bytes; empty when there
    /// is no body.
    pub fn take_body_bytes(&mut self) -> crate::Result<Bytes> {
        match self.body.take() {
            Some(body) => body.decoded_bytes(),
            None => Ok(Bytes::new()),
        }
    }

    /// Fully consumes a lazy body into memory. Trailer headers of a
    /// chunked body are appended to the message headers. Idempotent.
    pub fn eager(mut self) -> crate::Result<Self> {
        if let Some(body) = self.body.take() {
            let eager = body.eager()?;
            if let Some(trailer) = eager.trailer() {
                if !trailer.is_empty() {
                    self.headers = self.headers.merge(trailer);
                }
            }
            self.body = Some(eager.into());
        }
        Ok(self)
    }

    /// Replaces the body and rewrites the framing headers to match it.
    #[must_use]
    pub fn with_body(self, body: Option<EagerBodyReader>) -> Self {
        self.with_body_adjusting_headers(body, true)
    }

    #[must_use]
    pub fn with_body_adjusting_headers(
        mut self,
        body: Option<EagerBodyReader>,
        adjust_headers: bool,
    ) -> Self {
        if adjust_headers {
            self.headers = framing_adjusted(&self.headers, body.as_ref());
        }
        self.body = body.map(Into::into);
        self
    }

    /// Replaces headers by name, as [`Headers::and`] does.
    #[must_use]
    pub fn with_headers(mut self, headers: &Headers) -> Self {
        self.headers = self.headers.and(headers);
        self
    }

    #[must_use]
    pub fn with_appended_headers(mut self, headers: &Headers) -> Self {
        self.headers = self.headers.merge(headers);
        self
    }

    /// Writes the status-line and header block, blank line included.
    pub fn write_head_to<W: Write>(&self, out: &mut W) -> crate::Result<()> {
        self.line.write_to(out).map_err(Error::new_io)?;
        self.headers
            .write_to(out, Charset::default())
            .map_err(Error::new_io)
    }

    /// Writes the whole message in wire form, consuming the body.
    pub fn write_to<W: Write>(mut self, out: &mut W) -> crate::Result<()> {
        self.write_head_to(out)?;
        if let Some(body) = self.body.take() {
            body.write_to(out)?;
        }
        Ok(())
    }

    pub fn into_bytes(self) -> crate::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n{}\r\n", self.line, self.headers)
    }
}

/// Headers rewritten so the framing headers describe `body`. Other
/// headers (Content-Type included) are not touched.
fn framing_adjusted(headers: &Headers, body: Option<&EagerBodyReader>) -> Headers {
    let base = headers.without_all(&["Content-Length", "Transfer-Encoding"]);
    let Some(body) = body else {
        return base;
    };
    let mut builder = base.to_builder();
    match body.framing() {
        BodyType::Chunked { .. } => {
            let _ = builder.add("Transfer-Encoding", "chunked");
        }
        _ => {
            let _ = builder.add("Content-Length", body.len().to_string());
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::HeadersBuilder;
    use crate::proto::HttpVersion;

    fn get_request() -> Request {
        let line = RequestLine::new(
            "GET",
            Uri::parse("http://example.com/x").unwrap(),
            HttpVersion::Http11,
        )
        .unwrap();
        let mut builder = HeadersBuilder::new();
        builder.add("Host", "example.com").unwrap();
        Request::new(line, builder.build(), None)
    }

    #[test]
    fn head_serialization() {
        let mut out = Vec::new();
        get_request().write_head_to(&mut out).unwrap();
        assert_eq!(out, b"GET /x HTTP/1.1\r\nHost: example.com\r\n\r\n");
    }

    #[test]
    fn with_body_sets_content_length() {
        let request = get_request().with_body(Some(EagerBodyReader::from_bytes(&b"hello"[..])));
        assert_eq!(request.headers().get_first("content-length"), Some("5"));
        assert!(!request.headers().contains("transfer-encoding"));
        let bytes = request.into_bytes().unwrap();
        assert!(bytes.ends_with(b"\r\nhello"));
    }

    #[test]
    fn with_body_none_strips_framing_headers() {
        let request = get_request()
            .with_body(Some(EagerBodyReader::from_bytes(&b"hello"[..])))
            .with_body(None);
        assert!(!request.headers().contains("content-length"));
        assert!(!request.headers().contains("transfer-encoding"));
    }

    #[test]
    fn with_body_can_leave_headers_alone() {
        let request = get_request()
            .with_body_adjusting_headers(Some(EagerBodyReader::from_bytes(&b"hi"[..])), false);
        assert!(!request.headers().contains("content-length"));
    }

    #[test]
    fn with_headers_replaces_by_name() {
        let mut builder = HeadersBuilder::new();
        builder.add("Host", "other.com").unwrap();
        builder.add("Accept", "*/*").unwrap();
        let request = get_request().with_headers(&builder.build());
        assert_eq!(request.headers().get("host"), vec!["other.com"]);
        assert_eq!(request.headers().get("accept"), vec!["*/*"]);
    }

    #[test]
    fn with_appended_headers_keeps_existing() {
        let mut builder = HeadersBuilder::new();
        builder.add("Host", "other.com").unwrap();
        let request = get_request().with_appended_headers(&builder.build());
        assert_eq!(
            request.headers().get("host"),
            vec!["example.com", "other.com"]
        );
    }

    #[test]
    fn response_accessors() {
        let line = StatusLine::new(HttpVersion::Http11, 204, "").unwrap();
        let response = Response::new(line, Headers::empty(), None);
        assert_eq!(response.status_code(), 204);
        assert!(response.is_success());
        let bytes = response.into_bytes().unwrap();
        assert_eq!(bytes, b"HTTP/1.1 204 No Content\r\n\r\n");
    }
}
