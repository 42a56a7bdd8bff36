//! Request-line and status-line models.

use std::fmt;
use std::io::{self, Write};

use crate::chars::{TOKEN_CHARS, index_of_first_invalid};
use crate::error::{Error, StartLine};
use crate::proto::uri::Uri;

/// The HTTP version literal carried on a start-line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    Http09,
    Http10,
    #[default]
    Http11,
    Http2,
}

impl HttpVersion {
    /// Parses a version literal exactly as it appears on the wire.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "HTTP/0.9" => Some(Self::Http09),
            "HTTP/1.0" => Some(Self::Http10),
            "HTTP/1.1" => Some(Self::Http11),
            "HTTP/2" => Some(Self::Http2),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http09 => "HTTP/0.9",
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
            Self::Http2 => "HTTP/2",
        }
    }

    /// Pre-1.1 versions close the connection to delimit response bodies.
    #[must_use]
    pub fn is_old(self) -> bool {
        matches!(self, Self::Http09 | Self::Http10)
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `METHOD SP target SP version`, the first line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: String,
    uri: Uri,
    version: HttpVersion,
}

impl RequestLine {
    /// Builds a request-line, validating that the method is a token.
    pub fn new(
        method: impl Into<String>,
        uri: Uri,
        version: HttpVersion,
    ) -> crate::Result<Self> {
        let method = method.into();
        if method.is_empty() {
            return Err(Error::new_start_line(StartLine::MethodChar(0)));
        }
        if let Some(i) = index_of_first_invalid(method.as_bytes(), &TOKEN_CHARS) {
            return Err(Error::new_start_line(StartLine::MethodChar(i)));
        }
        Ok(Self {
            method,
            uri,
            version,
        })
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// A copy with the URI's host/port replaced, path and query kept.
    pub fn with_host(&self, host: &str) -> crate::Result<Self> {
        Ok(Self {
            method: self.method.clone(),
            uri: self.uri.with_host(host)?,
            version: self.version,
        })
    }

    /// Writes the wire form followed by CRLF. The target is written in
    /// origin-form.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.method.as_bytes())?;
        out.write_all(b" ")?;
        out.write_all(self.uri.request_target().as_bytes())?;
        out.write_all(b" ")?;
        out.write_all(self.version.as_str().as_bytes())?;
        out.write_all(b"\r\n")
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.method,
            self.uri.request_target(),
            self.version
        )
    }
}

/// `version SP status-code SP reason`, the first line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    version: HttpVersion,
    code: u16,
    reason: String,
}

impl StatusLine {
    /// Builds a status-line; the code must be exactly 3 digits (100-999).
    /// An empty reason falls back to the canonical phrase when one exists.
    pub fn new(
        version: HttpVersion,
        code: u16,
        reason: impl Into<String>,
    ) -> crate::Result<Self> {
        if !(100..=999).contains(&code) {
            return Err(Error::new_start_line(StartLine::StatusCode));
        }
        let mut reason = reason.into();
        if reason.is_empty() {
            reason = canonical_reason(code).unwrap_or("").to_owned();
        }
        Ok(Self {
            version,
            code,
            reason,
        })
    }

    #[must_use]
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[must_use]
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Writes the wire form followed by CRLF.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.version.as_str().as_bytes())?;
        out.write_all(b" ")?;
        let mut buf = itoa::Buffer::new();
        out.write_all(buf.format(self.code).as_bytes())?;
        if !self.reason.is_empty() {
            out.write_all(b" ")?;
            out.write_all(self.reason.as_bytes())?;
        }
        out.write_all(b"\r\n")
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.version, self.code)?;
        if !self.reason.is_empty() {
            write!(f, " {}", self.reason)?;
        }
        Ok(())
    }
}

/// Standard reason phrase for a status code, when one exists.
#[must_use]
pub fn canonical_reason(code: u16) -> Option<&'static str> {
    Some(match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => return None,
    })
}
