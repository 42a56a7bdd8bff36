//! Body-framing decision.
//!
//! Per RFC 7230 §3.3.3 the framing of a message body is a pure function
//! of its headers, the message direction, and (for responses) the
//! originating request method and the status code. Computed once when the
//! message head is parsed; immutable afterwards.

use tracing::debug;

use crate::error::{Error, Framing};
use crate::headers::Headers;
use crate::options::HttpOptions;

/// Whether a message travels client-to-server or back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// How the extent of a message body is determined. Exactly one strategy
/// applies to a message that has a body at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyType {
    /// An exact number of bytes follows the header section.
    ContentLength {
        length: u64,
        /// When set, a stream ending early yields the bytes read so far
        /// instead of an error.
        allow_mismatch: bool,
    },
    /// The body is framed in chunks; `encodings` is the decoder chain
    /// (Content-Encoding then Transfer-Encoding tokens), excluding the
    /// trailing `chunked` marker, which is structural rather than a
    /// content codec.
    Chunked { encodings: Vec<String> },
    /// The body runs until the connection closes. Responses only.
    CloseTerminated { encodings: Vec<String> },
}

/// True when the response may not carry body content at all, regardless
/// of any framing headers present.
fn response_exempt_from_body(request_method: Option<&str>, status_code: u16) -> bool {
    if let Some(method) = request_method {
        if method.eq_ignore_ascii_case("HEAD") {
            return true;
        }
        if method.eq_ignore_ascii_case("CONNECT") && (200..300).contains(&status_code) {
            return true;
        }
    }
    (100..200).contains(&status_code) || status_code == 204 || status_code == 304
}

/// Decides the framing for a message, or `None` when the message has no
/// body. `request_method` and `status_code` are only consulted for
/// responses.
pub(crate) fn decide_body_type(
    direction: Direction,
    headers: &Headers,
    request_method: Option<&str>,
    status_code: Option<u16>,
    options: &HttpOptions,
) -> crate::Result<Option<BodyType>> {
    if direction == Direction::Response
        && response_exempt_from_body(request_method, status_code.unwrap_or(200))
    {
        return Ok(None);
    }

    let content_encodings = headers.get_split("Content-Encoding", ',');
    let transfer_encodings = headers.get_split("Transfer-Encoding", ',');

    if let Some(last) = transfer_encodings.last() {
        let mut encodings = content_encodings;
        if last.eq_ignore_ascii_case("chunked") {
            encodings.extend_from_slice(&transfer_encodings[..transfer_encodings.len() - 1]);
            return Ok(Some(BodyType::Chunked { encodings }));
        }
        // a request cannot fall back to close-termination: the connection
        // must stay open for the response
        if direction == Direction::Request {
            debug!("request with Transfer-Encoding not ending in chunked");
            return Err(Error::new_framing(Framing::RequestBodyUnframed));
        }
        encodings.extend_from_slice(&transfer_encodings);
        return Ok(Some(BodyType::CloseTerminated { encodings }));
    }

    if headers.contains("Content-Length") {
        let values = headers.get("Content-Length");
        if values.len() > 1 {
            // duplicates are rejected even when identical; lenient
            // treatment of same-value duplicates is a known smuggling
            // vector elsewhere
            debug!("multiple Content-Length values: {values:?}");
            return Err(Error::new_framing(Framing::AmbiguousContentLength));
        }
        let length: u64 = values[0]
            .trim()
            .parse()
            .map_err(|_| Error::new_framing(Framing::ContentLengthInvalid))?;
        return Ok(Some(BodyType::ContentLength {
            length,
            allow_mismatch: options.allow_content_length_mismatch,
        }));
    }

    match direction {
        // absence of framing headers on a request simply means no body
        Direction::Request => Ok(None),
        Direction::Response => Ok(Some(BodyType::CloseTerminated {
            encodings: headers.get_split("Content-Encoding", ','),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::HeadersBuilder;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut builder = HeadersBuilder::new();
        for (name, value) in pairs {
            builder.add(*name, *value).unwrap();
        }
        builder.build()
    }

    fn decide(
        direction: Direction,
        pairs: &[(&str, &str)],
        method: Option<&str>,
        status: Option<u16>,
    ) -> crate::Result<Option<BodyType>> {
        decide_body_type(
            direction,
            &headers(pairs),
            method,
            status,
            &HttpOptions::default(),
        )
    }

    #[test]
    fn request_without_framing_headers_has_no_body() {
        let body = decide(Direction::Request, &[("Host", "a.com")], None, None).unwrap();
        assert_eq!(body, None);
    }

    #[test]
    fn response_without_framing_headers_is_close_terminated() {
        let body = decide(Direction::Response, &[], Some("GET"), Some(200)).unwrap();
        assert_eq!(
            body,
            Some(BodyType::CloseTerminated {
                encodings: Vec::new()
            })
        );
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let body = decide(
            Direction::Request,
            &[("Content-Length", "10"), ("Transfer-Encoding", "chunked")],
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            body,
            Some(BodyType::Chunked {
                encodings: Vec::new()
            })
        );
    }

    #[test]
    fn decoder_chain_excludes_trailing_chunked_marker() {
        let body = decide(
            Direction::Response,
            &[
                ("Content-Encoding", "br"),
                ("Transfer-Encoding", "gzip, chunked"),
            ],
            Some("GET"),
            Some(200),
        )
        .unwrap();
        assert_eq!(
            body,
            Some(BodyType::Chunked {
                encodings: vec!["br".to_owned(), "gzip".to_owned()]
            })
        );
    }

    #[test]
    fn chunked_marker_is_case_insensitive() {
        let body = decide(
            Direction::Request,
            &[("Transfer-Encoding", "CHUNKED")],
            None,
            None,
        )
        .unwrap();
        assert!(matches!(body, Some(BodyType::Chunked { .. })));
    }

    #[test]
    fn request_transfer_encoding_without_chunked_is_rejected() {
        let err = decide(
            Direction::Request,
            &[("Transfer-Encoding", "gzip")],
            None,
            None,
        )
        .unwrap_err();
        assert!(err.is_ambiguous_framing());
    }

    #[test]
    fn response_transfer_encoding_without_chunked_is_close_terminated() {
        let body = decide(
            Direction::Response,
            &[("Transfer-Encoding", "gzip")],
            Some("GET"),
            Some(200),
        )
        .unwrap();
        assert_eq!(
            body,
            Some(BodyType::CloseTerminated {
                encodings: vec!["gzip".to_owned()]
            })
        );
    }

    #[test]
    fn content_length_must_be_a_single_value() {
        let err = decide(
            Direction::Request,
            &[("Content-Length", "10"), ("Content-Length", "10")],
            None,
            None,
        )
        .unwrap_err();
        assert!(err.is_ambiguous_framing());
    }

    #[test]
    fn content_length_must_be_a_non_negative_integer() {
        for bad in ["-1", "abc", "1e3", ""] {
            let err = decide(Direction::Request, &[("Content-Length", bad)], None, None)
                .unwrap_err();
            assert!(err.is_ambiguous_framing(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn head_response_has_no_body_despite_content_length() {
        let body = decide(
            Direction::Response,
            &[("Content-Length", "100")],
            Some("HEAD"),
            Some(200),
        )
        .unwrap();
        assert_eq!(body, None);
    }

    #[test]
    fn connect_2xx_and_status_exemptions() {
        for (method, status) in [
            (Some("CONNECT"), 200),
            (Some("GET"), 204),
            (Some("GET"), 304),
            (Some("GET"), 101),
        ] {
            let body = decide(
                Direction::Response,
                &[("Content-Length", "5")],
                method,
                Some(status),
            )
            .unwrap();
            assert_eq!(body, None, "{method:?} {status} should have no body");
        }
        // CONNECT with a non-2xx status is not exempt
        let body = decide(
            Direction::Response,
            &[("Content-Length", "5")],
            Some("CONNECT"),
            Some(407),
        )
        .unwrap();
        assert!(matches!(body, Some(BodyType::ContentLength { .. })));
    }
}
