use crate::http::request::{Method, Request, content_length_of, find_header, insert_header};
use std::collections::HashMap;

/// Ends the request line and headers.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Why a buffer can never become a valid request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The request line is not exactly `method target version`
    MalformedRequestLine,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MalformedRequestLine => f.write_str("malformed request line"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result of feeding an accumulated buffer to [`parse_request`].
#[derive(Debug, PartialEq, Eq)]
pub enum ParseOutcome<'a> {
    /// Not enough bytes yet; the caller keeps its buffer as is.
    Incomplete,
    /// One request was decoded. `remainder` borrows every byte past it.
    Complete {
        request: Request,
        remainder: &'a [u8],
    },
    /// The buffer is malformed and the connection should be dropped.
    Error(ParseError),
}

/// Decodes at most one request from the front of `buf`.
///
/// The parser holds no state between calls: the caller appends new bytes
/// and calls again until it gets `Complete` or `Error`. Feeding a request
/// in any number of chunks yields the same request as feeding it whole.
///
/// Only the request line can make a request malformed. Header lines are
/// decoded lossily, and a bad or missing `Content-Length` is treated as 0.
pub fn parse_request(buf: &[u8]) -> ParseOutcome<'_> {
    let Some(head_end) = find_head_end(buf, 0) else {
        return ParseOutcome::Incomplete;
    };

    let mut lines = buf[..head_end].split(|&b| b == b'\n').map(|line| line.strip_suffix(b"\r").unwrap_or(line));

    // Request line
    let Some(request_line) = lines.next().and_then(|line| std::str::from_utf8(line).ok()) else {
        return ParseOutcome::Error(ParseError::MalformedRequestLine);
    };
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    let &[method, target, version] = parts.as_slice() else {
        return ParseOutcome::Error(ParseError::MalformedRequestLine);
    };

    // Headers
    let mut headers = HashMap::new();

    for line in lines {
        let line = String::from_utf8_lossy(line);
        // Lines without a colon carry nothing we can use
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        insert_header(&mut headers, key.to_string(), value.trim().to_string());
    }

    // Body
    let body_start = head_end + HEAD_TERMINATOR.len();
    let content_length = content_length_of(find_header(&headers, "Content-Length"));
    let total = body_start.saturating_add(content_length);

    if buf.len() < total {
        return ParseOutcome::Incomplete;
    }

    let request = Request {
        method: Method::parse(method),
        target: target.to_string(),
        version: version.to_string(),
        headers,
        body: buf[body_start..total].to_vec(),
    };

    ParseOutcome::Complete {
        request,
        remainder: &buf[total..],
    }
}

/// Index of the first header terminator in `buf`, searching from `from`.
///
/// A caller that appends to a buffer can resume from
/// `previous_len.saturating_sub(HEAD_TERMINATOR.len() - 1)` instead of
/// rescanning bytes already known not to hold a terminator.
pub fn find_head_end(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
        .map(|i| from + i)
}
