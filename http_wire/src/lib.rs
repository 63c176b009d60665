//! One-shot HTTP/1.0 and HTTP/1.1 request parsing and response serialization.
//!
//! A `Request` is built from exactly one byte slice (one `recv()` worth of
//! data). There is no incremental state: if the slice does not contain a
//! complete request line + header block, parsing fails. Callers are not
//! expected to buffer and retry across reads.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Maximum accepted request-line URI length, matching common origin-server
/// practice (and comfortably under the request buffer size callers use).
pub const MAX_URI_LEN: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Options,
    Trace,
    Other(String),
}

impl Method {
    fn parse(s: &str) -> Method {
        match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Other(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

#[derive(Debug)]
pub enum ParseError {
    /// Zero-length read; nothing to parse.
    Empty,
    /// Request line missing a method, URI, or version token.
    MalformedRequestLine,
    /// The request-line version token was not HTTP/1.0 or HTTP/1.1.
    UnsupportedVersion,
    /// URI exceeded `MAX_URI_LEN`.
    UriTooLong,
    /// A header line had no `:` separator.
    MalformedHeader,
    /// No `\r\n\r\n` terminator found in the supplied bytes. One-shot parsing
    /// does not wait for the rest of the request to arrive on a later read.
    HeadersUnterminated,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ParseError::Empty => "empty request",
            ParseError::MalformedRequestLine => "malformed request line",
            ParseError::UnsupportedVersion => "unsupported HTTP version",
            ParseError::UriTooLong => "request URI too long",
            ParseError::MalformedHeader => "malformed header line",
            ParseError::HeadersUnterminated => "request headers not terminated in one read",
        };
        f.write_str(msg)
    }
}

impl Error for ParseError {}

#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: String,
    version: Version,
    headers: HashMap<String, String>,
    raw: Vec<u8>,
}

impl Request {
    /// Parse a single complete request out of `buf`. `buf` is everything
    /// one `recv()` returned; it is never combined with bytes from a
    /// previous or future call.
    pub fn parse(buf: &[u8]) -> Result<Request, ParseError> {
        if buf.is_empty() {
            return Err(ParseError::Empty);
        }

        let head_end = find_subsequence(buf, b"\r\n\r\n").ok_or(ParseError::HeadersUnterminated)?;
        let head = &buf[..head_end];
        let head_str = String::from_utf8_lossy(head);

        let mut lines = head_str.split("\r\n");
        let request_line = lines.next().ok_or(ParseError::MalformedRequestLine)?;

        let mut parts = request_line.split(' ');
        let method = parts.next().ok_or(ParseError::MalformedRequestLine)?;
        let uri = parts.next().ok_or(ParseError::MalformedRequestLine)?;
        let version = parts.next().ok_or(ParseError::MalformedRequestLine)?;
        if parts.next().is_some() {
            return Err(ParseError::MalformedRequestLine);
        }

        if uri.len() > MAX_URI_LEN {
            return Err(ParseError::UriTooLong);
        }

        let version = match version {
            "HTTP/1.0" => Version::Http10,
            "HTTP/1.1" => Version::Http11,
            _ => return Err(ParseError::UnsupportedVersion),
        };

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let colon = line.find(':').ok_or(ParseError::MalformedHeader)?;
            let name = line[..colon].trim().to_ascii_lowercase();
            let value = line[colon + 1..].trim().to_string();
            if name.is_empty() {
                return Err(ParseError::MalformedHeader);
            }
            headers.insert(name, value);
        }

        Ok(Request {
            method: Method::parse(method),
            uri: uri.to_string(),
            version,
            headers,
            raw: buf.to_vec(),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    /// Raw bytes of the request as received, for TRACE echoing.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug)]
pub struct Response {
    version: Version,
    status_code: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    /// HEAD responses carry headers describing a body that is never written.
    omit_body: bool,
}

impl Response {
    pub fn new(status_code: u16) -> Response {
        Response {
            version: Version::Http11,
            status_code,
            headers: Vec::new(),
            body: Vec::new(),
            omit_body: false,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Suppress the body on serialization (for HEAD responses) while
    /// keeping Content-Length as if the body had been sent.
    pub fn omit_body(mut self, omit: bool) -> Self {
        self.omit_body = omit;
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = format!(
            "{} {} {}\r\n",
            self.version.as_str(),
            self.status_code,
            status_text(self.status_code)
        )
        .into_bytes();

        let mut wrote_content_length = false;
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length") {
                wrote_content_length = true;
            }
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if !wrote_content_length {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        if !self.omit_body {
            out.extend_from_slice(&self.body);
        }
        out
    }
}

/// Reason phrase for a status code. Falls back to a generic phrase for
/// the code's class if the exact code is not in the table.
pub fn status_text(code: u16) -> &'static str {
    match code {
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
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        426 => "Upgrade Required",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        100..=199 => "Informational",
        200..=299 => "Success",
        300..=399 => "Redirection",
        400..=499 => "Client Error",
        _ => "Server Error",
    }
}
