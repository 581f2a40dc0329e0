use serde::{Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Which kind of HTTP message a parser expects.
///
/// `Either` decides from the first token of the first start line and then
/// settles to `Request` or `Response` for the rest of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Request,
    Response,
    #[default]
    Either,
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// HTTP request methods recognised in the request line.
///
/// The discriminants are stable and exposed through [`Method::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    DELETE = 0,
    GET,
    HEAD,
    POST,
    PUT,
    CONNECT,
    OPTIONS,
    TRACE,
    COPY,
    LOCK,
    MKCOL,
    MOVE,
    PROPFIND,
    PROPPATCH,
    UNLOCK,
    REPORT,
    MKACTIVITY,
    CHECKOUT,
    MERGE,
    MSEARCH,
    NOTIFY,
    SUBSCRIBE,
    UNSUBSCRIBE,
    PATCH,
    PURGE,
}

impl Method {
    /// Every method, indexed by its code.
    pub const ALL: [Method; 25] = [
        Self::DELETE,
        Self::GET,
        Self::HEAD,
        Self::POST,
        Self::PUT,
        Self::CONNECT,
        Self::OPTIONS,
        Self::TRACE,
        Self::COPY,
        Self::LOCK,
        Self::MKCOL,
        Self::MOVE,
        Self::PROPFIND,
        Self::PROPPATCH,
        Self::UNLOCK,
        Self::REPORT,
        Self::MKACTIVITY,
        Self::CHECKOUT,
        Self::MERGE,
        Self::MSEARCH,
        Self::NOTIFY,
        Self::SUBSCRIBE,
        Self::UNSUBSCRIBE,
        Self::PATCH,
        Self::PURGE,
    ];

    /// Stable numeric code of the method.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look a method up by its numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Return the method token as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DELETE => "DELETE",
            Self::GET => "GET",
            Self::HEAD => "HEAD",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::CONNECT => "CONNECT",
            Self::OPTIONS => "OPTIONS",
            Self::TRACE => "TRACE",
            Self::COPY => "COPY",
            Self::LOCK => "LOCK",
            Self::MKCOL => "MKCOL",
            Self::MOVE => "MOVE",
            Self::PROPFIND => "PROPFIND",
            Self::PROPPATCH => "PROPPATCH",
            Self::UNLOCK => "UNLOCK",
            Self::REPORT => "REPORT",
            Self::MKACTIVITY => "MKACTIVITY",
            Self::CHECKOUT => "CHECKOUT",
            Self::MERGE => "MERGE",
            Self::MSEARCH => "M-SEARCH",
            Self::NOTIFY => "NOTIFY",
            Self::SUBSCRIBE => "SUBSCRIBE",
            Self::UNSUBSCRIBE => "UNSUBSCRIBE",
            Self::PATCH => "PATCH",
            Self::PURGE => "PURGE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HttpVersion
// ---------------------------------------------------------------------------

/// Protocol version digits from a start line (`HTTP/<major>.<minor>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl HttpVersion {
    pub const HTTP_10: Self = Self { major: 1, minor: 0 };
    pub const HTTP_11: Self = Self { major: 1, minor: 1 };
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

impl Serialize for HttpVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Event / Span
// ---------------------------------------------------------------------------

/// The structural events reported to a [`Handler`](crate::Handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    MessageBegin,
    Url,
    HeaderField,
    HeaderValue,
    HeadersComplete,
    Body,
    MessageComplete,
}

impl Event {
    /// `true` for the four events that deliver a [`Span`].
    pub fn carries_span(self) -> bool {
        matches!(
            self,
            Self::Url | Self::HeaderField | Self::HeaderValue | Self::Body
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageBegin => "message_begin",
            Self::Url => "url",
            Self::HeaderField => "header_field",
            Self::HeaderValue => "header_value",
            Self::HeadersComplete => "headers_complete",
            Self::Body => "body",
            Self::MessageComplete => "message_complete",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A zero-copy `(offset, len)` view into the buffer handed to the current
/// [`Parser::execute`](crate::Parser::execute) call.
///
/// A span says nothing about any other buffer; copy the bytes out if they
/// must outlive the handler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// One past the last byte covered by the span.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Borrow the covered bytes out of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is not the buffer the span was issued for and is too
    /// short to contain it.
    pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.offset..self.end()]
    }
}

// ---------------------------------------------------------------------------
// Header / Message
// ---------------------------------------------------------------------------

/// A single header or trailer field, reassembled from its fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    /// Field name (original casing preserved).
    pub name: String,
    /// Field value (folds joined, surrounding OWS trimmed).
    pub value: String,
}

/// An owned HTTP message rebuilt from parser events by
/// [`MessageCollector`](crate::MessageCollector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// `Request` or `Response`; never `Either`.
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub version: HttpVersion,
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailers: Vec<Header>,
    #[serde(serialize_with = "serialize_body")]
    pub body: Option<Vec<u8>>,
    pub keep_alive: bool,
    pub upgrade: bool,
}

/// Serialize body bytes as a UTF-8 string (lossy) for JSON output.
fn serialize_body<S: Serializer>(body: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match body {
        None => s.serialize_none(),
        Some(bytes) => s.serialize_str(&String::from_utf8_lossy(bytes)),
    }
}

impl Message {
    /// Return the body as a UTF-8 `&str` if it is valid UTF-8.
    pub fn body_as_str(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Return the body as a lossy UTF-8 string (always succeeds).
    pub fn body_as_lossy_string(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Return the raw body bytes.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Look up the first header value by name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Return all values for headers matching `name` (case-insensitive).
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    /// Look up the first trailer value by name (case-insensitive).
    pub fn trailer_value(&self, name: &str) -> Option<&str> {
        self.trailers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Parse the `Content-Length` header, if present and valid.
    pub fn content_length(&self) -> Option<u64> {
        self.header_value("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Return `true` if the `Transfer-Encoding` header lists `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.header_values("transfer-encoding").iter().any(|v| {
            v.split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        })
    }
}
