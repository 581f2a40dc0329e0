use thiserror::Error;

use crate::types::Event;

/// Terminal conditions latched into a parser's `last_error`.
///
/// The `Display` text of each kind is stable and is what
/// [`error_to_string`](crate::error_to_string) returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// A handler asked to abort while handling the given event.
    #[error("the {0} callback failed")]
    CallbackAborted(Event),
    /// The stream ended in the middle of a message.
    #[error("stream ended at an unexpected time")]
    UnexpectedEof,
    /// Bytes arrived after a message that closes the connection.
    #[error("data received after completed connection: close message")]
    ClosedConnection,
    /// The request or status line is structurally broken.
    #[error("invalid request or status line")]
    InvalidStartLine,
    /// The first token is not a known method.
    #[error("invalid HTTP method")]
    InvalidMethod,
    /// The request target is empty or contains forbidden bytes.
    #[error("invalid URL")]
    InvalidUrl,
    /// The version is not `HTTP/<digit>.<digit>`.
    #[error("invalid HTTP version")]
    InvalidVersion,
    /// The status code is not three digits.
    #[error("invalid HTTP status code")]
    InvalidStatus,
    /// A header or trailer line violates the field grammar, or a framing
    /// header (`Content-Length`) carries an unusable value.
    #[error("malformed header line")]
    HeaderMalformed,
    /// The header section exceeds the configured byte or line limit.
    #[error("too many header bytes seen; overflow detected")]
    HeaderOverflow,
    /// A chunk-size line is not `hex-size [; ext] CRLF`.
    #[error("invalid character in chunk size header")]
    InvalidChunkSize,
    /// Chunk data is not followed by CRLF where its declared size ends.
    #[error("chunk data longer than its declared size")]
    ChunkDataOverrun,
    /// The stream ended before a chunk delivered its declared size.
    #[error("stream ended inside chunk data")]
    ChunkDataUnderrun,
}

impl ErrorKind {
    /// Stable upper-case identifier for the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CallbackAborted(_) => "CALLBACK_ABORTED",
            Self::UnexpectedEof => "UNEXPECTED_EOF",
            Self::ClosedConnection => "CLOSED_CONNECTION",
            Self::InvalidStartLine => "INVALID_START_LINE",
            Self::InvalidMethod => "INVALID_METHOD",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidVersion => "INVALID_VERSION",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::HeaderMalformed => "HEADER_MALFORMED",
            Self::HeaderOverflow => "HEADER_OVERFLOW",
            Self::InvalidChunkSize => "INVALID_CHUNK_SIZE",
            Self::ChunkDataOverrun => "CHUNK_DATA_OVERRUN",
            Self::ChunkDataUnderrun => "CHUNK_DATA_UNDERRUN",
        }
    }
}

/// Errors returned by the owned, one-shot parsing helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The parser latched `kind` after consuming `offset` bytes.
    #[error("{kind} (at byte {offset})")]
    Invalid { kind: ErrorKind, offset: usize },
    /// The input ended before a complete message was parsed.
    #[error("incomplete HTTP message")]
    Incomplete,
}
