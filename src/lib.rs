//! # httpspan
//!
//! An **incremental, zero-copy HTTP/1.x parser** that reports what it sees
//! to a caller-supplied [`Handler`], designed for use both as a Rust
//! library and as a CLI tool.
//!
//! The parser accepts requests and responses in arbitrarily-sized chunks
//! and never buffers message content: textual fields reach the handler as
//! [`Span`]s into the buffer passed to the current [`Parser::execute`]
//! call. It handles pipelined messages, folded headers, chunked transfer
//! coding with trailers, `Upgrade` hand-off and cooperative pausing.
//!
//! ## Quick start — one-shot parsing
//!
//! ```rust
//! use httpspan::{parse_message, MessageKind};
//!
//! let raw = b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let message = parse_message(raw, MessageKind::Request).expect("valid request");
//! assert_eq!(message.method.map(|m| m.as_str()), Some("GET"));
//! assert_eq!(message.url.as_deref(), Some("/hello"));
//! ```
//!
//! ## Quick start — streaming events
//!
//! ```rust
//! use httpspan::{Context, Flow, Handler, Parser, ParserConfig, Span};
//!
//! #[derive(Default)]
//! struct BodySize(usize);
//!
//! impl Handler for BodySize {
//!     fn on_body(&mut self, _ctx: &mut Context<'_>, _data: &[u8], span: Span) -> Flow {
//!         self.0 += span.len;
//!         Flow::Continue
//!     }
//! }
//!
//! let mut parser = Parser::new(ParserConfig::default(), BodySize::default());
//! parser.execute(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhel");
//! parser.execute(b"lo");
//! assert_eq!(parser.status_code(), 200);
//! assert_eq!(parser.handler().0, 5);
//! ```

mod collect;
mod error;
mod handler;
mod output;
mod parser;
mod token;
mod types;

// Re-export public API.
pub use collect::{EventLog, MessageCollector, Record};
pub use error::{ErrorKind, ParseError};
pub use handler::{Context, Flow, Handler};
pub use output::{format_debug, format_events, format_headers_only, format_json};
pub use parser::{Flags, Parser, ParserConfig, ParserState, Phase};
pub use types::{Event, Header, HttpVersion, Message, MessageKind, Method, Span};

/// Stable human-readable text for an error kind.
pub fn error_to_string(kind: ErrorKind) -> String {
    kind.to_string()
}

/// Drive `handler` over `chunks` as one input stream, then signal end of
/// input. Returns the handler once the stream parsed cleanly.
///
/// A pause requested by the handler is lifted straight away and parsing
/// carries on with the rest of the chunk.
///
/// Parsing stops early after a message that requests an upgrade; the bytes
/// that follow it are left alone.
///
/// # Errors
///
/// Returns [`ParseError::Incomplete`] if the input ends inside a message
/// and [`ParseError::Invalid`] for any other latched error, with the
/// number of bytes consumed before it.
pub fn parse_chunks<'a, H, I>(chunks: I, config: ParserConfig, handler: H) -> Result<H, ParseError>
where
    H: Handler,
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut parser = Parser::new(config, handler);
    let mut offset = 0;

    'feed: for chunk in chunks {
        let mut rest = chunk;
        loop {
            let consumed = parser.execute(rest);
            offset += consumed;
            rest = &rest[consumed..];
            if let Some(kind) = parser.last_error() {
                return Err(ParseError::Invalid { kind, offset });
            }
            if parser.is_paused() {
                parser.unpause();
                continue;
            }
            if !rest.is_empty() && parser.upgrade_requested() {
                tracing::debug!(offset, "upgrade requested; remaining input left unparsed");
                break 'feed;
            }
            break;
        }
    }

    match parser.finish() {
        Ok(()) => Ok(parser.into_handler()),
        Err(ErrorKind::UnexpectedEof | ErrorKind::ChunkDataUnderrun) => {
            Err(ParseError::Incomplete)
        }
        Err(kind) => Err(ParseError::Invalid { kind, offset }),
    }
}

/// Parse every complete message in `data`.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed or ends inside a
/// message.
pub fn parse_messages(data: &[u8], kind: MessageKind) -> Result<Vec<Message>, ParseError> {
    parse_messages_with_config(data, ParserConfig::new(kind))
}

/// Parse every complete message in `data` using custom [`ParserConfig`]
/// limits.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed, incomplete, or
/// exceeds the configured limits.
pub fn parse_messages_with_config(
    data: &[u8],
    config: ParserConfig,
) -> Result<Vec<Message>, ParseError> {
    parse_chunks([data], config, MessageCollector::default())
        .map(MessageCollector::into_messages)
}

/// Parse the first message in `data`.
///
/// # Errors
///
/// Returns [`ParseError::Incomplete`] if `data` holds no complete message.
pub fn parse_message(data: &[u8], kind: MessageKind) -> Result<Message, ParseError> {
    parse_messages(data, kind)?
        .into_iter()
        .next()
        .ok_or(ParseError::Incomplete)
}
