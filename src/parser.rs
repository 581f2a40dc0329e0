use std::mem;

use tracing::{debug, trace};

use crate::error::ErrorKind;
use crate::handler::{Context, Flow, Handler, dispatch};
use crate::token::{self, Digits, Matcher, TokenList};
use crate::types::{Event, HttpVersion, MessageKind, Method, Span};

const CR: u8 = b'\r';
const LF: u8 = b'\n';

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-instance parser settings.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Which messages to expect (default: `Either`).
    pub kind: MessageKind,
    /// Maximum bytes of start line plus header section (default: 80 KiB).
    /// A trailer section gets the same allowance of its own.
    pub max_header_size: usize,
    /// Maximum number of header lines (default: 128). Trailers are
    /// counted separately.
    pub max_headers_count: usize,
}

impl ParserConfig {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            kind: MessageKind::Either,
            max_header_size: 80 * 1024,
            max_headers_count: 128,
        }
    }
}

// ---------------------------------------------------------------------------
// Observable state
// ---------------------------------------------------------------------------

/// Coarse position of the parser in the HTTP/1.x grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    StartLine,
    HeaderField,
    HeaderValue,
    HeaderValueContinuation,
    HeadersDone,
    BodyIdentity,
    BodyChunkSize,
    BodyChunkData,
    BodyChunkTrailer,
    MessageDone,
    Error,
}

/// Framing decisions for the current message. Fixed once
/// `headers_complete` has fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// Body uses chunked transfer coding.
    pub chunked: bool,
    /// Body length comes from `Content-Length`.
    pub content_length: bool,
    /// The connection stays usable after this message.
    pub keep_alive: bool,
    /// The peer asked to switch protocols (or sent `CONNECT`).
    pub upgrade: bool,
    /// A handler declared that no body follows.
    pub skip_body: bool,
}

/// What the connection-related headers of the current message said.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Seen {
    close: bool,
    keep_alive: bool,
    connection_upgrade: bool,
    upgrade_header: bool,
}

impl Seen {
    fn connection_option(&mut self, index: usize) {
        match index {
            0 => self.keep_alive = true,
            1 => self.close = true,
            _ => self.connection_upgrade = true,
        }
    }
}

/// Header whose value feeds framing decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum HeaderKind {
    #[default]
    General,
    ContentLength,
    TransferEncoding,
    Connection,
    Upgrade,
}

impl HeaderKind {
    fn from_match(index: Option<usize>) -> Self {
        match index {
            Some(0) => Self::ContentLength,
            Some(1) => Self::TransferEncoding,
            Some(2) => Self::Connection,
            Some(3) => Self::Upgrade,
            _ => Self::General,
        }
    }

    fn token_mask(self) -> u32 {
        match self {
            Self::TransferEncoding => token::TRANSFER_CODINGS_MASK,
            Self::Connection => token::CONNECTION_TOKENS_MASK,
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Dead,

    // ---- Start line ----
    Start,
    StartToken,
    UrlStart,
    Url,
    VersionLiteral,
    VersionMajor,
    VersionDot,
    VersionMinor,
    VersionEnd,
    StatusCode,
    StatusEnd,
    Reason,
    StartLineLf,

    // ---- Header / trailer section ----
    HeaderFieldStart,
    HeaderField,
    HeaderValueOws,
    HeaderValue,
    HeaderValueLf,
    HeaderValueLws,
    HeaderValueFold,
    HeadersAlmostDone,

    // ---- Consume no bytes ----
    HeadersDone,
    MessageDone,

    // ---- Body ----
    BodyIdentity,
    BodyIdentityEof,
    ChunkSizeStart,
    ChunkSize,
    ChunkExt,
    ChunkSizeLf,
    ChunkData,
    ChunkDataCr,
    ChunkDataLf,

    // ---- Between messages ----
    Closed,
    Upgraded,
}

impl State {
    /// States whose bytes count towards the header size limit.
    fn in_head(self) -> bool {
        matches!(
            self,
            Self::StartToken
                | Self::UrlStart
                | Self::Url
                | Self::VersionLiteral
                | Self::VersionMajor
                | Self::VersionDot
                | Self::VersionMinor
                | Self::VersionEnd
                | Self::StatusCode
                | Self::StatusEnd
                | Self::Reason
                | Self::StartLineLf
                | Self::HeaderFieldStart
                | Self::HeaderField
                | Self::HeaderValueOws
                | Self::HeaderValue
                | Self::HeaderValueLf
                | Self::HeaderValueLws
                | Self::HeaderValueFold
                | Self::HeadersAlmostDone
        )
    }

    fn phase(self, trailer: bool) -> Phase {
        match self {
            Self::Dead => Phase::Error,
            Self::Start
            | Self::StartToken
            | Self::UrlStart
            | Self::Url
            | Self::VersionLiteral
            | Self::VersionMajor
            | Self::VersionDot
            | Self::VersionMinor
            | Self::VersionEnd
            | Self::StatusCode
            | Self::StatusEnd
            | Self::Reason
            | Self::StartLineLf => Phase::StartLine,
            _ if trailer && self.in_head() => Phase::BodyChunkTrailer,
            Self::HeaderFieldStart | Self::HeaderField | Self::HeadersAlmostDone => {
                Phase::HeaderField
            }
            Self::HeaderValueOws | Self::HeaderValue | Self::HeaderValueLf => Phase::HeaderValue,
            Self::HeaderValueLws | Self::HeaderValueFold => Phase::HeaderValueContinuation,
            Self::HeadersDone => Phase::HeadersDone,
            Self::BodyIdentity | Self::BodyIdentityEof => Phase::BodyIdentity,
            Self::ChunkSizeStart | Self::ChunkSize | Self::ChunkExt | Self::ChunkSizeLf => {
                Phase::BodyChunkSize
            }
            Self::ChunkData | Self::ChunkDataCr | Self::ChunkDataLf => Phase::BodyChunkData,
            Self::MessageDone | Self::Closed | Self::Upgraded => Phase::MessageDone,
        }
    }
}

/// Why a byte step stopped the scan loop.
enum Halt {
    /// The input violates the grammar; latch the error at this byte.
    Invalid(ErrorKind),
    /// A handler paused or aborted; the triggering byte is consumed.
    Yield,
}

impl From<ErrorKind> for Halt {
    fn from(kind: ErrorKind) -> Self {
        Self::Invalid(kind)
    }
}

// ---------------------------------------------------------------------------
// ParserState
// ---------------------------------------------------------------------------

/// Everything a parser remembers between `execute` calls.
///
/// Handlers see it read-only through [`Context`]. No buffer reference is
/// ever stored here: spans live only inside one `execute` call.
#[derive(Debug, Clone)]
pub struct ParserState {
    config: ParserConfig,
    kind: MessageKind,
    state: State,
    flags: Flags,
    seen: Seen,
    pub(crate) paused: bool,
    last_error: Option<ErrorKind>,

    // Start line
    http_major: u8,
    http_minor: u8,
    status_code: u16,
    method: Option<Method>,
    matcher: Matcher,
    index: u8,

    // Header section
    in_trailer: bool,
    header_bytes: usize,
    header_count: usize,
    header: HeaderKind,
    digits: Digits,
    tokens: TokenList,
    value_emitted: bool,

    // Body bookkeeping
    content_length: u64,
    chunk_size: u64,
}

impl ParserState {
    fn new(config: ParserConfig) -> Self {
        let mut state = Self {
            kind: config.kind,
            config,
            state: State::Start,
            flags: Flags::default(),
            seen: Seen::default(),
            paused: false,
            last_error: None,
            http_major: 0,
            http_minor: 0,
            status_code: 0,
            method: None,
            matcher: Matcher::default(),
            index: 0,
            in_trailer: false,
            header_bytes: 0,
            header_count: 0,
            header: HeaderKind::General,
            digits: Digits::default(),
            tokens: TokenList::default(),
            value_emitted: false,
            content_length: 0,
            chunk_size: 0,
        };
        state.begin_message();
        state
    }

    // ----- public query ---------------------------------------------------

    /// `Request` or `Response`, or `Either` until the first start line
    /// has shown which.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.state.phase(self.in_trailer)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn http_major(&self) -> u8 {
        self.http_major
    }

    pub fn http_minor(&self) -> u8 {
        self.http_minor
    }

    pub fn version(&self) -> HttpVersion {
        HttpVersion {
            major: self.http_major,
            minor: self.http_minor,
        }
    }

    /// Status code of the current response; `0` for requests.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Method of the current request; `None` for responses.
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn upgrade_requested(&self) -> bool {
        self.flags.upgrade
    }

    /// Whether the connection may carry another message after this one.
    /// Known once `headers_complete` fires.
    pub fn should_keep_alive(&self) -> bool {
        self.flags.keep_alive
    }

    /// Body bytes still expected under `Content-Length` framing.
    pub fn content_length_remaining(&self) -> Option<u64> {
        self.flags.content_length.then_some(self.content_length)
    }

    // ----- transitions ----------------------------------------------------

    /// Clear per-message state ahead of a new start line.
    fn begin_message(&mut self) {
        self.flags = Flags::default();
        self.seen = Seen::default();
        self.http_major = 0;
        self.http_minor = 0;
        self.status_code = 0;
        self.method = None;
        self.index = 0;
        self.in_trailer = false;
        self.header_bytes = 0;
        self.header_count = 0;
        self.header = HeaderKind::General;
        self.value_emitted = false;
        self.content_length = 0;
        self.chunk_size = 0;
        self.matcher = Matcher::new(match self.kind {
            MessageKind::Request => token::METHOD_MASK,
            MessageKind::Response => token::RESPONSE_MASK,
            MessageKind::Either => token::METHOD_MASK | token::RESPONSE_MASK,
        });
    }

    /// Method token, or `HTTP/` of a status line.
    fn start_token(&mut self, byte: u8) -> Result<(), ErrorKind> {
        if byte == b' ' {
            let method = self
                .matcher
                .matched(&token::START_TOKENS)
                .and_then(|i| u8::try_from(i).ok())
                .and_then(Method::from_code)
                .ok_or_else(|| self.start_token_error())?;
            self.method = Some(method);
            self.kind = MessageKind::Request;
            self.state = State::UrlStart;
            return Ok(());
        }

        self.matcher.feed(&token::START_TOKENS, byte);
        if self.matcher.is_dead() {
            return Err(self.start_token_error());
        }
        if self.matcher.matched(&token::START_TOKENS) == Some(token::RESPONSE_TOKEN) {
            self.kind = MessageKind::Response;
            self.state = State::VersionMajor;
        }
        Ok(())
    }

    fn start_token_error(&self) -> ErrorKind {
        match self.kind {
            MessageKind::Response => ErrorKind::InvalidStartLine,
            _ => ErrorKind::InvalidMethod,
        }
    }

    /// First byte of a header line, or the CR of the empty line.
    fn field_start(
        &mut self,
        byte: u8,
        p: usize,
        mark: &mut Option<usize>,
    ) -> Result<(), ErrorKind> {
        if byte == CR {
            self.state = State::HeadersAlmostDone;
            return Ok(());
        }
        if !token::is_tchar(byte) {
            return Err(ErrorKind::HeaderMalformed);
        }

        self.header_count += 1;
        if self.header_count > self.config.max_headers_count {
            return Err(ErrorKind::HeaderOverflow);
        }

        let candidates = if self.in_trailer {
            0
        } else {
            token::FRAMING_HEADERS_MASK
        };
        self.matcher = Matcher::new(candidates);
        self.matcher
            .feed(&token::FRAMING_HEADERS, byte.to_ascii_lowercase());
        self.value_emitted = false;
        self.state = State::HeaderField;
        *mark = Some(p);
        Ok(())
    }

    /// The `:` ending a field name.
    fn field_end(&mut self) {
        self.header = if self.in_trailer {
            HeaderKind::General
        } else {
            HeaderKind::from_match(self.matcher.matched(&token::FRAMING_HEADERS))
        };
        self.digits = Digits::default();
        self.tokens = TokenList::new(self.header.token_mask());
        self.state = State::HeaderValueOws;
    }

    /// Feed one byte of a field value to the framing recognisers.
    fn scan_value(&mut self, byte: u8) -> Result<(), ErrorKind> {
        match self.header {
            HeaderKind::General | HeaderKind::Upgrade => {}
            HeaderKind::ContentLength => {
                if !self.digits.push(byte) {
                    return Err(ErrorKind::HeaderMalformed);
                }
            }
            HeaderKind::TransferEncoding => {
                if self.tokens.push(&token::TRANSFER_CODINGS, byte).is_some() {
                    self.flags.chunked = true;
                }
            }
            HeaderKind::Connection => {
                if let Some(i) = self.tokens.push(&token::CONNECTION_TOKENS, byte) {
                    self.seen.connection_option(i);
                }
            }
        }
        Ok(())
    }

    /// The field value is over (the next line is not a fold).
    fn finish_field(&mut self) -> Result<(), ErrorKind> {
        match self.header {
            HeaderKind::General => {}
            HeaderKind::ContentLength => {
                let value = self.digits.value().ok_or(ErrorKind::HeaderMalformed)?;
                if self.flags.content_length && self.content_length != value {
                    return Err(ErrorKind::HeaderMalformed);
                }
                self.content_length = value;
                self.flags.content_length = true;
            }
            HeaderKind::TransferEncoding => {
                if self.tokens.finish(&token::TRANSFER_CODINGS).is_some() {
                    self.flags.chunked = true;
                }
            }
            HeaderKind::Connection => {
                if let Some(i) = self.tokens.finish(&token::CONNECTION_TOKENS) {
                    self.seen.connection_option(i);
                }
            }
            HeaderKind::Upgrade => self.seen.upgrade_header = true,
        }
        self.header = HeaderKind::General;
        Ok(())
    }

    /// Settle the framing flags that headers_complete reports.
    fn settle_headers(&mut self) {
        // Transfer-Encoding takes precedence over Content-Length.
        if self.flags.chunked {
            self.flags.content_length = false;
            self.content_length = 0;
        }
        self.flags.upgrade = (self.seen.upgrade_header && self.seen.connection_upgrade)
            || self.method == Some(Method::CONNECT);
        self.flags.keep_alive = self.keeps_alive();
    }

    /// Pick the body state once the headers_complete handler has spoken.
    fn frame_body(&mut self) {
        self.state = if self.flags.skip_body || self.flags.upgrade {
            State::MessageDone
        } else if self.flags.chunked {
            State::ChunkSizeStart
        } else if self.flags.content_length {
            if self.content_length == 0 {
                State::MessageDone
            } else {
                State::BodyIdentity
            }
        } else if self.needs_eof() {
            State::BodyIdentityEof
        } else {
            State::MessageDone
        };
        self.flags.keep_alive = self.keeps_alive();
    }

    /// The body runs until the connection closes.
    fn needs_eof(&self) -> bool {
        if self.kind != MessageKind::Response {
            return false;
        }
        if self.status_code / 100 == 1
            || self.status_code == 204
            || self.status_code == 304
            || self.flags.skip_body
        {
            return false;
        }
        !(self.flags.chunked || self.flags.content_length)
    }

    fn keeps_alive(&self) -> bool {
        let persistent = if (self.http_major, self.http_minor) >= (1, 1) {
            !self.seen.close
        } else {
            self.seen.keep_alive
        };
        persistent && !self.needs_eof()
    }

    /// Offset of the span still open when a new buffer starts.
    fn open_span(&self) -> Option<usize> {
        matches!(self.state, State::Url | State::HeaderField | State::HeaderValue).then_some(0)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// An incremental, zero-copy HTTP/1.x parser that reports what it sees to
/// an owned [`Handler`].
///
/// # Usage
///
/// ```rust
/// use httpspan::{Context, Flow, Handler, MessageKind, Parser, ParserConfig, Span};
///
/// #[derive(Default)]
/// struct Urls(Vec<u8>);
///
/// impl Handler for Urls {
///     fn on_url(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
///         self.0.extend_from_slice(span.slice(data));
///         Flow::Continue
///     }
/// }
///
/// let mut parser = Parser::new(ParserConfig::new(MessageKind::Request), Urls::default());
/// let input = b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n";
///
/// // Feed data (possibly in multiple calls).
/// let (head, tail) = input.split_at(7);
/// assert_eq!(parser.execute(head), head.len());
/// assert_eq!(parser.execute(tail), tail.len());
/// assert_eq!(parser.handler().0, b"/hello");
/// ```
#[derive(Debug)]
pub struct Parser<H> {
    state: ParserState,
    handler: H,
}

impl<H> Parser<H> {
    /// Create a parser that reports to `handler`.
    pub fn new(config: ParserConfig, handler: H) -> Self {
        Self {
            state: ParserState::new(config),
            handler,
        }
    }

    /// Reinitialize for a new stream of `kind` messages. This is the only
    /// way out of a latched error.
    pub fn reset(&mut self, kind: MessageKind) {
        let config = ParserConfig {
            kind,
            ..self.state.config.clone()
        };
        self.state = ParserState::new(config);
    }

    /// Swap in a new handler without touching parse progress; events of
    /// the message in flight go to `handler` from now on. Returns the old
    /// handler.
    pub fn rebind(&mut self, handler: H) -> H {
        mem::replace(&mut self.handler, handler)
    }

    /// Clear a pause requested by a handler.
    pub fn unpause(&mut self) {
        self.state.paused = false;
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn http_major(&self) -> u8 {
        self.state.http_major()
    }

    pub fn http_minor(&self) -> u8 {
        self.state.http_minor()
    }

    pub fn status_code(&self) -> u16 {
        self.state.status_code()
    }

    pub fn method(&self) -> Option<Method> {
        self.state.method()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.state.last_error()
    }

    pub fn upgrade_requested(&self) -> bool {
        self.state.upgrade_requested()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }
}

impl<H: Handler> Parser<H> {
    /// Parse as much of `data` as possible and return how many bytes were
    /// consumed.
    ///
    /// A count below `data.len()` means one of: an error was latched
    /// (see [`Parser::last_error`]), a handler paused or aborted, or an
    /// upgrade was requested and the remaining bytes belong to the new
    /// protocol. A latched error or an active pause makes this return `0`.
    ///
    /// A full count does not mean success: a handler may pause or abort on
    /// the fragment flushed at the end of the buffer, after every byte was
    /// consumed. Check [`Parser::last_error`] and [`Parser::is_paused`]
    /// after each call.
    pub fn execute(&mut self, data: &[u8]) -> usize {
        if self.state.last_error.is_some() || self.state.paused {
            return 0;
        }

        let mut mark = self.state.open_span();
        let mut p = 0;

        loop {
            let outcome = match self.state.state {
                State::Dead | State::Upgraded => return p,
                State::HeadersDone => self.headers_done(),
                State::MessageDone => self.message_done(),
                _ if p == data.len() => break,
                State::BodyIdentity | State::BodyIdentityEof | State::ChunkData => {
                    self.read_body(data, &mut p)
                }
                _ => {
                    let outcome = self.step(data, p, &mut mark);
                    if !matches!(outcome, Err(Halt::Invalid(_))) {
                        p += 1;
                    }
                    outcome
                }
            };

            match outcome {
                Ok(()) => {}
                Err(Halt::Yield) => return p,
                Err(Halt::Invalid(kind)) => {
                    self.fail(kind);
                    return p;
                }
            }
        }

        self.flush(data, mark);
        data.len()
    }

    /// Signal end of input.
    ///
    /// Completes a response whose body runs until the connection closes;
    /// latches [`ErrorKind::ChunkDataUnderrun`] or
    /// [`ErrorKind::UnexpectedEof`] if a message was cut short. A pending
    /// pause is cleared first: no more input is coming to wait for.
    pub fn finish(&mut self) -> Result<(), ErrorKind> {
        self.drain();
        if let Some(kind) = self.state.last_error {
            return Err(kind);
        }

        match self.state.state {
            State::Start | State::Closed | State::Upgraded => Ok(()),
            State::BodyIdentityEof => {
                self.state.state = State::MessageDone;
                self.drain();
                self.state.last_error.map_or(Ok(()), Err)
            }
            State::ChunkData => Err(self.fail(ErrorKind::ChunkDataUnderrun)),
            _ => Err(self.fail(ErrorKind::UnexpectedEof)),
        }
    }

    /// Run the transitions that consume no input, unpausing as often as
    /// handlers pause them.
    fn drain(&mut self) {
        loop {
            self.state.paused = false;
            self.execute(&[]);
            if !self.state.paused {
                break;
            }
        }
    }

    // ----- scanning -------------------------------------------------------

    /// Advance over the byte at `p`.
    fn step(&mut self, data: &[u8], p: usize, mark: &mut Option<usize>) -> Result<(), Halt> {
        let byte = data[p];
        let st = &mut self.state;

        if st.state.in_head() {
            st.header_bytes += 1;
            if st.header_bytes > st.config.max_header_size {
                return Err(ErrorKind::HeaderOverflow.into());
            }
        }

        match st.state {
            // ===================== START LINE =====================
            State::Start => {
                if byte == CR || byte == LF {
                    return Ok(());
                }
                st.begin_message();
                st.state = State::StartToken;
                st.header_bytes = 1;
                st.start_token(byte)?;
                self.notify(Event::MessageBegin)?;
            }

            State::Closed => {
                if byte != CR && byte != LF {
                    return Err(ErrorKind::ClosedConnection.into());
                }
            }

            State::StartToken => st.start_token(byte)?,

            State::UrlStart => {
                if !token::is_url_byte(byte) {
                    return Err(ErrorKind::InvalidUrl.into());
                }
                st.state = State::Url;
                *mark = Some(p);
            }

            State::Url => {
                if byte == b' ' {
                    st.state = State::VersionLiteral;
                    st.index = 0;
                    self.close_span(Event::Url, data, p, mark)?;
                } else if byte == CR || byte == LF {
                    return Err(ErrorKind::InvalidStartLine.into());
                } else if !token::is_url_byte(byte) {
                    return Err(ErrorKind::InvalidUrl.into());
                }
            }

            State::VersionLiteral => {
                if b"HTTP/".get(usize::from(st.index)) != Some(&byte) {
                    return Err(ErrorKind::InvalidVersion.into());
                }
                st.index += 1;
                if st.index == 5 {
                    st.state = State::VersionMajor;
                }
            }

            State::VersionMajor => {
                if !byte.is_ascii_digit() {
                    return Err(ErrorKind::InvalidVersion.into());
                }
                st.http_major = byte - b'0';
                st.state = State::VersionDot;
            }

            State::VersionDot => {
                if byte != b'.' {
                    return Err(ErrorKind::InvalidVersion.into());
                }
                st.state = State::VersionMinor;
            }

            State::VersionMinor => {
                if !byte.is_ascii_digit() {
                    return Err(ErrorKind::InvalidVersion.into());
                }
                st.http_minor = byte - b'0';
                st.state = State::VersionEnd;
            }

            State::VersionEnd => match (st.kind, byte) {
                (MessageKind::Request, CR) => st.state = State::StartLineLf,
                (MessageKind::Response, b' ') => {
                    st.index = 0;
                    st.state = State::StatusCode;
                }
                _ => return Err(ErrorKind::InvalidVersion.into()),
            },

            State::StatusCode => {
                if !byte.is_ascii_digit() {
                    return Err(ErrorKind::InvalidStatus.into());
                }
                st.status_code = st.status_code * 10 + u16::from(byte - b'0');
                st.index += 1;
                if st.index == 3 {
                    st.state = State::StatusEnd;
                }
            }

            State::StatusEnd => match byte {
                b' ' => st.state = State::Reason,
                CR => st.state = State::StartLineLf,
                _ => return Err(ErrorKind::InvalidStatus.into()),
            },

            State::Reason => {
                if byte == CR {
                    st.state = State::StartLineLf;
                } else if !token::is_field_content_byte(byte) {
                    return Err(ErrorKind::InvalidStartLine.into());
                }
            }

            State::StartLineLf => {
                if byte != LF {
                    return Err(ErrorKind::InvalidStartLine.into());
                }
                st.state = State::HeaderFieldStart;
            }

            // ===================== HEADERS / TRAILERS =====================
            State::HeaderFieldStart => st.field_start(byte, p, mark)?,

            State::HeaderField => {
                if byte == b':' {
                    st.field_end();
                    self.close_span(Event::HeaderField, data, p, mark)?;
                } else if token::is_tchar(byte) {
                    st.matcher
                        .feed(&token::FRAMING_HEADERS, byte.to_ascii_lowercase());
                } else {
                    return Err(ErrorKind::HeaderMalformed.into());
                }
            }

            State::HeaderValueOws => {
                if token::is_ows(byte) {
                    // Leading OWS is not part of the value.
                } else if byte == CR {
                    st.state = State::HeaderValueLf;
                    self.close_value(data, p, mark)?;
                } else if token::is_field_content_byte(byte) {
                    st.scan_value(byte)?;
                    st.state = State::HeaderValue;
                    *mark = Some(p);
                } else {
                    return Err(ErrorKind::HeaderMalformed.into());
                }
            }

            State::HeaderValue => {
                if byte == CR {
                    st.state = State::HeaderValueLf;
                    self.close_value(data, p, mark)?;
                } else if token::is_field_content_byte(byte) {
                    st.scan_value(byte)?;
                } else {
                    return Err(ErrorKind::HeaderMalformed.into());
                }
            }

            State::HeaderValueLf => {
                if byte != LF {
                    return Err(ErrorKind::HeaderMalformed.into());
                }
                st.state = State::HeaderValueLws;
            }

            State::HeaderValueLws => {
                if token::is_ows(byte) {
                    // obs-fold: the line continues the previous value and
                    // its first whitespace byte stands in for the fold.
                    st.scan_value(b' ')?;
                    st.state = State::HeaderValueFold;
                    *mark = Some(p);
                } else {
                    st.finish_field()?;
                    st.field_start(byte, p, mark)?;
                }
            }

            State::HeaderValueFold => {
                if token::is_ows(byte) {
                    if let Some(start) = mark.take() {
                        self.emit(Event::HeaderValue, data, Span::new(start, 1))?;
                    }
                } else if byte == CR {
                    st.state = State::HeaderValueLf;
                    self.close_value(data, p, mark)?;
                } else if token::is_field_content_byte(byte) {
                    st.scan_value(byte)?;
                    st.state = State::HeaderValue;
                    if mark.is_none() {
                        *mark = Some(p);
                    }
                } else {
                    return Err(ErrorKind::HeaderMalformed.into());
                }
            }

            State::HeadersAlmostDone => {
                if byte != LF {
                    return Err(ErrorKind::HeaderMalformed.into());
                }
                st.state = if st.in_trailer {
                    State::MessageDone
                } else {
                    State::HeadersDone
                };
            }

            // ===================== CHUNKED ENCODING =====================
            State::ChunkSizeStart => {
                let digit = token::hex_value(byte).ok_or(ErrorKind::InvalidChunkSize)?;
                st.chunk_size = u64::from(digit);
                st.state = State::ChunkSize;
            }

            State::ChunkSize => match byte {
                CR => st.state = State::ChunkSizeLf,
                // BWS may precede the extensions or the line end.
                b';' | b' ' | b'\t' => st.state = State::ChunkExt,
                _ => {
                    let digit = token::hex_value(byte).ok_or(ErrorKind::InvalidChunkSize)?;
                    st.chunk_size = st
                        .chunk_size
                        .checked_mul(16)
                        .and_then(|size| size.checked_add(u64::from(digit)))
                        .ok_or(ErrorKind::InvalidChunkSize)?;
                }
            },

            State::ChunkExt => {
                if byte == CR {
                    st.state = State::ChunkSizeLf;
                } else if !token::is_chunk_ext_byte(byte) {
                    return Err(ErrorKind::InvalidChunkSize.into());
                }
            }

            State::ChunkSizeLf => {
                if byte != LF {
                    return Err(ErrorKind::InvalidChunkSize.into());
                }
                if st.chunk_size == 0 {
                    // Last chunk: a trailer section follows.
                    st.in_trailer = true;
                    st.header_bytes = 0;
                    st.header_count = 0;
                    st.state = State::HeaderFieldStart;
                } else {
                    st.state = State::ChunkData;
                }
            }

            State::ChunkDataCr => {
                if byte != CR {
                    return Err(ErrorKind::ChunkDataOverrun.into());
                }
                st.state = State::ChunkDataLf;
            }

            State::ChunkDataLf => {
                if byte != LF {
                    return Err(ErrorKind::ChunkDataOverrun.into());
                }
                st.state = State::ChunkSizeStart;
            }

            State::Dead
            | State::Upgraded
            | State::HeadersDone
            | State::MessageDone
            | State::BodyIdentity
            | State::BodyIdentityEof
            | State::ChunkData => {
                unreachable!("handled by execute without the byte-by-byte path");
            }
        }

        Ok(())
    }

    /// Deliver as much body as this buffer holds for the current framing.
    fn read_body(&mut self, data: &[u8], p: &mut usize) -> Result<(), Halt> {
        let start = *p;
        let available = data.len() - start;
        let st = &mut self.state;

        let n = match st.state {
            State::BodyIdentity => {
                let n = clamp(st.content_length, available);
                st.content_length -= n as u64;
                if st.content_length == 0 {
                    st.state = State::MessageDone;
                }
                n
            }
            State::ChunkData => {
                let n = clamp(st.chunk_size, available);
                st.chunk_size -= n as u64;
                if st.chunk_size == 0 {
                    st.state = State::ChunkDataCr;
                }
                n
            }
            _ => available,
        };

        *p += n;
        self.emit(Event::Body, data, Span::new(start, n))
    }

    fn headers_done(&mut self) -> Result<(), Halt> {
        self.state.settle_headers();
        if self.notify(Event::HeadersComplete)? == Flow::SkipBody {
            self.state.flags.skip_body = true;
        }
        self.state.frame_body();
        self.checkpoint()
    }

    fn message_done(&mut self) -> Result<(), Halt> {
        self.notify(Event::MessageComplete)?;

        let st = &mut self.state;
        trace!(kind = ?st.kind, keep_alive = st.flags.keep_alive, "message complete");
        st.state = if st.flags.upgrade {
            trace!("upgrade requested, remaining bytes belong to the new protocol");
            State::Upgraded
        } else if st.flags.keep_alive {
            State::Start
        } else {
            State::Closed
        };
        self.checkpoint()
    }

    /// Report the span still open at the end of the buffer.
    fn flush(&mut self, data: &[u8], mark: Option<usize>) {
        let Some(start) = mark else { return };
        let event = match self.state.state {
            State::Url => Event::Url,
            State::HeaderField => Event::HeaderField,
            State::HeaderValue | State::HeaderValueFold => Event::HeaderValue,
            _ => return,
        };
        if data.len() > start {
            // The buffer is spent either way; a pause or abort takes
            // effect on the next call.
            let _ = self.emit(event, data, Span::new(start, data.len() - start));
        }
    }

    // ----- dispatch -------------------------------------------------------

    fn close_span(
        &mut self,
        event: Event,
        data: &[u8],
        p: usize,
        mark: &mut Option<usize>,
    ) -> Result<(), Halt> {
        match mark.take() {
            Some(start) if p > start => self.emit(event, data, Span::new(start, p - start)),
            _ => Ok(()),
        }
    }

    /// Close a header value at its CR. An entirely empty value still gets
    /// one zero-length event so fields and values stay paired.
    fn close_value(&mut self, data: &[u8], p: usize, mark: &mut Option<usize>) -> Result<(), Halt> {
        match mark.take() {
            Some(start) if p > start => {
                self.emit(Event::HeaderValue, data, Span::new(start, p - start))
            }
            _ if !self.state.value_emitted => self.emit(Event::HeaderValue, data, Span::new(p, 0)),
            _ => Ok(()),
        }
    }

    fn emit(&mut self, event: Event, data: &[u8], span: Span) -> Result<(), Halt> {
        debug_assert!(span.end() <= data.len());
        if event == Event::HeaderValue {
            self.state.value_emitted = true;
        }
        let flow = self.call(event, data, span);
        self.settle(event, flow)?;
        self.checkpoint()
    }

    /// Fire a notification event. Pausing is left to the caller for
    /// headers_complete, whose transition depends on the returned flow.
    fn notify(&mut self, event: Event) -> Result<Flow, Halt> {
        let flow = self.call(event, &[], Span::new(0, 0));
        let flow = self.settle(event, flow)?;
        if event != Event::HeadersComplete && event != Event::MessageComplete {
            self.checkpoint()?;
        }
        Ok(flow)
    }

    fn call(&mut self, event: Event, data: &[u8], span: Span) -> Flow {
        let Self { state, handler } = self;
        dispatch(handler, &mut Context::new(state), event, data, span)
    }

    fn settle(&mut self, event: Event, flow: Flow) -> Result<Flow, Halt> {
        if flow == Flow::Abort {
            self.fail(ErrorKind::CallbackAborted(event));
            return Err(Halt::Yield);
        }
        Ok(flow)
    }

    fn checkpoint(&self) -> Result<(), Halt> {
        if self.state.paused {
            trace!(phase = ?self.state.phase(), "parser paused");
            return Err(Halt::Yield);
        }
        Ok(())
    }

    /// Latch `kind`; the parser consumes nothing more until `reset`.
    fn fail(&mut self, kind: ErrorKind) -> ErrorKind {
        debug!(
            error = %kind,
            code = kind.name(),
            phase = ?self.state.phase(),
            "http parse error"
        );
        self.state.state = State::Dead;
        self.state.last_error = Some(kind);
        kind
    }
}

/// Bytes of `remaining` available in a buffer holding `available`.
fn clamp(remaining: u64, available: usize) -> usize {
    usize::try_from(remaining).map_or(available, |r| r.min(available))
}
