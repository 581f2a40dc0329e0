use std::ops::Deref;

use crate::parser::ParserState;
use crate::types::{Event, Span};

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// What a handler tells the parser to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep parsing.
    #[default]
    Continue,
    /// Only meaningful from `on_headers_complete`: the message has no body
    /// whatever its framing headers say (e.g. the response to a `HEAD`).
    /// Treated as [`Flow::Continue`] everywhere else.
    SkipBody,
    /// Stop immediately and latch
    /// [`ErrorKind::CallbackAborted`](crate::ErrorKind::CallbackAborted).
    Abort,
}

impl Flow {
    /// The signed return code of this flow: `0`, `1` or `-1`.
    pub fn code(self) -> i32 {
        match self {
            Self::Continue => 0,
            Self::SkipBody => 1,
            Self::Abort => -1,
        }
    }
}

/// Signed return codes: zero continues, positive skips the body, negative
/// aborts.
impl From<i32> for Flow {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Continue,
            c if c > 0 => Self::SkipBody,
            _ => Self::Abort,
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// The parser as seen from inside a handler call.
///
/// Dereferences to the read-only [`ParserState`]; [`Context::pause`] is the
/// only mutation a handler may perform, and it exists only while the
/// handler runs.
pub struct Context<'p> {
    state: &'p mut ParserState,
}

impl<'p> Context<'p> {
    pub(crate) fn new(state: &'p mut ParserState) -> Self {
        Self { state }
    }

    /// Suspend parsing once this handler returns. `execute` then reports
    /// the bytes consumed so far; call
    /// [`Parser::unpause`](crate::Parser::unpause) before feeding the rest.
    pub fn pause(&mut self) {
        self.state.paused = true;
    }
}

impl Deref for Context<'_> {
    type Target = ParserState;

    fn deref(&self) -> &ParserState {
        &*self.state
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Receiver of parser events. Every method defaults to a no-op that
/// continues, so implementors only override what they need.
///
/// Data events get the whole buffer passed to the current `execute` call
/// plus the [`Span`] inside it. A field that straddles two `execute` calls
/// arrives as one event per fragment; concatenate them. A folded header
/// line arrives as further `on_header_value` fragments that begin with a
/// single whitespace byte.
///
/// A panicking handler unwinds straight out of `execute`.
pub trait Handler {
    fn on_message_begin(&mut self, _ctx: &mut Context<'_>) -> Flow {
        Flow::Continue
    }

    fn on_url(&mut self, _ctx: &mut Context<'_>, _data: &[u8], _span: Span) -> Flow {
        Flow::Continue
    }

    fn on_header_field(&mut self, _ctx: &mut Context<'_>, _data: &[u8], _span: Span) -> Flow {
        Flow::Continue
    }

    fn on_header_value(&mut self, _ctx: &mut Context<'_>, _data: &[u8], _span: Span) -> Flow {
        Flow::Continue
    }

    /// Return [`Flow::SkipBody`] to declare that no body follows.
    fn on_headers_complete(&mut self, _ctx: &mut Context<'_>) -> Flow {
        Flow::Continue
    }

    fn on_body(&mut self, _ctx: &mut Context<'_>, _data: &[u8], _span: Span) -> Flow {
        Flow::Continue
    }

    fn on_message_complete(&mut self, _ctx: &mut Context<'_>) -> Flow {
        Flow::Continue
    }
}

/// Ignores every event.
impl Handler for () {}

impl<H: Handler + ?Sized> Handler for &mut H {
    fn on_message_begin(&mut self, ctx: &mut Context<'_>) -> Flow {
        (**self).on_message_begin(ctx)
    }

    fn on_url(&mut self, ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        (**self).on_url(ctx, data, span)
    }

    fn on_header_field(&mut self, ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        (**self).on_header_field(ctx, data, span)
    }

    fn on_header_value(&mut self, ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        (**self).on_header_value(ctx, data, span)
    }

    fn on_headers_complete(&mut self, ctx: &mut Context<'_>) -> Flow {
        (**self).on_headers_complete(ctx)
    }

    fn on_body(&mut self, ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        (**self).on_body(ctx, data, span)
    }

    fn on_message_complete(&mut self, ctx: &mut Context<'_>) -> Flow {
        (**self).on_message_complete(ctx)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn on_message_begin(&mut self, ctx: &mut Context<'_>) -> Flow {
        (**self).on_message_begin(ctx)
    }

    fn on_url(&mut self, ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        (**self).on_url(ctx, data, span)
    }

    fn on_header_field(&mut self, ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        (**self).on_header_field(ctx, data, span)
    }

    fn on_header_value(&mut self, ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        (**self).on_header_value(ctx, data, span)
    }

    fn on_headers_complete(&mut self, ctx: &mut Context<'_>) -> Flow {
        (**self).on_headers_complete(ctx)
    }

    fn on_body(&mut self, ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        (**self).on_body(ctx, data, span)
    }

    fn on_message_complete(&mut self, ctx: &mut Context<'_>) -> Flow {
        (**self).on_message_complete(ctx)
    }
}

/// Route `event` to the matching handler method. Notification events
/// ignore `data` and `span`.
pub(crate) fn dispatch<H: Handler + ?Sized>(
    handler: &mut H,
    ctx: &mut Context<'_>,
    event: Event,
    data: &[u8],
    span: Span,
) -> Flow {
    match event {
        Event::MessageBegin => handler.on_message_begin(ctx),
        Event::Url => handler.on_url(ctx, data, span),
        Event::HeaderField => handler.on_header_field(ctx, data, span),
        Event::HeaderValue => handler.on_header_value(ctx, data, span),
        Event::HeadersComplete => handler.on_headers_complete(ctx),
        Event::Body => handler.on_body(ctx, data, span),
        Event::MessageComplete => handler.on_message_complete(ctx),
    }
}
