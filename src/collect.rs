//! Handlers that turn the event stream into owned values.

use crate::handler::{Context, Flow, Handler};
use crate::types::{Event, Header, Message, MessageKind, Span};

// ---------------------------------------------------------------------------
// MessageCollector
// ---------------------------------------------------------------------------

/// Rebuilds owned [`Message`]s from parser events.
///
/// Fragments of a split field are concatenated, folded lines are joined
/// and surrounding OWS is trimmed from values. Fields seen after
/// `headers_complete` are recorded as trailers.
#[derive(Debug, Default)]
pub struct MessageCollector {
    skip_body: bool,
    messages: Vec<Message>,
    current: Partial,
}

#[derive(Debug, Default)]
struct Partial {
    url: Vec<u8>,
    headers: Vec<(Vec<u8>, Vec<u8>)>,
    trailers: Vec<(Vec<u8>, Vec<u8>)>,
    body: Option<Vec<u8>>,
    headers_done: bool,
    in_value: bool,
}

impl Partial {
    fn fields(&mut self) -> &mut Vec<(Vec<u8>, Vec<u8>)> {
        if self.headers_done {
            &mut self.trailers
        } else {
            &mut self.headers
        }
    }
}

impl MessageCollector {
    /// A collector whose `headers_complete` answers [`Flow::SkipBody`] when
    /// `skip_body` is set (responses to `HEAD`).
    pub fn with_skip_body(skip_body: bool) -> Self {
        Self {
            skip_body,
            ..Self::default()
        }
    }

    /// Messages completed so far, in stream order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl Handler for MessageCollector {
    fn on_message_begin(&mut self, _ctx: &mut Context<'_>) -> Flow {
        self.current = Partial::default();
        Flow::Continue
    }

    fn on_url(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        self.current.url.extend_from_slice(span.slice(data));
        Flow::Continue
    }

    fn on_header_field(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        let bytes = span.slice(data);
        let starts_new = self.current.in_value;
        let fields = self.current.fields();
        match fields.last_mut() {
            Some((name, _)) if !starts_new => name.extend_from_slice(bytes),
            _ => fields.push((bytes.to_vec(), Vec::new())),
        }
        self.current.in_value = false;
        Flow::Continue
    }

    fn on_header_value(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        if let Some((_, value)) = self.current.fields().last_mut() {
            value.extend_from_slice(span.slice(data));
        }
        self.current.in_value = true;
        Flow::Continue
    }

    fn on_headers_complete(&mut self, _ctx: &mut Context<'_>) -> Flow {
        self.current.headers_done = true;
        self.current.in_value = false;
        if self.skip_body {
            Flow::SkipBody
        } else {
            Flow::Continue
        }
    }

    fn on_body(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        self.current
            .body
            .get_or_insert_with(Vec::new)
            .extend_from_slice(span.slice(data));
        Flow::Continue
    }

    fn on_message_complete(&mut self, ctx: &mut Context<'_>) -> Flow {
        let partial = std::mem::take(&mut self.current);
        let kind = ctx.kind();
        let flags = ctx.flags();

        self.messages.push(Message {
            kind,
            method: ctx.method(),
            url: (kind == MessageKind::Request)
                .then(|| String::from_utf8_lossy(&partial.url).into_owned()),
            status: (kind == MessageKind::Response).then(|| ctx.status_code()),
            version: ctx.version(),
            headers: into_headers(partial.headers),
            trailers: into_headers(partial.trailers),
            body: partial.body,
            keep_alive: flags.keep_alive,
            upgrade: flags.upgrade,
        });
        Flow::Continue
    }
}

fn into_headers(fields: Vec<(Vec<u8>, Vec<u8>)>) -> Vec<Header> {
    fields
        .into_iter()
        .map(|(name, value)| Header {
            name: String::from_utf8_lossy(&name).into_owned(),
            value: String::from_utf8_lossy(&value)
                .trim_matches([' ', '\t'])
                .to_owned(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// One recorded event; `data` holds a copy of the span for data events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub event: Event,
    pub data: Option<Vec<u8>>,
}

/// Records every event as it arrives, fragments and all.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    records: Vec<Record>,
}

impl EventLog {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// The log with adjacent fragments of the same data event merged. Two
    /// logs of one input fed with different splits coalesce to the same
    /// sequence.
    pub fn coalesced(&self) -> Vec<Record> {
        let mut out: Vec<Record> = Vec::with_capacity(self.records.len());
        for record in &self.records {
            if let (Some(last), Some(data)) = (out.last_mut(), &record.data) {
                if last.event == record.event {
                    if let Some(merged) = last.data.as_mut() {
                        merged.extend_from_slice(data);
                        continue;
                    }
                }
            }
            out.push(record.clone());
        }
        out
    }

    fn push(&mut self, event: Event, data: Option<&[u8]>) -> Flow {
        self.records.push(Record {
            event,
            data: data.map(<[u8]>::to_vec),
        });
        Flow::Continue
    }
}

impl Handler for EventLog {
    fn on_message_begin(&mut self, _ctx: &mut Context<'_>) -> Flow {
        self.push(Event::MessageBegin, None)
    }

    fn on_url(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        self.push(Event::Url, Some(span.slice(data)))
    }

    fn on_header_field(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        self.push(Event::HeaderField, Some(span.slice(data)))
    }

    fn on_header_value(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        self.push(Event::HeaderValue, Some(span.slice(data)))
    }

    fn on_headers_complete(&mut self, _ctx: &mut Context<'_>) -> Flow {
        self.push(Event::HeadersComplete, None)
    }

    fn on_body(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        self.push(Event::Body, Some(span.slice(data)))
    }

    fn on_message_complete(&mut self, _ctx: &mut Context<'_>) -> Flow {
        self.push(Event::MessageComplete, None)
    }
}
