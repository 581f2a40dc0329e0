use std::fmt::Write as _;

use crate::collect::Record;
use crate::types::{Message, MessageKind};

/// Serialize a [`Message`] to a JSON string.
///
/// When `pretty` is `true` the output is indented for readability.
pub fn format_json(message: &Message, pretty: bool) -> String {
    let encoded = if pretty {
        serde_json::to_string_pretty(message)
    } else {
        serde_json::to_string(message)
    };
    encoded.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Render a [`Message`] in a human-readable debug format.
pub fn format_debug(message: &Message) -> String {
    let mut out = String::with_capacity(256);

    match message.kind {
        MessageKind::Response => {
            out.push_str("=== HTTP Response ===\n");
            let _ = writeln!(out, "Status:  {}", message.status.unwrap_or_default());
        }
        _ => {
            out.push_str("=== HTTP Request ===\n");
            if let Some(method) = message.method {
                let _ = writeln!(out, "Method:  {method}");
            }
            let _ = writeln!(out, "URL:     {}", message.url.as_deref().unwrap_or(""));
        }
    }
    let _ = writeln!(out, "Version: {}", message.version);
    let _ = writeln!(
        out,
        "Keep-Alive: {}  Upgrade: {}",
        message.keep_alive, message.upgrade
    );

    let _ = writeln!(out, "\n--- Headers ({}) ---", message.headers.len());
    for header in &message.headers {
        let _ = writeln!(out, "  {}: {}", header.name, header.value);
    }

    match &message.body {
        Some(body) => {
            let _ = writeln!(out, "\n--- Body ({} bytes) ---", body.len());
            match std::str::from_utf8(body) {
                Ok(s) => out.push_str(s),
                Err(_) => {
                    let _ = write!(out, "<binary data: {} bytes>", body.len());
                }
            }
            out.push('\n');
        }
        None => {
            out.push_str("\n--- No Body ---\n");
        }
    }

    if !message.trailers.is_empty() {
        let _ = writeln!(out, "\n--- Trailers ({}) ---", message.trailers.len());
        for trailer in &message.trailers {
            let _ = writeln!(out, "  {}: {}", trailer.name, trailer.value);
        }
    }

    out.push_str("=====================\n");
    out
}

/// Render only the start line and headers (no body).
pub fn format_headers_only(message: &Message) -> String {
    let mut out = String::with_capacity(64 + message.headers.len() * 40);

    match message.kind {
        MessageKind::Response => {
            let _ = writeln!(
                out,
                "{} {}",
                message.version,
                message.status.unwrap_or_default()
            );
        }
        _ => {
            let method = message.method.map(|m| m.as_str()).unwrap_or("");
            let url = message.url.as_deref().unwrap_or("");
            let _ = writeln!(out, "{method} {url} {}", message.version);
        }
    }

    for header in &message.headers {
        let _ = writeln!(out, "{}: {}", header.name, header.value);
    }

    out
}

/// Render a recorded event stream, one event per line. Span contents are
/// shown with non-printable bytes escaped.
pub fn format_events(records: &[Record]) -> String {
    let mut out = String::with_capacity(records.len() * 24);
    for record in records {
        match &record.data {
            Some(data) => {
                let _ = writeln!(out, "{} \"{}\"", record.event, data.escape_ascii());
            }
            None => {
                let _ = writeln!(out, "{}", record.event);
            }
        }
    }
    out
}
