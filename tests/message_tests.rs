use httpspan::{
    Context, ErrorKind, EventLog, Flow, Handler, HttpVersion, MessageCollector, MessageKind,
    Method, ParseError, ParserConfig, Span, format_debug, format_events, format_headers_only,
    format_json, parse_chunks, parse_message, parse_messages, parse_messages_with_config,
};

fn request(raw: &[u8]) -> httpspan::Message {
    parse_message(raw, MessageKind::Request).expect("should parse")
}

// =========================================================================
// Request-line parsing
// =========================================================================

#[test]
fn simple_get_request() {
    let req = request(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
    assert_eq!(req.kind, MessageKind::Request);
    assert_eq!(req.method, Some(Method::GET));
    assert_eq!(req.url.as_deref(), Some("/"));
    assert_eq!(req.version, HttpVersion::HTTP_11);
    assert_eq!(req.headers.len(), 1);
    assert_eq!(req.headers[0].name, "Host");
    assert_eq!(req.headers[0].value, "example.com");
    assert!(req.body.is_none());
    assert!(req.keep_alive);
    assert!(!req.upgrade);
}

#[test]
fn get_with_query_string() {
    let req = request(
        b"GET /api/users?page=1&limit=10 HTTP/1.1\r\nHost: api.example.com\r\nAccept: application/json\r\n\r\n",
    );
    assert_eq!(req.url.as_deref(), Some("/api/users?page=1&limit=10"));
    assert_eq!(req.header_value("Accept"), Some("application/json"));
}

#[test]
fn http_10_version() {
    let req = request(b"GET /legacy HTTP/1.0\r\nHost: old.example.com\r\n\r\n");
    assert_eq!(req.version, HttpVersion::HTTP_10);
    assert!(!req.keep_alive);
}

#[test]
fn options_asterisk_url() {
    let req = request(b"OPTIONS * HTTP/1.1\r\nHost: example.com\r\n\r\n");
    assert_eq!(req.method, Some(Method::OPTIONS));
    assert_eq!(req.url.as_deref(), Some("*"));
}

// =========================================================================
// Header parsing
// =========================================================================

#[test]
fn multiple_headers() {
    let req = request(
        b"GET / HTTP/1.1\r\n\
        Host: example.com\r\n\
        Accept: text/html\r\n\
        Accept-Language: en-US\r\n\
        User-Agent: httpspan/0.1\r\n\
        Connection: keep-alive\r\n\r\n",
    );
    assert_eq!(req.headers.len(), 5);
    assert_eq!(req.header_value("Host"), Some("example.com"));
    assert_eq!(req.header_value("Accept"), Some("text/html"));
    assert_eq!(req.header_value("User-Agent"), Some("httpspan/0.1"));
}

#[test]
fn header_value_ows_is_trimmed() {
    let req = request(b"GET / HTTP/1.1\r\nHost:   example.com   \r\n\r\n");
    assert_eq!(req.header_value("Host"), Some("example.com"));
}

#[test]
fn header_value_with_interior_spaces() {
    let req = request(b"GET / HTTP/1.1\r\nX-Custom: hello   world\r\n\r\n");
    assert_eq!(req.header_value("X-Custom"), Some("hello   world"));
}

#[test]
fn empty_header_value() {
    let req = request(b"GET / HTTP/1.1\r\nHost: example.com\r\nX-Empty:\r\n\r\n");
    assert_eq!(req.header_value("X-Empty"), Some(""));
}

#[test]
fn case_insensitive_header_lookup() {
    let req = request(b"GET / HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n");
    assert_eq!(req.header_value("content-type"), Some("text/plain"));
    assert_eq!(req.header_value("CONTENT-TYPE"), Some("text/plain"));
}

#[test]
fn duplicate_header_values() {
    let req = request(b"GET / HTTP/1.1\r\nAccept: a\r\nAccept: b\r\n\r\n");
    assert_eq!(req.header_values("accept"), vec!["a", "b"]);
}

#[test]
fn folded_header_is_joined() {
    let req = request(b"GET / HTTP/1.1\r\nX-Long: first\r\n   second\r\n\r\n");
    assert_eq!(req.header_value("X-Long"), Some("first second"));

    // The fold keeps its own whitespace byte.
    let req = request(b"GET / HTTP/1.1\r\nX-Long: first\r\n\tsecond\r\n\r\n");
    assert_eq!(req.header_value("X-Long"), Some("first\tsecond"));
}

#[test]
fn header_with_obs_text_bytes() {
    // obs-text (0x80-0xFF) is allowed in header values.
    let req = request(b"GET / HTTP/1.1\r\nHost: h\r\nX-Custom: hello\x80world\r\n\r\n");
    let val = req.header_value("X-Custom").unwrap();
    // from_utf8_lossy replaces 0x80 with U+FFFD.
    assert!(val.contains('\u{FFFD}'));
}

// =========================================================================
// Bodies
// =========================================================================

#[test]
fn post_with_content_length_body() {
    let req = request(
        b"POST /submit HTTP/1.1\r\nHost: h\r\nContent-Type: text/plain\r\nContent-Length: 13\r\n\r\nHello, World!",
    );
    assert_eq!(req.method, Some(Method::POST));
    assert_eq!(req.body_as_str(), Some("Hello, World!"));
    assert_eq!(req.content_length(), Some(13));
}

#[test]
fn content_length_zero_yields_no_body() {
    let req = request(b"POST / HTTP/1.1\r\nHost: h\r\nContent-Length: 0\r\n\r\n");
    assert!(req.body.is_none());
}

#[test]
fn chunked_body_with_trailers() {
    let req = request(
        b"POST / HTTP/1.1\r\n\
        Host: h\r\n\
        Transfer-Encoding: chunked\r\n\r\n\
        5\r\nHello\r\n7\r\n, World\r\n0\r\n\
        Expires: never\r\n\r\n",
    );
    assert!(req.is_chunked());
    assert_eq!(req.body_as_str(), Some("Hello, World"));
    assert_eq!(req.trailer_value("expires"), Some("never"));
    assert_eq!(req.header_value("expires"), None);
}

#[test]
fn chunked_empty_body_zero_only() {
    let req = request(b"POST / HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n");
    assert!(req.body.is_none());
}

#[test]
fn transfer_encoding_takes_precedence_over_content_length() {
    let req = request(
        b"POST / HTTP/1.1\r\n\
        Host: h\r\n\
        Content-Length: 999\r\n\
        Transfer-Encoding: chunked\r\n\r\n\
        3\r\nabc\r\n0\r\n\r\n",
    );
    assert_eq!(req.body_as_str(), Some("abc"));
}

#[test]
fn large_body_content_length() {
    let body = "X".repeat(100_000);
    let raw = format!(
        "POST / HTTP/1.1\r\n\
         Host: h\r\n\
         Content-Length: {}\r\n\r\n\
         {}",
        body.len(),
        body
    );
    let req = request(raw.as_bytes());
    assert_eq!(req.body_as_str(), Some(body.as_str()));
}

#[test]
fn body_accessors() {
    let req = request(b"POST / HTTP/1.1\r\nHost: h\r\nContent-Length: 3\r\n\r\nXYZ");
    assert_eq!(req.body_bytes(), Some(b"XYZ".as_slice()));
    assert_eq!(req.body_as_lossy_string(), Some("XYZ".to_string()));
}

#[test]
fn many_headers_within_limit() {
    let mut raw = String::from("GET / HTTP/1.1\r\n");
    for i in 0..100 {
        raw.push_str(&format!("X-Header-{i}: value-{i}\r\n"));
    }
    raw.push_str("\r\n");

    let req = request(raw.as_bytes());
    assert_eq!(req.headers.len(), 100);
}

// =========================================================================
// Responses and streams
// =========================================================================

#[test]
fn response_in_either_mode() {
    let msg = parse_message(
        b"HTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok",
        MessageKind::Either,
    )
    .unwrap();
    assert_eq!(msg.kind, MessageKind::Response);
    assert_eq!(msg.status, Some(201));
    assert_eq!(msg.method, None);
    assert_eq!(msg.url, None);
    assert_eq!(msg.body_as_str(), Some("ok"));
}

#[test]
fn response_delimited_by_eof() {
    let msg = parse_message(b"HTTP/1.0 200 OK\r\n\r\nhello world", MessageKind::Response).unwrap();
    assert_eq!(msg.body_as_str(), Some("hello world"));
    assert!(!msg.keep_alive);
}

#[test]
fn pipelined_messages() {
    let messages = parse_messages(
        b"GET /a HTTP/1.1\r\nHost: h\r\n\r\nPOST /b HTTP/1.1\r\nContent-Length: 1\r\n\r\nz",
        MessageKind::Request,
    )
    .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].url.as_deref(), Some("/a"));
    assert_eq!(messages[1].body_as_str(), Some("z"));
}

#[test]
fn upgrade_leaves_trailing_bytes() {
    let messages = parse_messages(
        b"GET /chat HTTP/1.1\r\nUpgrade: websocket\r\nConnection: upgrade\r\n\r\n\x81\x00",
        MessageKind::Request,
    )
    .unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].upgrade);
}

#[test]
fn skip_body_collector_for_head_responses() {
    let data = b"HTTP/1.1 200 OK\r\nContent-Length: 1234\r\n\r\n";
    let collector = parse_chunks(
        [&data[..]],
        ParserConfig::new(MessageKind::Response),
        MessageCollector::with_skip_body(true),
    )
    .unwrap();
    let messages = collector.into_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].body.is_none());
    assert_eq!(messages[0].content_length(), Some(1234));
}

/// Pauses at every headers_complete and collects the body it is given.
#[derive(Default)]
struct PausingBody {
    body: Vec<u8>,
    completed: usize,
}

impl Handler for PausingBody {
    fn on_headers_complete(&mut self, ctx: &mut Context<'_>) -> Flow {
        ctx.pause();
        Flow::Continue
    }

    fn on_body(&mut self, _ctx: &mut Context<'_>, data: &[u8], span: Span) -> Flow {
        self.body.extend_from_slice(span.slice(data));
        Flow::Continue
    }

    fn on_message_complete(&mut self, _ctx: &mut Context<'_>) -> Flow {
        self.completed += 1;
        Flow::Continue
    }
}

#[test]
fn parse_chunks_resumes_after_handler_pause() {
    let data: &[u8] = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET / HTTP/1.1\r\n\r\n";
    for size in [1, 4, data.len()] {
        let handler = parse_chunks(
            data.chunks(size),
            ParserConfig::new(MessageKind::Request),
            PausingBody::default(),
        )
        .unwrap();
        assert_eq!(handler.body, b"hello", "chunk size {size}");
        assert_eq!(handler.completed, 2, "chunk size {size}");
    }
}

#[test]
fn chunked_feeding_matches_one_shot() {
    let data: &[u8] =
        b"POST /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n0\r\n\r\nGET /y HTTP/1.1\r\n\r\n";
    let whole = parse_messages(data, MessageKind::Request).unwrap();
    for size in [1, 2, 3, 7, 64] {
        let streamed = parse_chunks(
            data.chunks(size),
            ParserConfig::new(MessageKind::Request),
            MessageCollector::default(),
        )
        .unwrap()
        .into_messages();
        assert_eq!(streamed, whole, "chunk size {size}");
    }
}

// =========================================================================
// Error conditions
// =========================================================================

fn error_kind(raw: &[u8]) -> ErrorKind {
    match parse_message(raw, MessageKind::Request) {
        Err(ParseError::Invalid { kind, .. }) => kind,
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn error_invalid_method() {
    assert_eq!(error_kind(b"FOOBAR / HTTP/1.1\r\nHost: h\r\n\r\n"), ErrorKind::InvalidMethod);
}

#[test]
fn error_empty_url() {
    assert_eq!(error_kind(b"GET  HTTP/1.1\r\nHost: h\r\n\r\n"), ErrorKind::InvalidUrl);
}

#[test]
fn error_bare_lf() {
    assert_eq!(error_kind(b"GET / HTTP/1.1\nHost: h\n\n"), ErrorKind::InvalidVersion);
}

#[test]
fn error_malformed_content_lengths() {
    for raw in [
        &b"POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 5\r\n\r\nabc"[..],
        b"POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n",
        b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n",
        b"POST / HTTP/1.1\r\nContent-Length: 1 2\r\n\r\n",
        b"POST / HTTP/1.1\r\nContent-Length:\r\n\r\n",
    ] {
        assert_eq!(error_kind(raw), ErrorKind::HeaderMalformed);
    }
}

#[test]
fn error_offset_points_at_failure() {
    let err = parse_message(b"GET / HTTP/1.1\r\nBad Header: v\r\n\r\n", MessageKind::Request)
        .unwrap_err();
    assert_eq!(
        err,
        ParseError::Invalid {
            kind: ErrorKind::HeaderMalformed,
            offset: b"GET / HTTP/1.1\r\nBad".len(),
        }
    );
    assert_eq!(
        err.to_string(),
        "malformed header line (at byte 19)"
    );
}

#[test]
fn incomplete_inputs() {
    for raw in [
        &b""[..],
        b"GET / HTTP/1.1\r\nHost: h\r\n",
        b"POST / HTTP/1.1\r\nHost: h\r\nContent-Length: 100\r\n\r\nshort",
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nab",
    ] {
        assert_eq!(
            parse_message(raw, MessageKind::Request),
            Err(ParseError::Incomplete)
        );
    }
}

#[test]
fn config_max_headers_count_enforced() {
    let config = ParserConfig {
        max_headers_count: 2,
        ..ParserConfig::new(MessageKind::Request)
    };
    let raw = b"GET / HTTP/1.1\r\nH1: a\r\nH2: b\r\nH3: c\r\n\r\n";
    assert!(matches!(
        parse_messages_with_config(raw, config),
        Err(ParseError::Invalid {
            kind: ErrorKind::HeaderOverflow,
            ..
        })
    ));
}

#[test]
fn config_max_header_size_enforced() {
    let config = ParserConfig {
        max_header_size: 32,
        ..ParserConfig::new(MessageKind::Request)
    };
    let raw = b"GET /a-very-long-request-target-indeed HTTP/1.1\r\n\r\n";
    assert!(matches!(
        parse_messages_with_config(raw, config),
        Err(ParseError::Invalid {
            kind: ErrorKind::HeaderOverflow,
            ..
        })
    ));
}

// =========================================================================
// Output formatting
// =========================================================================

#[test]
fn json_output_compact() {
    let req = request(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n");
    let json = format_json(&req, false);
    assert!(json.contains("\"kind\":\"request\""));
    assert!(json.contains("\"method\":\"GET\""));
    assert!(json.contains("\"url\":\"/\""));
    assert!(json.contains("\"version\":\"HTTP/1.1\""));
    assert!(!json.contains("\"status\""));
    assert!(!json.contains("\"trailers\""));
}

#[test]
fn json_output_response() {
    let msg = parse_message(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n", MessageKind::Response)
        .unwrap();
    let json = format_json(&msg, false);
    assert!(json.contains("\"kind\":\"response\""));
    assert!(json.contains("\"status\":200"));
    assert!(!json.contains("\"method\""));
}

#[test]
fn json_output_pretty() {
    let req = request(b"GET /pretty HTTP/1.1\r\nHost: h\r\n\r\n");
    let json = format_json(&req, true);
    // Pretty JSON has newlines and indentation.
    assert!(json.contains('\n'));
    assert!(json.contains("  "));
}

#[test]
fn json_output_with_body() {
    let req = request(b"POST / HTTP/1.1\r\nHost: h\r\nContent-Length: 4\r\n\r\ndata");
    let json = format_json(&req, false);
    assert!(json.contains("\"body\":\"data\""));
}

#[test]
fn debug_output_contains_sections() {
    let req = request(b"GET /test HTTP/1.1\r\nHost: h\r\n\r\n");
    let dbg = format_debug(&req);
    assert!(dbg.contains("=== HTTP Request ==="));
    assert!(dbg.contains("Method:  GET"));
    assert!(dbg.contains("URL:     /test"));
    assert!(dbg.contains("Version: HTTP/1.1"));
    assert!(dbg.contains("--- Headers (1) ---"));
    assert!(dbg.contains("--- No Body ---"));
}

#[test]
fn debug_output_for_response_with_trailers() {
    let msg = parse_message(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nok\r\n0\r\nX-Check: 1\r\n\r\n",
        MessageKind::Response,
    )
    .unwrap();
    let dbg = format_debug(&msg);
    assert!(dbg.contains("=== HTTP Response ==="));
    assert!(dbg.contains("Status:  200"));
    assert!(dbg.contains("--- Body (2 bytes) ---"));
    assert!(dbg.contains("--- Trailers (1) ---"));
    assert!(dbg.contains("  X-Check: 1"));
}

#[test]
fn headers_only_output() {
    let req = request(b"GET /path HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n");
    let out = format_headers_only(&req);
    assert!(out.starts_with("GET /path HTTP/1.1\n"));
    assert!(out.contains("Host: example.com\n"));
    assert!(out.contains("Accept: */*\n"));
}

#[test]
fn headers_only_output_for_response() {
    let msg = parse_message(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n", MessageKind::Response)
        .unwrap();
    assert_eq!(format_headers_only(&msg), "HTTP/1.1 404\nContent-Length: 0\n");
}

#[test]
fn events_output() {
    let log = parse_chunks(
        [&b"GET /a HTTP/1.1\r\nX: \x01\r\n\r\n"[..]],
        ParserConfig::new(MessageKind::Request),
        EventLog::default(),
    );
    // Control bytes are rejected, so the log only survives on a clean input.
    assert!(log.is_err());

    let log = parse_chunks(
        [&b"GET /a HTTP/1.1\r\nX: y\r\n\r\n"[..]],
        ParserConfig::new(MessageKind::Request),
        EventLog::default(),
    )
    .unwrap();
    assert_eq!(
        format_events(log.records()),
        "message_begin\nurl \"/a\"\nheader_field \"X\"\nheader_value \"y\"\nheaders_complete\nmessage_complete\n"
    );
}
