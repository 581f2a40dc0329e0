//! Byte classes and resumable token recognisers.
//!
//! Nothing here buffers input: every recogniser keeps only a few words of
//! state so it can be fed one byte at a time across any number of
//! `execute` calls.

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// First tokens of a start line: every method in code order, then `HTTP/`.
pub(crate) const START_TOKENS: [&[u8]; 26] = [
    b"DELETE",
    b"GET",
    b"HEAD",
    b"POST",
    b"PUT",
    b"CONNECT",
    b"OPTIONS",
    b"TRACE",
    b"COPY",
    b"LOCK",
    b"MKCOL",
    b"MOVE",
    b"PROPFIND",
    b"PROPPATCH",
    b"UNLOCK",
    b"REPORT",
    b"MKACTIVITY",
    b"CHECKOUT",
    b"MERGE",
    b"M-SEARCH",
    b"NOTIFY",
    b"SUBSCRIBE",
    b"UNSUBSCRIBE",
    b"PATCH",
    b"PURGE",
    b"HTTP/",
];

/// Index of `HTTP/` in [`START_TOKENS`].
pub(crate) const RESPONSE_TOKEN: usize = 25;
pub(crate) const METHOD_MASK: u32 = (1 << RESPONSE_TOKEN) - 1;
pub(crate) const RESPONSE_MASK: u32 = 1 << RESPONSE_TOKEN;

/// Header names that influence framing, lowercase.
pub(crate) const FRAMING_HEADERS: [&[u8]; 4] =
    [b"content-length", b"transfer-encoding", b"connection", b"upgrade"];
pub(crate) const FRAMING_HEADERS_MASK: u32 = 0b1111;

/// `Connection` options the parser reacts to, lowercase.
pub(crate) const CONNECTION_TOKENS: [&[u8]; 3] = [b"keep-alive", b"close", b"upgrade"];
pub(crate) const CONNECTION_TOKENS_MASK: u32 = 0b111;

/// Transfer codings the parser reacts to, lowercase.
pub(crate) const TRANSFER_CODINGS: [&[u8]; 1] = [b"chunked"];
pub(crate) const TRANSFER_CODINGS_MASK: u32 = 0b1;

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Incremental exact match of a token against a table of candidates.
///
/// Each bit of `alive` stands for a table entry that still agrees with
/// every byte fed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Matcher {
    alive: u32,
    len: usize,
}

impl Matcher {
    pub(crate) fn new(alive: u32) -> Self {
        Self { alive, len: 0 }
    }

    pub(crate) fn feed(&mut self, table: &[&[u8]], byte: u8) {
        let mut bits = self.alive;
        while bits != 0 {
            let i = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            if table.get(i).and_then(|name| name.get(self.len)) != Some(&byte) {
                self.alive &= !(1 << i);
            }
        }
        self.len = self.len.saturating_add(1);
    }

    pub(crate) fn kill(&mut self) {
        self.alive = 0;
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.alive == 0
    }

    /// Number of bytes fed so far.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// The live candidate whose full length has been fed, if any.
    pub(crate) fn matched(&self, table: &[&[u8]]) -> Option<usize> {
        let mut bits = self.alive;
        while bits != 0 {
            let i = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            if table.get(i).is_some_and(|name| name.len() == self.len) {
                return Some(i);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// TokenList
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum TokenPos {
    #[default]
    Lead,
    Inside,
    Trailing,
}

/// Recognises known tokens in a comma-separated header value
/// (`#token` list with OWS around elements). Matching is case-insensitive;
/// the table must be lowercase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TokenList {
    mask: u32,
    matcher: Matcher,
    pos: TokenPos,
}

impl TokenList {
    pub(crate) fn new(mask: u32) -> Self {
        Self {
            mask,
            matcher: Matcher::new(mask),
            pos: TokenPos::Lead,
        }
    }

    /// Feed one value byte; returns the table index of a token that this
    /// byte completed.
    pub(crate) fn push(&mut self, table: &[&[u8]], byte: u8) -> Option<usize> {
        match byte {
            b',' => self.take(table),
            b' ' | b'\t' => {
                if self.pos == TokenPos::Inside {
                    self.pos = TokenPos::Trailing;
                }
                None
            }
            _ => {
                match self.pos {
                    TokenPos::Lead | TokenPos::Inside => {
                        self.pos = TokenPos::Inside;
                        self.matcher.feed(table, byte.to_ascii_lowercase());
                    }
                    // Whitespace inside an element: not a bare token.
                    TokenPos::Trailing => self.matcher.kill(),
                }
                None
            }
        }
    }

    /// End of the field value; returns the last element if it is known.
    pub(crate) fn finish(&mut self, table: &[&[u8]]) -> Option<usize> {
        self.take(table)
    }

    fn take(&mut self, table: &[&[u8]]) -> Option<usize> {
        let hit = match self.pos {
            TokenPos::Lead => None,
            _ => self.matcher.matched(table),
        };
        *self = Self::new(self.mask);
        hit
    }
}

// ---------------------------------------------------------------------------
// Digits
// ---------------------------------------------------------------------------

/// Decimal `Content-Length` value accumulated byte by byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Digits {
    value: u64,
    seen: bool,
    closed: bool,
}

impl Digits {
    /// Returns `false` if the byte cannot belong to a valid value.
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        match byte {
            b'0'..=b'9' if !self.closed => {
                let next = self
                    .value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(u64::from(byte - b'0')));
                match next {
                    Some(v) => {
                        self.value = v;
                        self.seen = true;
                        true
                    }
                    None => false,
                }
            }
            b' ' | b'\t' => {
                self.closed = self.seen;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn value(&self) -> Option<u64> {
        self.seen.then_some(self.value)
    }
}

// ---------------------------------------------------------------------------
// Character classification helpers (RFC 9110 / RFC 9112)
// ---------------------------------------------------------------------------

/// `tchar` – characters allowed in HTTP tokens (method, header names).
///
/// ```text
/// tchar = "!" / "#" / "$" / "%" / "&" / "'" / "*" / "+" / "-" / "." /
///         "^" / "_" / "`" / "|" / "~" / DIGIT / ALPHA
/// ```
#[inline]
pub(crate) fn is_tchar(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'#'
            | b'$'
            | b'%'
            | b'&'
            | b'\''
            | b'*'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~'
            | b'0'..=b'9'
            | b'a'..=b'z'
            | b'A'..=b'Z'
    )
}

/// Bytes permitted inside a header field value or reason phrase:
/// `SP / HTAB / VCHAR / obs-text`.
#[inline]
pub(crate) fn is_field_content_byte(b: u8) -> bool {
    b == b' ' || b == b'\t' || (0x21..=0x7E).contains(&b) || b >= 0x80
}

/// Bytes permitted in a request target: anything visible, plus obs-text.
#[inline]
pub(crate) fn is_url_byte(b: u8) -> bool {
    b > b' ' && b != 0x7F
}

/// Chunk extensions may hold anything except CTLs (HTAB allowed).
#[inline]
pub(crate) fn is_chunk_ext_byte(b: u8) -> bool {
    b == b'\t' || (b >= b' ' && b != 0x7F)
}

#[inline]
pub(crate) fn is_ows(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

#[inline]
pub(crate) fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Method;

    #[test]
    fn start_tokens_follow_method_codes() {
        for method in Method::ALL {
            assert_eq!(
                START_TOKENS[usize::from(method.code())],
                method.as_str().as_bytes()
            );
        }
        assert_eq!(START_TOKENS[RESPONSE_TOKEN], b"HTTP/");
    }

    #[test]
    fn tchar_accepts_valid_bytes() {
        for &b in b"abcXYZ019!#$%&'*+-.^_`|~" {
            assert!(is_tchar(b), "expected tchar for byte 0x{b:02X}");
        }
    }

    #[test]
    fn tchar_rejects_invalid_bytes() {
        for &b in b" \t\r\n@[]{}:" {
            assert!(!is_tchar(b), "expected non-tchar for byte 0x{b:02X}");
        }
    }

    #[test]
    fn field_content_byte_rejects_ctl() {
        assert!(is_field_content_byte(b'\t'));
        assert!(is_field_content_byte(0x80));
        assert!(!is_field_content_byte(0x00));
        assert!(!is_field_content_byte(b'\r'));
        assert!(!is_field_content_byte(0x7F));
    }

    #[test]
    fn matcher_separates_shared_prefixes() {
        let mut m = Matcher::new(METHOD_MASK | RESPONSE_MASK);
        for &b in b"HEAD" {
            m.feed(&START_TOKENS, b);
        }
        assert_eq!(m.matched(&START_TOKENS), Some(2));

        let mut m = Matcher::new(METHOD_MASK | RESPONSE_MASK);
        for &b in b"HTTP/" {
            m.feed(&START_TOKENS, b);
        }
        assert_eq!(m.matched(&START_TOKENS), Some(RESPONSE_TOKEN));
    }

    #[test]
    fn matcher_dies_on_unknown_token() {
        let mut m = Matcher::new(METHOD_MASK);
        for &b in b"GEX" {
            m.feed(&START_TOKENS, b);
        }
        assert!(m.is_dead());
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn token_list_finds_elements_case_insensitively() {
        let mut list = TokenList::new(CONNECTION_TOKENS_MASK);
        let mut hits = Vec::new();
        for &b in b" Keep-Alive , foo,UPGRADE" {
            hits.extend(list.push(&CONNECTION_TOKENS, b));
        }
        hits.extend(list.finish(&CONNECTION_TOKENS));
        assert_eq!(hits, vec![0, 2]);
    }

    #[test]
    fn token_list_rejects_inner_whitespace() {
        let mut list = TokenList::new(TRANSFER_CODINGS_MASK);
        for &b in b"chun ked" {
            assert_eq!(list.push(&TRANSFER_CODINGS, b), None);
        }
        assert_eq!(list.finish(&TRANSFER_CODINGS), None);
    }

    #[test]
    fn digits_accept_trailing_ows_only() {
        let mut d = Digits::default();
        assert!(b"42 ".iter().all(|&b| d.push(b)));
        assert_eq!(d.value(), Some(42));
        assert!(!d.push(b'1'));

        let mut d = Digits::default();
        assert!(!d.push(b'-'));
        assert_eq!(Digits::default().value(), None);
    }

    #[test]
    fn digits_reject_overflow() {
        let mut d = Digits::default();
        let all_ok = b"99999999999999999999".iter().all(|&b| d.push(b));
        assert!(!all_ok);
    }

    #[test]
    fn hex_values() {
        assert_eq!(hex_value(b'a'), Some(10));
        assert_eq!(hex_value(b'F'), Some(15));
        assert_eq!(hex_value(b'g'), None);
    }
}
