use std::ops::Range;

/// One lexical unit of tag markup.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    TagOpen {
        name: String,
        attributes: Vec<(String, String)>,
    },
    TagClose {
        name: String,
    },
    Text(String),
}

/// A token together with its byte span in the total scanned input.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Range<usize>,
}

/// Incremental tag-aware lexer.
///
/// Feed chunks with [`push`](Tokenizer::push); each call returns the tokens
/// that are final no matter what arrives next. A trailing `<`-initiated run
/// that could still become a valid tag is retained until more input (or
/// [`finish`](Tokenizer::finish)) decides it. Malformed tag-like runs are
/// emitted as text, never rejected.
#[derive(Debug, Default)]
pub struct Tokenizer {
    buffer: String,
    /// Byte offset of `buffer[0]` within the total input fed so far.
    offset: usize,
}

pub(crate) enum TagScan {
    /// A complete tag of the given byte length.
    Complete(Token, usize),
    /// The run could still become a tag with more input.
    Incomplete,
    /// The `<` does not begin a tag; treat it as text.
    NotATag,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of bytes fed so far (flushed or retained).
    pub fn total_fed(&self) -> usize {
        self.offset + self.buffer.len()
    }

    /// Feed a chunk and return every token finalized by it.
    pub fn push(&mut self, chunk: &str) -> Vec<SpannedToken> {
        self.buffer.push_str(chunk);
        self.scan(false)
    }

    /// Signal end of input; the retained suffix is flushed as text.
    pub fn finish(&mut self) -> Vec<SpannedToken> {
        self.scan(true)
    }

    fn scan(&mut self, at_end: bool) -> Vec<SpannedToken> {
        let mut out = Vec::new();
        let len = self.buffer.len();
        let mut pos = 0usize;
        let mut text_start = 0usize;

        while pos < len {
            if self.buffer.as_bytes()[pos] != b'<' {
                pos += 1;
                continue;
            }
            match scan_tag(&self.buffer[pos..]) {
                TagScan::Complete(token, tag_len) => {
                    if pos > text_start {
                        out.push(self.text_token(text_start, pos));
                    }
                    out.push(SpannedToken {
                        token,
                        span: self.offset + pos..self.offset + pos + tag_len,
                    });
                    pos += tag_len;
                    text_start = pos;
                }
                TagScan::Incomplete => {
                    if at_end {
                        // Nothing more is coming; the run is plain text.
                        pos = len;
                        break;
                    }
                    if pos > text_start {
                        out.push(self.text_token(text_start, pos));
                    }
                    self.consume(pos);
                    return out;
                }
                TagScan::NotATag => {
                    // A bare '<' in prose.
                    pos += 1;
                }
            }
        }

        if len > text_start {
            out.push(self.text_token(text_start, len));
        }
        self.consume(len);
        out
    }

    fn text_token(&self, start: usize, end: usize) -> SpannedToken {
        SpannedToken {
            token: Token::Text(self.buffer[start..end].to_string()),
            span: self.offset + start..self.offset + end,
        }
    }

    fn consume(&mut self, n: usize) {
        self.buffer.drain(..n);
        self.offset += n;
    }
}

/// Convenience single-pass tokenization of a complete text.
pub fn tokenize(text: &str) -> Vec<SpannedToken> {
    let mut tokenizer = Tokenizer::new();
    let mut tokens = tokenizer.push(text);
    tokens.extend(tokenizer.finish());
    tokens
}

/// Earliest byte index at or after which the buffer could still begin one of
/// the recognized start markers.
///
/// Everything before the returned index is guaranteed final text. A full
/// marker occurrence counts (that region belongs to the protocol layer, not
/// to the text flush), and so does any trailing run that is a proper prefix
/// of a marker. Every trailing offset is examined, not just the last
/// `marker.len()` bytes, because a marker can begin anywhere in the tail.
pub fn safe_flush_index(buffer: &str, markers: &[String]) -> usize {
    for i in 0..buffer.len() {
        if !buffer.is_char_boundary(i) {
            continue;
        }
        let suffix = &buffer[i..];
        for marker in markers {
            if marker.starts_with(suffix) || suffix.starts_with(marker.as_str()) {
                return i;
            }
        }
    }
    buffer.len()
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':')
}

/// Scan a tag at the start of `s` (which must begin with `<`).
pub(crate) fn scan_tag(s: &str) -> TagScan {
    let bytes = s.as_bytes();
    debug_assert_eq!(bytes[0], b'<');

    let mut i = 1;
    let closing = bytes.get(1) == Some(&b'/');
    if closing {
        i = 2;
    }

    match bytes.get(i) {
        None => return TagScan::Incomplete,
        Some(&b) if is_name_start(b) => {}
        Some(_) => return TagScan::NotATag,
    }
    let name_start = i;
    while let Some(&b) = bytes.get(i) {
        if is_name_char(b) {
            i += 1;
        } else {
            break;
        }
    }
    if i == bytes.len() {
        return TagScan::Incomplete;
    }
    let name = s[name_start..i].to_string();

    if closing {
        while let Some(&b) = bytes.get(i) {
            if b.is_ascii_whitespace() {
                i += 1;
            } else {
                break;
            }
        }
        return match bytes.get(i) {
            None => TagScan::Incomplete,
            Some(b'>') => TagScan::Complete(Token::TagClose { name }, i + 1),
            Some(_) => TagScan::NotATag,
        };
    }

    let mut attributes = Vec::new();
    loop {
        while let Some(&b) = bytes.get(i) {
            if b.is_ascii_whitespace() {
                i += 1;
            } else {
                break;
            }
        }
        match bytes.get(i) {
            None => return TagScan::Incomplete,
            Some(b'>') => return TagScan::Complete(Token::TagOpen { name, attributes }, i + 1),
            Some(&b) if is_name_start(b) => {
                let attr_start = i;
                while let Some(&b) = bytes.get(i) {
                    if is_name_char(b) {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let attr_name = s[attr_start..i].to_string();
                if bytes.get(i) != Some(&b'=') {
                    // Bare attribute; end of buffer may still bring an '='.
                    if i == bytes.len() {
                        return TagScan::Incomplete;
                    }
                    attributes.push((attr_name, String::new()));
                    continue;
                }
                i += 1;
                match bytes.get(i) {
                    None => return TagScan::Incomplete,
                    Some(&q) if q == b'"' || q == b'\'' => {
                        i += 1;
                        let value_start = i;
                        match bytes[i..].iter().position(|&b| b == q) {
                            None => return TagScan::Incomplete,
                            Some(rel) => {
                                attributes
                                    .push((attr_name, s[value_start..i + rel].to_string()));
                                i += rel + 1;
                            }
                        }
                    }
                    Some(_) => {
                        let value_start = i;
                        while let Some(&b) = bytes.get(i) {
                            if b == b'>' || b == b'<' || b.is_ascii_whitespace() {
                                break;
                            }
                            i += 1;
                        }
                        if i == bytes.len() {
                            return TagScan::Incomplete;
                        }
                        attributes.push((attr_name, s[value_start..i].to_string()));
                    }
                }
            }
            Some(_) => return TagScan::NotATag,
        }
    }
}
