//! Line framing, decoding, and tokenization.
//!
//! Inbound bytes pass through three stages: [`LineCodec`] frames raw byte
//! lines on CRLF/LF, a [`LineDecoder`] turns bytes into text (optionally
//! charset-aware per source/destination), and [`Line::parse`] tokenizes the
//! text into tags, source, command and parameters.
//!
//! Tokenization rules worth calling out:
//! - parameters are split on single spaces, so consecutive separators
//!   produce empty parameters;
//! - only a `:`-prefixed token after the first starts the trailing
//!   parameter, which is taken verbatim from the raw text (inner spaces
//!   preserved);
//! - a leading `@` block is either a legacy `@N@` timestamp shorthand or an
//!   IRCv3 tag block; malformed blocks degrade to "no tags".

use std::collections::{BTreeMap, HashMap};

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::EngineError;

/// Maximum length of an IRC line in bytes, including CRLF.
pub const MAX_LINE_LEN: usize = 512;

/// Tag key under which a legacy `@N@` timestamp is stored.
pub const TSIRC_TAG: &str = "tsirc";

/// A tokenized IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// IRCv3 tags, or the legacy timestamp under [`TSIRC_TAG`].
    pub tags: BTreeMap<String, String>,
    /// Text after a line-leading `:`, up to the first space.
    pub source: Option<String>,
    /// The command or numeric token.
    pub command: String,
    /// Parameters following the command.
    pub params: Vec<String>,
    /// The decoded line as received, without tags or line terminator.
    pub raw: String,
}

impl Line {
    /// Parse a decoded line (without CRLF) into its components.
    pub fn parse(text: &str) -> Line {
        let (tags, rest) = split_tags(text);
        let mut tokens = tokenize(rest);

        let source = if tokens
            .first()
            .map(|t| t.starts_with(':') && t.len() > 1)
            .unwrap_or(false)
        {
            Some(tokens.remove(0)[1..].to_string())
        } else {
            None
        };

        let command = if tokens.is_empty() {
            String::new()
        } else {
            tokens.remove(0)
        };

        Line {
            tags,
            source,
            command,
            params: tokens,
            raw: rest.to_string(),
        }
    }

    /// Whether the command token is a 3-digit numeric reply.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }

    /// The numeric value of the command, if it parses as an integer.
    pub fn numeric(&self) -> Option<u16> {
        self.command.parse().ok()
    }

    /// Parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Nickname portion of the source (`nick!user@host` → `nick`).
    pub fn source_nick(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(|s| s.split(['!', '@']).next().unwrap_or(s))
    }

    /// Line timestamp in milliseconds, from the legacy `@N@` shorthand or
    /// the IRCv3 `time` tag, if either is present and parses.
    pub fn timestamp_ms(&self) -> Option<i64> {
        if let Some(ts) = self.tags.get(TSIRC_TAG) {
            return ts.parse().ok();
        }
        let time = self.tags.get("time")?;
        chrono::DateTime::parse_from_rfc3339(time)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }
}

/// Split a line into space-separated tokens.
///
/// Splits on single spaces (consecutive separators yield empty tokens). A
/// token after the first that starts with `:` begins the trailing
/// parameter, taken verbatim from the remaining text. Empty input yields a
/// single empty token.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = line;
    loop {
        if !tokens.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                tokens.push(trailing.to_string());
                return tokens;
            }
        }
        match rest.find(' ') {
            Some(idx) => {
                tokens.push(rest[..idx].to_string());
                rest = &rest[idx + 1..];
            }
            None => {
                tokens.push(rest.to_string());
                return tokens;
            }
        }
    }
}

/// Strip one optional leading tag block, returning tags and the remainder.
///
/// Recognizes the legacy `@N@` timestamp shorthand (digits terminated by a
/// second `@`, attached directly to the line) and IRCv3
/// `@key[=value];...` blocks terminated by a space. A malformed block
/// degrades to no tags, leaving the line untouched.
fn split_tags(text: &str) -> (BTreeMap<String, String>, &str) {
    let mut tags = BTreeMap::new();
    let Some(block) = text.strip_prefix('@') else {
        return (tags, text);
    };

    // Legacy @N@ shorthand: distinguished from a numeric-only IRCv3 tag by
    // the trailing '@'.
    if let Some(at) = block.find('@') {
        let digits = &block[..at];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            tags.insert(TSIRC_TAG.to_string(), digits.to_string());
            return (tags, &block[at + 1..]);
        }
    }

    let Some(space) = block.find(' ') else {
        // No terminating space: misformed tag block.
        return (tags, text);
    };

    for tag in block[..space].split(';').filter(|t| !t.is_empty()) {
        let mut it = tag.splitn(2, '=');
        let key = it.next().unwrap_or("");
        let value = it.next().map(unescape_tag_value).unwrap_or_default();
        if !key.is_empty() {
            tags.insert(key.to_string(), value);
        }
    }

    (tags, &text[space + 2..])
}

/// Unescape an IRCv3 tag value (`\:` `\s` `\\` `\r` `\n`).
fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Extract the source and decode destination from a lossily-decoded line.
///
/// The destination feeds per-target charset selection: for numeric replies
/// the interesting target is the token after our own nick (token 2 past
/// the command); for other sourced commands it is the first parameter,
/// when at least three tokens are present.
pub fn scan_destination(lossy: &str) -> (Option<String>, Option<String>) {
    let line = Line::parse(lossy);
    if line.source.is_none() {
        return (None, None);
    }
    let dest = if line.is_numeric() {
        line.param(1)
    } else {
        line.param(0)
    };
    (line.source.clone(), dest.map(str::to_string))
}

/// Decodes raw line bytes into text.
///
/// The already-extracted source and destination are provided so
/// implementations can apply per-target charset overrides. Implementations
/// must not fail: malformed byte sequences degrade to the Unicode
/// replacement character.
pub trait LineDecoder: Send {
    /// Decode one line's bytes (without line terminator) into text.
    fn decode(&self, raw: &[u8], source: Option<&str>, destination: Option<&str>) -> String;
}

/// Default decoder: UTF-8 with lossy replacement.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Decoder;

impl LineDecoder for Utf8Decoder {
    fn decode(&self, raw: &[u8], _source: Option<&str>, _destination: Option<&str>) -> String {
        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Charset-aware decoder with per-target overrides.
///
/// Targets are matched ASCII-case-insensitively against the destination
/// first, then the source nickname.
pub struct CharsetDecoder {
    default: &'static encoding_rs::Encoding,
    overrides: HashMap<String, &'static encoding_rs::Encoding>,
}

impl CharsetDecoder {
    /// Create a decoder with the given default encoding label.
    pub fn new(label: &str) -> Result<Self, EngineError> {
        let default = encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| EngineError::UnknownEncoding(label.to_string()))?;
        Ok(Self {
            default,
            overrides: HashMap::new(),
        })
    }

    /// Set a per-target encoding override.
    pub fn set_override(&mut self, target: &str, label: &str) -> Result<(), EngineError> {
        let enc = encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| EngineError::UnknownEncoding(label.to_string()))?;
        self.overrides.insert(target.to_ascii_lowercase(), enc);
        Ok(())
    }

    fn encoding_for(&self, target: Option<&str>) -> Option<&'static encoding_rs::Encoding> {
        let target = target?;
        self.overrides.get(&target.to_ascii_lowercase()).copied()
    }
}

impl LineDecoder for CharsetDecoder {
    fn decode(&self, raw: &[u8], source: Option<&str>, destination: Option<&str>) -> String {
        let nick = source.map(|s| s.split(['!', '@']).next().unwrap_or(s));
        let enc = self
            .encoding_for(destination)
            .or_else(|| self.encoding_for(nick))
            .unwrap_or(self.default);
        let (text, _, _) = enc.decode(raw);
        text.into_owned()
    }
}

/// Frames raw byte lines on `\n`, trimming an optional `\r`.
///
/// Overlong lines are dropped (with a warning) rather than failing the
/// stream; end-of-stream yields `None` from the framed reader.
pub struct LineCodec {
    next_index: usize,
    max_len: usize,
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the standard 512-byte limit.
    pub fn new() -> Self {
        Self {
            next_index: 0,
            max_len: MAX_LINE_LEN,
            discarding: false,
        }
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Vec<u8>;
    type Error = EngineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Vec<u8>>, EngineError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                // Unterminated partial past the limit: drop it now and
                // keep skipping until the next newline, so a newline-free
                // stream cannot grow the buffer without bound.
                if src.len() > self.max_len {
                    if !self.discarding {
                        tracing::warn!(
                            len = src.len(),
                            limit = self.max_len,
                            "dropping overlong line"
                        );
                        self.discarding = true;
                    }
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                // Tail of a line whose head was already thrown away.
                self.discarding = false;
                continue;
            }

            if line.len() > self.max_len {
                tracing::warn!(len = line.len(), limit = self.max_len, "dropping overlong line");
                continue;
            }

            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            return Ok(Some(line[..end].to_vec()));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = EngineError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> Result<(), EngineError> {
        dst.extend_from_slice(msg.as_bytes());
        if !msg.ends_with("\r\n") {
            dst.extend_from_slice(b"\r\n");
        }
        Ok(())
    }
}
