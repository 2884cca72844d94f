//! Incremental `multipart/x-mixed-replace` body splitter.
//!
//! Used when a transport hands the loader one response whose body is a
//! stream of parts. Each part yields a [`MultipartEvent::Part`] with its
//! headers followed by zero or more [`MultipartEvent::Data`] chunks.
//!
//! # Example
//! ```ignore
//! use mainload::http::multipart::{MultipartEvent, MultipartParser};
//!
//! let mut parser = MultipartParser::new("frame");
//! let events = parser.feed(b"--frame\r\nContent-Type: text/plain\r\n\r\nhi\r\n--frame--")?;
//! assert!(matches!(events[0], MultipartEvent::Part(_)));
//! ```

use crate::base::neterror::NetError;
use bytes::{Buf, Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue};

/// Upper bound on one part's header block.
const MAX_PART_HEADER_BYTES: usize = 16 * 1024;

/// Content type of a part that does not declare one (RFC 2046 §5.1).
const DEFAULT_PART_TYPE: &str = "text/plain";

/// Output of [`MultipartParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartEvent {
    /// A new part begins. Its body follows as `Data` events.
    Part(HeaderMap),
    /// Body bytes of the current part.
    Data(Bytes),
    /// The closing delimiter was seen.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    AfterDelimiter,
    Headers,
    Body,
    Done,
}

/// Splits a multipart body into parts as bytes arrive.
#[derive(Debug)]
pub struct MultipartParser {
    /// `--boundary`
    delimiter: Vec<u8>,
    /// `\n--boundary`, the delimiter as it appears after body bytes.
    body_delimiter: Vec<u8>,
    /// The boundary itself, accepted as the delimiter when it already starts
    /// with `--` and the body never uses `--boundary`. Settled by the first
    /// delimiter.
    fallback: Option<Vec<u8>>,
    buffer: BytesMut,
    headers: HeaderMap,
    header_bytes: usize,
    state: State,
}

impl MultipartParser {
    /// Create a parser for `boundary`, the `boundary` parameter as sent.
    ///
    /// The delimiter is `--` followed by `boundary`. Some servers put the
    /// leading `--` into the parameter itself; for a boundary starting with
    /// `--` the parser also accepts the boundary alone as the delimiter,
    /// whichever appears first in the body.
    pub fn new(boundary: &str) -> Self {
        let delimiter = [b"--".as_slice(), boundary.as_bytes()].concat();
        let body_delimiter = [b"\n".as_slice(), delimiter.as_slice()].concat();
        let fallback = boundary
            .starts_with("--")
            .then(|| boundary.as_bytes().to_vec());
        Self {
            delimiter,
            body_delimiter,
            fallback,
            buffer: BytesMut::new(),
            headers: HeaderMap::new(),
            header_bytes: 0,
            state: State::Preamble,
        }
    }

    /// Whether the closing delimiter has been consumed.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feed more body bytes and collect the events they complete.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<MultipartEvent>, NetError> {
        if self.state == State::Done {
            // Epilogue
            return Ok(Vec::new());
        }
        self.buffer.extend_from_slice(data);

        let mut events = Vec::new();
        while self.step(&mut events)? {}
        Ok(events)
    }

    /// The body ended. Flushes a truncated final part as-is.
    pub fn finish(&mut self) -> Result<Vec<MultipartEvent>, NetError> {
        let mut events = Vec::new();
        match self.state {
            State::Done => {}
            State::Body => {
                if !self.buffer.is_empty() {
                    events.push(MultipartEvent::Data(self.buffer.split().freeze()));
                }
                events.push(MultipartEvent::End);
            }
            State::Preamble => return Err(NetError::MalformedMultipart),
            State::AfterDelimiter | State::Headers => events.push(MultipartEvent::End),
        }
        self.state = State::Done;
        self.buffer.clear();
        Ok(events)
    }

    /// Advance by one parse step. Returns `false` when more input is needed.
    fn step(&mut self, events: &mut Vec<MultipartEvent>) -> Result<bool, NetError> {
        match self.state {
            State::Preamble => {
                match self.find_first_delimiter() {
                    Some(pos) => {
                        self.buffer.advance(pos + self.delimiter.len());
                        self.state = State::AfterDelimiter;
                        Ok(true)
                    }
                    None => {
                        let keep = self.delimiter.len().saturating_sub(1);
                        if self.buffer.len() > keep {
                            let drop = self.buffer.len() - keep;
                            self.buffer.advance(drop);
                        }
                        Ok(false)
                    }
                }
            }
            State::AfterDelimiter => {
                if self.buffer.len() < 2 {
                    return Ok(false);
                }
                if self.buffer.starts_with(b"--") {
                    self.buffer.clear();
                    self.state = State::Done;
                    events.push(MultipartEvent::End);
                    return Ok(false);
                }
                // Transport padding up to the end of the delimiter line
                match self.buffer.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        self.buffer.advance(pos + 1);
                        self.headers = HeaderMap::new();
                        self.header_bytes = 0;
                        self.state = State::Headers;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            State::Headers => {
                let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                    if self.header_bytes + self.buffer.len() > MAX_PART_HEADER_BYTES {
                        return Err(NetError::MalformedMultipart);
                    }
                    return Ok(false);
                };
                let line = self.buffer.split_to(pos + 1);
                self.header_bytes += line.len();
                if self.header_bytes > MAX_PART_HEADER_BYTES {
                    return Err(NetError::MalformedMultipart);
                }

                let line = trim_line_end(&line);
                if line.is_empty() {
                    let mut headers = std::mem::take(&mut self.headers);
                    if !headers.contains_key(CONTENT_TYPE) {
                        headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_PART_TYPE));
                    }
                    events.push(MultipartEvent::Part(headers));
                    self.state = State::Body;
                } else {
                    self.push_header_line(line);
                }
                Ok(true)
            }
            State::Body => match find(&self.buffer, &self.body_delimiter) {
                Some(pos) => {
                    let end = if pos > 0 && self.buffer[pos - 1] == b'\r' {
                        pos - 1
                    } else {
                        pos
                    };
                    if end > 0 {
                        events.push(MultipartEvent::Data(self.buffer.split_to(end).freeze()));
                    }
                    self.buffer.advance(pos - end + self.body_delimiter.len());
                    self.state = State::AfterDelimiter;
                    Ok(true)
                }
                None => {
                    // Hold back a possible partial delimiter, plus its CR.
                    let keep = self.body_delimiter.len();
                    if self.buffer.len() > keep {
                        let len = self.buffer.len() - keep;
                        events.push(MultipartEvent::Data(self.buffer.split_to(len).freeze()));
                    }
                    Ok(false)
                }
            },
            State::Done => Ok(false),
        }
    }

    /// Locate the first delimiter, choosing between `--boundary` and the
    /// fallback. The standard form wins a tie since it contains the fallback.
    fn find_first_delimiter(&mut self) -> Option<usize> {
        let standard = find(&self.buffer, &self.delimiter);
        let Some(fallback) = self.fallback.take() else {
            return standard;
        };
        match (standard, find(&self.buffer, &fallback)) {
            (Some(pos), Some(alt)) if alt < pos => Some(self.use_delimiter(fallback, alt)),
            (None, Some(alt)) => Some(self.use_delimiter(fallback, alt)),
            (Some(pos), _) => Some(pos),
            (None, None) => {
                self.fallback = Some(fallback);
                None
            }
        }
    }

    fn use_delimiter(&mut self, delimiter: Vec<u8>, pos: usize) -> usize {
        tracing::debug!("multipart body uses the boundary parameter as its delimiter");
        self.body_delimiter = [b"\n".as_slice(), delimiter.as_slice()].concat();
        self.delimiter = delimiter;
        pos
    }

    fn push_header_line(&mut self, line: &[u8]) {
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            tracing::debug!("ignoring multipart header line without colon");
            return;
        };
        let name = HeaderName::from_bytes(trim_ascii(&line[..colon]));
        let value = HeaderValue::from_bytes(trim_ascii(&line[colon + 1..]));
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::debug!("ignoring malformed multipart header"),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}
