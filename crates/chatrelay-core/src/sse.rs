//! Client-side decoding of server-sent-event records.
//!
//! Every unit on the wire is a self-delimited text record:
//!
//! ```text
//! data: {"content":"Hel"}\n\n
//! ```
//!
//! and a stream ends with the sentinel record `data: [DONE]\n\n`. Producing
//! records is left to axum's `Sse`; [`SseDecoder`] is the reading side, used
//! on the upstream completion stream and in tests.

/// Payload of the terminal marker record.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseRecord {
    /// The `data:` payload with the prefix stripped (multi-line data joined by `\n`).
    Data(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental decoder: feed arbitrary byte chunks, pull complete records.
///
/// Chunks may split a record (or a multi-byte character) anywhere; only
/// records terminated by a blank line are returned by [`next_record`].
///
/// [`next_record`]: SseDecoder::next_record
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// The last byte seen was `\r`; a following `\n` completes that CRLF.
    after_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of the byte stream.
    ///
    /// Line endings are normalised to `\n`: CRLF, bare CR and bare LF all end
    /// a line.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.reserve(chunk.len());
        for &b in chunk {
            match b {
                b'\r' => {
                    self.buf.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buf.push(b);
                    self.after_cr = false;
                }
            }
        }
    }

    /// Pop the next complete record, if one is buffered.
    pub fn next_record(&mut self) -> Option<SseRecord> {
        loop {
            let end = find_delimiter(&self.buf)?;
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            if let Some(record) = parse_block(&block[..end]) {
                return Some(record);
            }
        }
    }

    /// Flush a trailing record that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseRecord> {
        if let Some(record) = self.next_record() {
            return Some(record);
        }
        let rest = std::mem::take(&mut self.buf);
        parse_block(&rest)
    }
}

/// Decode a complete buffer into its records.
pub fn decode_all(bytes: &[u8]) -> Vec<SseRecord> {
    let mut decoder = SseDecoder::new();
    decoder.push(bytes);
    let mut records = Vec::new();
    while let Some(record) = decoder.next_record() {
        records.push(record);
    }
    records.extend(decoder.finish());
    records
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &[u8]) -> Option<SseRecord> {
    let text = String::from_utf8_lossy(block);
    let mut data: Option<String> = None;
    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(acc) => {
                acc.push('\n');
                acc.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }
    let data = data?;
    if data == DONE_SENTINEL {
        Some(SseRecord::Done)
    } else {
        Some(SseRecord::Data(data))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
