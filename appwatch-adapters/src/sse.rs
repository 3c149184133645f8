//! Incremental parser for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; the parser buffers partial lines and
//! yields an [`SseEvent`] every time a blank line terminates an event that
//! carried at least one `data:` line.

use crate::error::AdapterError;

/// Longest line the parser will hold while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type from an `event:` line, if any.
    pub event: Option<String>,
    /// Concatenated `data:` lines, joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream.
    pub id: Option<String>,
}

/// Incremental server-sent event parser.
///
/// # Example
///
/// ```rust
/// use appwatch_adapters::sse::SseParser;
///
/// let mut parser = SseParser::new();
/// assert!(parser.feed(b"data: {\"cpu\"").unwrap().is_empty());
///
/// let events = parser.feed(b": 12}\n\n").unwrap();
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].data, "{\"cpu\": 12}");
/// ```
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a line terminator.
    scanned: usize,
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
}

impl SseParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the body, returning every event it completes.
    ///
    /// Fails when a partial line grows past [`MAX_LINE_BYTES`]. The held
    /// bytes and the event being assembled are discarded, so the parser can
    /// be reused, but the stream itself should be treated as broken.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, AdapterError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            let mut line = &self.buffer[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }

            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            start = end + 1;
            self.scanned = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_LINE_BYTES {
            let held = self.buffer.len();
            self.reset();
            return Err(AdapterError::Parse(format!(
                "event stream line exceeds {} bytes ({} held)",
                MAX_LINE_BYTES, held
            )));
        }
        Ok(events)
    }

    /// Number of bytes held back waiting for a line terminator.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            // `retry` hints are ignored: reconnect timing is fixed by the client.
            _ => {}
        }
        None
    }

    /// Drop the partial line and the event being assembled.
    fn reset(&mut self) {
        self.buffer = Vec::new();
        self.scanned = 0;
        self.data.clear();
        self.event = None;
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}
