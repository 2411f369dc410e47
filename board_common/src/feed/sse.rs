//! Incremental `text/event-stream` parser.
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder::feed`] buffers partial
//! lines and returns every event completed by the chunk. Lines end with `\n`,
//! `\r\n` or a lone `\r`, including a `\r\n` pair split across two chunks.
//! A line longer than [`MAX_LINE_BYTES`] is dropped together with the event
//! it belongs to.

/// Longest line kept in the buffer.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `message` unless the server sent an `event:` field.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    discarding: bool,
    pending_cr: bool,
    seen_first_line: bool,
    data: String,
    event_type: String,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return the events it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.pending_cr = true;
                    self.end_line(&mut events);
                }
                _ if self.discarding => {}
                _ if self.line.len() >= MAX_LINE_BYTES => {
                    tracing::warn!(limit = MAX_LINE_BYTES, "Dropping oversized event-stream line");
                    self.line = Vec::new();
                    self.discarding = true;
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    /// Last `id:` value seen, kept across events.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay requested by the server through `retry:`.
    #[must_use]
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        if self.discarding {
            self.discarding = false;
            self.seen_first_line = true;
            self.data.clear();
            self.event_type.clear();
            return;
        }
        let raw = std::mem::take(&mut self.line);
        let mut line = String::from_utf8_lossy(&raw).into_owned();
        if !self.seen_first_line {
            self.seen_first_line = true;
            if let Some(stripped) = line.strip_prefix('\u{feff}') {
                line = stripped.to_string();
            }
        }

        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };
        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry_ms = value.parse().ok();
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        events.push(SseEvent {
            event: if event_type.is_empty() {
                "message".to_string()
            } else {
                event_type
            },
            data,
            id: self.last_event_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_message_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: \"alice\",\"x\",\"issue\",\"1\"\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "\"alice\",\"x\",\"issue\",\"1\"");
    }

    #[test]
    fn events_survive_arbitrary_chunking() {
        let stream = b"id: 7\r\ndata: one\r\n\r\n: keep-alive\r\ndata: two\r\ndata: lines\r\n\r\n";
        for split in 0..stream.len() {
            let mut decoder = SseDecoder::new();
            let mut events = decoder.feed(&stream[..split]);
            events.extend(decoder.feed(&stream[split..]));

            assert_eq!(events.len(), 2, "split at {split}");
            assert_eq!(events[0].data, "one");
            assert_eq!(events[0].id.as_deref(), Some("7"));
            assert_eq!(events[1].data, "two\nlines");
        }
    }

    #[test]
    fn lone_carriage_returns_end_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data:a\r\rdata:b\r\r");
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, ["a", "b"]);
    }

    #[test]
    fn named_events_comments_and_empty_blocks() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b"\xEF\xBB\xBF: hello\n\nevent: ping\ndata\n\nretry: 2500\nretry: soon\nevent: x\n\n",
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "ping");
        assert_eq!(events[0].data, "");
        assert_eq!(decoder.retry_ms(), Some(2500));
    }

    #[test]
    fn incomplete_event_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: partial\n").is_empty());
        assert_eq!(decoder.feed(b"\n").len(), 1);
    }

    #[test]
    fn oversized_line_is_dropped_and_decoding_resumes() {
        let mut decoder = SseDecoder::new();
        let mut chunk = b"event: update\ndata: ".to_vec();
        chunk.extend(vec![b'x'; MAX_LINE_BYTES + 10]);
        chunk.extend_from_slice(b"\n\n");

        assert!(decoder.feed(&chunk).is_empty());
        assert!(decoder.line.is_empty());

        let events = decoder.feed(b"data: next\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "next");
    }
}
