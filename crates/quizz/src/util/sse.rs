// SSE (Server-Sent Events) parser: line-buffered state machine over raw body bytes.

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type (from `event:` field).
    pub event_type: Option<String>,
    /// The data payload (from `data:` field(s), joined with newlines).
    pub data: String,
}

/// Incremental SSE parser over raw body bytes.
///
/// Bytes are held until a whole line has arrived, so a multi-byte UTF-8
/// character split across two network chunks is decoded intact.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// The event being assembled; `None` until a field line arrives.
    current: Option<PendingEvent>,
}

#[derive(Debug, Default)]
struct PendingEvent {
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl PendingEvent {
    fn finish(self) -> SseEvent {
        SseEvent {
            event_type: self.event_type,
            data: self.data_lines.join("\n"),
        }
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the response body. Returns any events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut completed = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let raw = &self.buffer[consumed..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw).into_owned();
            consumed = end + 1;

            if line.is_empty() {
                completed.extend(self.current.take().map(PendingEvent::finish));
            } else {
                self.apply_field(&line);
            }
        }

        self.buffer.drain(..consumed);
        completed
    }

    fn apply_field(&mut self, line: &str) {
        let (field, value) = match line.split_once(':') {
            Some(("", _)) | None => return,
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        };
        // id, retry and unknown fields carry nothing we use.
        if field != "event" && field != "data" {
            return;
        }

        let event = self.current.get_or_insert_with(PendingEvent::default);
        if field == "event" {
            event.event_type = Some(value.to_string());
        } else {
            event.data_lines.push(value.to_string());
        }
    }
}
