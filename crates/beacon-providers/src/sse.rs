//! Incremental SSE parsing for OpenAI-style streaming responses.
//!
//! The byte stream arrives in arbitrary chunk boundaries; events are
//! separated by a blank line and payload lines carry a `data: ` prefix.

/// Accumulates raw bytes and yields complete `data:` payloads.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: String,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every complete data payload it unlocked.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();

        while let Some(pos) = self.buffer.find("\n\n") {
            let event = self.buffer[..pos].to_string();
            self.buffer.drain(..pos + 2);

            for line in event.lines() {
                if let Some(data) = line.strip_prefix("data: ") {
                    payloads.push(data.to_string());
                }
            }
        }

        payloads
    }

    /// Flush a trailing payload if the stream ended without a blank line.
    pub fn finish(self) -> Option<String> {
        let trimmed = self.buffer.trim();
        trimmed.strip_prefix("data: ").map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_events() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn holds_partial_events_across_chunks() {
        let mut buf = SseBuffer::new();
        assert!(buf.push("data: {\"a\"").is_empty());
        let payloads = buf.push(":1}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn ignores_non_data_lines() {
        let mut buf = SseBuffer::new();
        let payloads = buf.push("event: ping\ndata: x\n\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn finish_recovers_unterminated_payload() {
        let mut buf = SseBuffer::new();
        assert!(buf.push("data: [DONE]").is_empty());
        assert_eq!(buf.finish().as_deref(), Some("[DONE]"));
    }
}
