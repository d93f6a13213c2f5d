//! SSE-style line decoder for streaming completion responses.
//!
//! Servers in the wild disagree on the exact shape of a streamed event:
//! some prefix lines with `data:`, some send bare JSON, some send plain
//! text. The decoder normalizes all of them into a single `StreamEvent`
//! per line, applying a fixed extraction precedence instead of probing
//! fields dynamically.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// End-of-stream sentinel used by OpenAI-compatible servers.
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event from the response stream.
///
/// Lives only for the duration of processing a single line; fragments are
/// written out immediately and the event is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of generated text to append to the output, no delimiter.
    Fragment(String),
    /// The `[DONE]` sentinel: the stream finished cleanly.
    Done,
    /// Nothing to emit for this line.
    Skip,
}

/// Wire shape of one JSON event. Every field is optional; the extraction
/// precedence in [`decode_line`] decides which one wins.
#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default, deserialize_with = "lenient")]
    choices: Vec<Choice>,
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default, deserialize_with = "lenient")]
    delta: Option<Delta>,
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default, deserialize_with = "lenient")]
    content: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,
}

/// Servers disagree on field types as much as on field names. A mistyped
/// field decodes to its default so extraction falls through to the next
/// candidate instead of rejecting the whole payload.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Decode one line of the response body.
///
/// Extraction precedence for JSON payloads, treating an empty string as
/// absent at every step:
/// 1. first element of a non-empty `choices` list:
///    - a `delta` object gates: `delta.content`, else `delta.text`,
///      with no fall-through to the choice fields;
///    - otherwise `choice.text`, else `choice.content`;
/// 2. top-level `text`;
/// 3. nothing extractable: the line is skipped, not an error.
///
/// A payload that is not JSON at all is emitted verbatim, so servers that
/// stream plain text chunks still work.
pub fn decode_line(line: &str) -> StreamEvent {
    let line = line.trim();
    if line.is_empty() {
        return StreamEvent::Skip;
    }

    // Common SSE style: "data: {...}" or "data: [DONE]".
    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.trim(),
        None => line,
    };
    if payload.is_empty() {
        return StreamEvent::Skip;
    }
    if payload == DONE_SENTINEL {
        return StreamEvent::Done;
    }

    if let Ok(event) = serde_json::from_str::<EventPayload>(payload) {
        return match extract_text(event) {
            Some(text) => StreamEvent::Fragment(text),
            None => StreamEvent::Skip,
        };
    }

    // Valid JSON of some other shape carries no text; anything else is a
    // plain-text chunk.
    if serde_json::from_str::<serde_json::Value>(payload).is_ok() {
        StreamEvent::Skip
    } else {
        StreamEvent::Fragment(payload.to_string())
    }
}

fn extract_text(event: EventPayload) -> Option<String> {
    if let Some(choice) = event.choices.into_iter().next() {
        return match choice.delta {
            Some(delta) => non_empty(delta.content).or_else(|| non_empty(delta.text)),
            None => non_empty(choice.text).or_else(|| non_empty(choice.content)),
        };
    }
    non_empty(event.text)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

/// Reassembles complete lines from arbitrary byte chunks.
///
/// The transport hands us chunks that can split a line anywhere; at most
/// one partial line is buffered between chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush whatever remains as a final unterminated line.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_only_lines_skipped() {
        assert_eq!(decode_line(""), StreamEvent::Skip);
        assert_eq!(decode_line("   "), StreamEvent::Skip);
        assert_eq!(decode_line("\t\r"), StreamEvent::Skip);
    }

    #[test]
    fn test_bare_data_prefix_skipped() {
        assert_eq!(decode_line("data:"), StreamEvent::Skip);
        assert_eq!(decode_line("data:   "), StreamEvent::Skip);
    }

    #[test]
    fn test_done_sentinel() {
        assert_eq!(decode_line("data: [DONE]"), StreamEvent::Done);
        assert_eq!(decode_line("data:[DONE]"), StreamEvent::Done);
        assert_eq!(decode_line("[DONE]"), StreamEvent::Done);
    }

    #[test]
    fn test_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(decode_line(line), StreamEvent::Fragment("Hi".to_string()));
    }

    #[test]
    fn test_empty_delta_content_falls_through_to_text() {
        let line = r#"data: {"choices":[{"delta":{"content":"","text":"Yo"}}]}"#;
        assert_eq!(decode_line(line), StreamEvent::Fragment("Yo".to_string()));
    }

    #[test]
    fn test_delta_gates_choice_fields() {
        // An empty delta never falls through to choice.text.
        let line = r#"data: {"choices":[{"delta":{},"text":"nope"}]}"#;
        assert_eq!(decode_line(line), StreamEvent::Skip);
    }

    #[test]
    fn test_choice_text() {
        let line = r#"data: {"choices":[{"text":"legacy"}]}"#;
        assert_eq!(decode_line(line), StreamEvent::Fragment("legacy".to_string()));
    }

    #[test]
    fn test_empty_choice_text_falls_through_to_content() {
        let line = r#"data: {"choices":[{"text":"","content":"alt"}]}"#;
        assert_eq!(decode_line(line), StreamEvent::Fragment("alt".to_string()));
    }

    #[test]
    fn test_top_level_text() {
        let line = r#"data: {"text":"standalone"}"#;
        assert_eq!(
            decode_line(line),
            StreamEvent::Fragment("standalone".to_string())
        );
    }

    #[test]
    fn test_empty_choices_list_skipped() {
        assert_eq!(decode_line(r#"data: {"choices":[]}"#), StreamEvent::Skip);
    }

    #[test]
    fn test_empty_choices_falls_through_to_top_level_text() {
        let line = r#"data: {"choices":[],"text":"x"}"#;
        assert_eq!(decode_line(line), StreamEvent::Fragment("x".to_string()));
    }

    #[test]
    fn test_json_without_extractable_text_skipped() {
        assert_eq!(
            decode_line(r#"data: {"id":"cmpl-1","object":"text_completion"}"#),
            StreamEvent::Skip
        );
        assert_eq!(decode_line("data: 42"), StreamEvent::Skip);
    }

    #[test]
    fn test_mistyped_choices_falls_through_to_top_level_text() {
        let line = r#"data: {"choices":"oops","text":"y"}"#;
        assert_eq!(decode_line(line), StreamEvent::Fragment("y".to_string()));
    }

    #[test]
    fn test_mistyped_delta_falls_through_to_choice_text() {
        let line = r#"data: {"choices":[{"delta":"x","text":"t"}]}"#;
        assert_eq!(decode_line(line), StreamEvent::Fragment("t".to_string()));
    }

    #[test]
    fn test_mistyped_text_field_treated_as_absent() {
        assert_eq!(decode_line(r#"data: {"text":123}"#), StreamEvent::Skip);
    }

    #[test]
    fn test_non_json_payload_emitted_verbatim() {
        assert_eq!(
            decode_line("not json at all"),
            StreamEvent::Fragment("not json at all".to_string())
        );
    }

    #[test]
    fn test_unprefixed_json_line() {
        let line = r#"{"choices":[{"delta":{"content":"raw"}}]}"#;
        assert_eq!(decode_line(line), StreamEvent::Fragment("raw".to_string()));
    }

    #[test]
    fn test_line_buffer_complete_lines() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"one\ntwo\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].trim(), "one");
        assert_eq!(lines[1].trim(), "two");
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_line_buffer_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"data: {\"text\":").is_empty());
        let lines = buffer.push(b"\"hi\"}\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(
            decode_line(&lines[0]),
            StreamEvent::Fragment("hi".to_string())
        );
    }

    #[test]
    fn test_line_buffer_crlf_lines() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"data: [DONE]\r\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(decode_line(&lines[0]), StreamEvent::Done);
    }

    #[test]
    fn test_line_buffer_trailing_unterminated_line() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"tail without newline").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("tail without newline"));
        assert!(buffer.finish().is_none());
    }
}
