//! Incremental decoder for the Messages API event stream.
//!
//! The body arrives in arbitrary chunks; frames are separated by a blank
//! line and carry their JSON payload on `data:` lines. Only three event
//! kinds matter here: text deltas, `message_stop`, and `error`.

use serde::Deserialize;

use super::LlmError;

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<WireDelta>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An incremental piece of the response text.
    Delta(String),
    /// The terminal event: the whole accumulated text.
    Final(String),
}

/// Splits raw body bytes into `data:` payloads, one per complete frame.
#[derive(Debug, Default)]
struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = find_frame_end(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..end + 2).collect();
            let frame = String::from_utf8_lossy(&frame[..end]);
            let data: Vec<&str> = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|d| d.strip_prefix(' ').unwrap_or(d))
                .collect();
            if !data.is_empty() {
                payloads.push(data.join("\n"));
            }
        }
        payloads
    }
}

fn find_frame_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/// Consumes the stream chunk by chunk until the final response event.
#[derive(Debug, Default)]
pub struct FinalTextCollector {
    frames: FrameDecoder,
    text: String,
}

impl FinalTextCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one body chunk. Returns the events it completed; a `Final`
    /// event is always last and nothing after it is read.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, LlmError> {
        let mut events = Vec::new();
        for payload in self.frames.push(chunk) {
            let event: WireEvent = serde_json::from_str(&payload)?;
            match event.kind.as_str() {
                "content_block_delta" => {
                    let text = event
                        .delta
                        .filter(|d| d.kind.as_deref().unwrap_or("text_delta") == "text_delta")
                        .and_then(|d| d.text);
                    if let Some(text) = text {
                        self.text.push_str(&text);
                        events.push(StreamEvent::Delta(text));
                    }
                }
                "message_stop" => {
                    if self.text.trim().is_empty() {
                        return Err(LlmError::EmptyContent);
                    }
                    events.push(StreamEvent::Final(std::mem::take(&mut self.text)));
                    return Ok(events);
                }
                "error" => {
                    let message = event
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unknown stream error".to_string());
                    return Err(LlmError::Stream(message));
                }
                // message_start, content_block_start/stop, message_delta, ping
                _ => {}
            }
        }
        Ok(events)
    }
}
