use futures::Stream;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::error::Result;
use crate::sink::FragmentSink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental piece of the assistant answer
    Message { content: String },

    /// A data frame that could not be decoded
    Skipped { reason: String },

    /// The server sent the end-of-stream marker
    Done,
}

/// One `data:` payload of a chat-completions stream.
/// Everything except the delta content is optional; providers differ in what they send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatStreamChunk {
    /// Content fragment of the first choice, if any
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }

    fn to_stream_events(&self) -> Vec<StreamEvent> {
        match self.content() {
            Some(content) if !content.is_empty() => vec![StreamEvent::Message {
                content: content.to_string(),
            }],
            _ => Vec::new(),
        }
    }
}

/// Decodes chat-completions delta frames
pub struct ChatChunkParser;

impl SseLineParser for ChatChunkParser {
    fn parse_data_line(&self, data: &str) -> std::result::Result<Vec<StreamEvent>, String> {
        serde_json::from_str::<ChatStreamChunk>(data)
            .map(|chunk| chunk.to_stream_events())
            .map_err(|e| format!("Failed to parse chat chunk: {}", e))
    }
}

pub fn parse_chat_sse_stream(
    response: Response,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
    parse_sse_stream(response.bytes_stream(), ChatChunkParser)
}

/// Counters describing one streamed answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub fragments: usize,
    pub skipped_frames: usize,
    pub done_received: bool,
}

/// Folds stream events into the final answer.
///
/// Fragments are forwarded to the sink the moment they are applied and are
/// concatenated strictly in arrival order.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    stats: StreamStats,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: StreamEvent, sink: &mut dyn FragmentSink) {
        match event {
            StreamEvent::Message { content } => {
                self.content.push_str(&content);
                self.stats.fragments += 1;
                sink.on_fragment(&content, &self.content);
            }
            StreamEvent::Skipped { reason } => {
                self.stats.skipped_frames += 1;
                tracing::warn!("Skipping malformed stream frame: {}", reason);
            }
            StreamEvent::Done => {
                self.stats.done_received = true;
            }
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Close the stream for the sink and hand back the answer.
    pub fn finish(self, sink: &mut dyn FragmentSink) -> (String, StreamStats) {
        sink.on_finish(&self.content);
        (self.content, self.stats)
    }
}
