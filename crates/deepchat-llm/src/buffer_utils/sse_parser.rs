use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::str::Utf8Error;

use super::buffering::CircularLineBuffer;
use crate::error::{ChatError, Result};
use crate::streaming::StreamEvent;

/// Prefix of every SSE line that carries a payload
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends a chat-completions stream
pub const DONE_MARKER: &str = "[DONE]";

/// What a single complete line contributes to the stream
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Events(Vec<StreamEvent>),
    Done,
}

/// Strategy pattern for parsing different SSE payload types
pub trait SseLineParser: Send {
    /// Parse a data payload into stream events.
    /// An `Err` marks the frame as malformed: it becomes a `Skipped` event.
    fn parse_data_line(&self, data: &str) -> std::result::Result<Vec<StreamEvent>, String>;

    /// Check if this payload signals end of stream
    fn is_done_marker(&self, data: &str) -> bool {
        data == DONE_MARKER
    }

    /// Classify one trimmed line. Lines without the data prefix are ignored.
    fn parse_line(&self, line: &str) -> LineOutcome {
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return LineOutcome::Events(Vec::new());
        };

        if self.is_done_marker(data) {
            return LineOutcome::Done;
        }

        match self.parse_data_line(data) {
            Ok(events) => LineOutcome::Events(events),
            Err(reason) => LineOutcome::Events(vec![StreamEvent::Skipped { reason }]),
        }
    }
}

fn classify<P: SseLineParser>(
    parser: &P,
    line: std::result::Result<String, Utf8Error>,
) -> LineOutcome {
    match line {
        Ok(line) if line.is_empty() => LineOutcome::Events(Vec::new()),
        Ok(line) => parser.parse_line(&line),
        Err(e) => LineOutcome::Events(vec![StreamEvent::Skipped {
            reason: format!("Invalid UTF-8: {}", e),
        }]),
    }
}

/// Generic SSE stream parser over any chunked byte source.
///
/// Yields events in arrival order, ends after the done marker, and ends with an
/// error if the underlying body fails.
pub fn parse_sse_stream<S, B, E, P>(
    bytes: S,
    parser: P,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<ChatError> + Send,
    P: SseLineParser + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut buffer = CircularLineBuffer::with_capacity(4096);
        let mut finished = false;

        'read: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(chunk) => {
                    buffer.extend(chunk.as_ref());

                    while let Some(line) = buffer.next_line() {
                        let outcome = classify(&parser, line);
                        match outcome {
                            LineOutcome::Events(events) => {
                                for event in events {
                                    yield Ok(event);
                                }
                            }
                            LineOutcome::Done => {
                                yield Ok(StreamEvent::Done);
                                finished = true;
                                break 'read;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(e.into());
                    finished = true;
                    break 'read;
                }
            }
        }

        if !finished {
            if let Some(line) = buffer.take_remainder() {
                let outcome = classify(&parser, line);
                match outcome {
                    LineOutcome::Events(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    LineOutcome::Done => yield Ok(StreamEvent::Done),
                }
            }
        }
    })
}
