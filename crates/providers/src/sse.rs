//! Server-sent-events framing shared by the provider adapter and by
//! consumers of the assistant's own `/chat/stream` endpoint.
//!
//! Frames are delimited by a blank line. Each frame may carry `event:`,
//! `data:`, `id:` or `retry:` lines; only `event:` and `data:` matter here.
//! - [`drain_frames`] -- pull complete frames out of a growing buffer
//! - [`sse_response_stream`] -- build a `BoxStream` from a response + parser closure

use crate::util::from_reqwest;
use ta_domain::error::Result;
use ta_domain::stream::{BoxStream, StreamEvent};

/// One complete SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` line, if any.
    pub event: Option<String>,
    /// All `data:` lines of the frame joined with `\n`.
    pub data: String,
}

/// Extract complete frames from an SSE buffer.
///
/// The buffer is drained in place: consumed bytes are removed and a
/// trailing partial frame stays for the next call. `\r\n` line endings are
/// normalized first. Frames without a non-empty `data:` line are dropped.
pub fn drain_frames(buffer: &mut String) -> Vec<SseFrame> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }

    let mut frames = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        let mut event = None;
        let mut data_lines: Vec<&str> = Vec::new();
        for line in block.lines() {
            if let Some(name) = line.strip_prefix("event:") {
                event = Some(name.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data);
                }
            }
        }

        if !data_lines.is_empty() {
            frames.push(SseFrame {
                event,
                data: data_lines.join("\n"),
            });
        }
    }

    frames
}

/// Build a [`BoxStream`] from an SSE `reqwest::Response` and a provider-specific
/// parser closure.
///
/// The closure receives each frame's data and returns zero or more stream
/// events. It is `FnMut` because the OpenAI-compatible parser keeps tool-call
/// assembly state across frames.
///
/// The stream flushes the remaining buffer when the body closes and emits a
/// fallback `Done` if the parser never produced one.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        loop {
            let chunk = response.chunk().await;
            let closed = matches!(chunk, Ok(None));
            match chunk {
                Ok(Some(bytes)) => buffer.push_str(&String::from_utf8_lossy(&bytes)),
                Ok(None) => {
                    if buffer.trim().is_empty() {
                        break;
                    }
                    buffer.push_str("\n\n");
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    return;
                }
            }

            for frame in drain_frames(&mut buffer) {
                for event in parse_data(&frame.data) {
                    if matches!(&event, Ok(StreamEvent::Done { .. })) {
                        done_emitted = true;
                    }
                    yield event;
                }
            }

            if closed {
                break;
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn data_only(frames: Vec<SseFrame>) -> Vec<String> {
        frames.into_iter().map(|f| f.data).collect()
    }

    #[test]
    fn drain_single_complete_frame_with_event_name() {
        let mut buf = String::from("event: token\ndata: \"Hel\"\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(
            frames,
            vec![SseFrame { event: Some("token".into()), data: "\"Hel\"".into() }]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_multiple_frames() {
        let mut buf = String::from("data: first\n\ndata: second\n\n");
        assert_eq!(data_only(drain_frames(&mut buf)), vec!["first", "second"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_partial_frame_stays_in_buffer() {
        let mut buf = String::from("data: complete\n\ndata: partial");
        assert_eq!(data_only(drain_frames(&mut buf)), vec!["complete"]);
        assert_eq!(buf, "data: partial");
    }

    #[test]
    fn frame_without_data_is_ignored() {
        let mut buf = String::from(": keep-alive\n\nevent: ping\n\ndata: \n\n");
        assert!(drain_frames(&mut buf).is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_ignores_id_and_retry_lines() {
        let mut buf = String::from("event: done\nid: 42\nretry: 5000\ndata: {}\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("done"));
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut buf = String::from("data: line one\ndata: line two\n\n");
        assert_eq!(data_only(drain_frames(&mut buf)), vec!["line one\nline two"]);
    }

    #[test]
    fn crlf_line_endings_are_normalized() {
        let mut buf = String::from("event: token\r\ndata: \"x\"\r\n\r\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("token"));
    }

    #[test]
    fn drain_done_sentinel_preserved() {
        let mut buf = String::from("data: [DONE]\n\n");
        assert_eq!(data_only(drain_frames(&mut buf)), vec!["[DONE]"]);
    }

    #[test]
    fn drain_incremental_buffering() {
        let mut buf = String::from("data: chunk1");
        assert!(drain_frames(&mut buf).is_empty());
        assert_eq!(buf, "data: chunk1");

        buf.push_str("\n\ndata: chunk2\n\n");
        assert_eq!(data_only(drain_frames(&mut buf)), vec!["chunk1", "chunk2"]);
        assert!(buf.is_empty());
    }
}
