//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module turns the raw byte stream of a streamed chat completion into a
//! stream of [`Delta`] values.  Each event is a `data:` line holding one
//! [`ChatCompletionChunk`]; the literal `data: [DONE]` ends the stream.

use bytes::{Buf, Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::types::{ChatCompletionChunk, Delta};
use crate::{Error, Result};

/// What one complete SSE event decoded to.
enum Frame {
    Delta(Result<Delta>),
    Skip,
    Done,
}

/// Process a stream of bytes into a stream of deltas.
///
/// Events may be split across chunks at any byte, including inside a multi-byte character or
/// between the `\r` and `\n` of a line ending.  Only complete events are decoded as UTF-8.
/// Frames that carry neither content, a finish reason, nor usage are skipped.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<Delta>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    let stream = Box::pin(byte_stream);
    let buffer = BytesMut::new();

    stream::unfold(
        (stream, buffer, false),
        move |(mut stream, mut buffer, mut done)| async move {
            if done {
                return None;
            }
            loop {
                // First check if we have a complete event in the buffer
                while let Some(frame) = extract_event(&mut buffer) {
                    match frame {
                        Frame::Delta(delta) => {
                            if delta.is_err() {
                                STREAM_ERRORS.click();
                            }
                            return Some((delta, (stream, buffer, done)));
                        }
                        Frame::Skip => continue,
                        Frame::Done => return None,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        done = true;
                        return Some((Err(e), (stream, buffer, done)));
                    }
                    None => {
                        // End of stream; a final event may lack its blank line.
                        done = true;
                        if buffer.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        buffer.extend_from_slice(b"\n\n");
                        return match extract_event(&mut buffer) {
                            Some(Frame::Delta(delta)) => {
                                if delta.is_err() {
                                    STREAM_ERRORS.click();
                                }
                                Some((delta, (stream, buffer, done)))
                            }
                            _ => None,
                        };
                    }
                }
            }
        },
    )
}

/// Locate the blank line ending the first event in `buffer`.
///
/// Returns the length of the event text and the offset where the next event starts.  Lines end
/// with `\n` or `\r\n`.
fn event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    while let Some(offset) = buffer[line_start..].iter().position(|&b| b == b'\n') {
        let line_end = line_start + offset;
        let line = &buffer[line_start..line_end];
        if line.is_empty() || line == b"\r" {
            return Some((line_start, line_end + 1));
        }
        line_start = line_end + 1;
    }
    None
}

/// Remove and decode the first complete SSE event in `buffer`.
///
/// Events are delimited by blank lines.  Multiple `data:` lines in one event
/// are joined with newlines; comment lines (leading `:`) and other fields are
/// ignored.
fn extract_event(buffer: &mut BytesMut) -> Option<Frame> {
    let (event_len, next_event) = event_boundary(buffer)?;
    let event = buffer.split_to(event_len);
    buffer.advance(next_event - event_len);

    let event_text = match std::str::from_utf8(&event) {
        Ok(text) => text,
        Err(e) => {
            return Some(Frame::Delta(Err(Error::encoding(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            ))));
        }
    };
    let data = event_text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect::<Vec<_>>();
    if data.is_empty() {
        return Some(Frame::Skip);
    }
    let data = data.join("\n");
    if data == "[DONE]" {
        return Some(Frame::Done);
    }
    Some(parse_chunk(&data))
}

/// Parse one `data:` payload.
fn parse_chunk(data: &str) -> Frame {
    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Frame::Delta(Err(Error::serialization(
                format!("Failed to parse event JSON: {e}"),
                Some(Box::new(e)),
            )));
        }
    };
    if let Some(error) = chunk.error {
        return Frame::Delta(Err(Error::api(
            500,
            error.error_type.or_else(|| Some("stream_error".to_string())),
            error.message.unwrap_or_else(|| data.to_string()),
            None,
        )));
    }
    match chunk.into_delta() {
        Some(delta) => Frame::Delta(Ok(delta)),
        None => Frame::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const ROLE: &[u8] =
        b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null,\"index\":0}]}\n\n";
    const AB: &[u8] =
        b"data: {\"choices\":[{\"delta\":{\"content\":\"ab\"},\"finish_reason\":null,\"index\":0}]}\n\n";
    const CD: &[u8] =
        b"data: {\"choices\":[{\"delta\":{\"content\":\"cd\"},\"finish_reason\":null,\"index\":0}]}\n\n";
    const STOP: &[u8] =
        b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\",\"index\":0}]}\n\n";
    const DONE: &[u8] = b"data: [DONE]\n\n";

    fn chunks(parts: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
        stream::iter(
            parts
                .into_iter()
                .map(|part| Ok(Bytes::from_static(part)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn parse_full_stream() {
        let sse_stream = process_sse(chunks(vec![ROLE, AB, CD, STOP, DONE]));
        let deltas: Vec<_> = sse_stream.collect().await;

        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas[0].as_ref().unwrap(), &Delta::content("ab"));
        assert_eq!(deltas[1].as_ref().unwrap(), &Delta::content("cd"));
        assert!(deltas[2].as_ref().unwrap().is_finish());
    }

    #[tokio::test]
    async fn handle_split_event() {
        let (head, tail) = AB.split_at(17);
        let mut sse_stream = Box::pin(process_sse(chunks(vec![head, tail])));
        let delta = sse_stream.next().await.unwrap();
        assert_eq!(delta.unwrap(), Delta::content("ab"));
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn handle_crlf_and_comments() {
        let data: &[u8] = b": keep-alive\r\n\r\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\n\r\n";
        let mut sse_stream = Box::pin(process_sse(chunks(vec![data])));
        let delta = sse_stream.next().await.unwrap();
        assert_eq!(delta.unwrap(), Delta::content("x"));
    }

    #[tokio::test]
    async fn done_ends_stream() {
        let mut sse_stream = Box::pin(process_sse(chunks(vec![DONE, AB])));
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn handle_malformed_event() {
        let data: &[u8] = b"data: {not json\n\n";
        let mut sse_stream = Box::pin(process_sse(chunks(vec![data])));
        let event = sse_stream.next().await.unwrap();
        assert!(event.is_err());
    }

    #[tokio::test]
    async fn in_band_error_is_a_provider_error() {
        let data: &[u8] =
            b"data: {\"error\":{\"message\":\"overloaded\",\"type\":\"server_error\"}}\n\n";
        let mut sse_stream = Box::pin(process_sse(chunks(vec![data])));
        let err = sse_stream.next().await.unwrap().unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "server_error: overloaded");
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line() {
        let data: &[u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}";
        let mut sse_stream = Box::pin(process_sse(chunks(vec![data])));
        assert_eq!(
            sse_stream.next().await.unwrap().unwrap(),
            Delta::content("tail")
        );
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks() {
        let data = "data: {\"choices\":[{\"delta\":{\"content\":\"你好\"}}]}\n\n".as_bytes();
        let split = data.iter().position(|&b| b >= 0x80).unwrap() + 1;
        let (head, tail) = data.split_at(split);
        let deltas: Vec<_> = process_sse(chunks(vec![head, tail])).collect().await;
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].as_ref().unwrap(), &Delta::content("你好"));
    }

    #[tokio::test]
    async fn crlf_split_between_cr_and_lf() {
        let first: &[u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n\r\n";
        let second: &[u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\r\n\r\n";
        let (head, tail) = first.split_at(first.len() - 1);
        let deltas: Vec<_> = process_sse(chunks(vec![head, tail, second])).collect().await;
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].as_ref().unwrap(), &Delta::content("a"));
        assert_eq!(deltas[1].as_ref().unwrap(), &Delta::content("b"));
    }

    #[tokio::test]
    async fn every_split_point_yields_the_same_deltas() {
        let data = "data: {\"choices\":[{\"delta\":{\"content\":\"é🦀\"}}]}\r\n\r\ndata: [DONE]\r\n\r\n"
            .as_bytes();
        for split in 0..=data.len() {
            let (head, tail) = data.split_at(split);
            let deltas: Vec<_> = process_sse(chunks(vec![head, tail])).collect().await;
            assert_eq!(deltas.len(), 1, "split at {split}");
            assert_eq!(deltas[0].as_ref().unwrap(), &Delta::content("é🦀"));
        }
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_encoding_error() {
        let head: &[u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"";
        let bad: &[u8] = b"\xff\xfe";
        let tail: &[u8] = b"\"}}]}\n\n";
        let mut sse_stream = Box::pin(process_sse(chunks(vec![head, bad, tail])));
        let err = sse_stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let parts = vec![
            Ok(Bytes::from_static(AB)),
            Err(Error::streaming("connection reset", None)),
        ];
        let deltas: Vec<_> = process_sse(stream::iter(parts)).collect().await;
        assert_eq!(deltas.len(), 2);
        assert!(deltas[0].is_ok());
        assert!(matches!(deltas[1], Err(Error::Streaming { .. })));
    }
}
