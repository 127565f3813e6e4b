//! Chunked frame decoding.
//!
//! The agent transport delivers `data: <json>\n\n` frames at arbitrary
//! chunk boundaries. [`FrameDecoder`] buffers partial frames and emits
//! each event exactly once, in arrival order, as soon as its closing
//! delimiter is observed. [`EventStream`] lifts the decoder over a
//! fallible byte stream for lazy consumption.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use log::{debug, warn};

use sift_protocol::events::{AgentEvent, FRAME_MARKER};

use super::{DecodeError, StreamError, TransportError};

/// Incremental decoder from raw transport chunks to typed events.
///
/// Single-use per underlying transport stream; feeding chunks from two
/// different streams into one decoder interleaves their frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Offset the delimiter scan resumes from, so trickled delivery of
    /// a large frame stays linear in the frame size.
    scan_from: usize,
}

impl FrameDecoder {
    /// Create a decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every event whose frame
    /// completed with this chunk, in arrival order.
    ///
    /// A frame that fails to decode yields an `Err` item in place of
    /// the event; decoding continues with the next frame.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<AgentEvent, DecodeError>> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some((at, len)) = find_delimiter(&self.buf, self.scan_from) {
            let frame = self.buf.split_to(at + len);
            self.scan_from = 0;
            if let Some(item) = parse_frame(&frame[..at]) {
                out.push(item);
            }
        }
        // A delimiter can straddle the next chunk by up to three bytes.
        self.scan_from = self.buf.len().saturating_sub(3);
        out
    }

    /// Bytes buffered for a frame whose delimiter has not arrived yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Locate the earliest frame delimiter at or after `from`: a blank
/// line, with or without carriage returns.
fn find_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    for i in from..buf.len() {
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        if buf[i..].starts_with(b"\n\n") {
            return Some((i, 2));
        }
    }
    None
}

/// Parse one complete frame. Frames without a payload line (comments,
/// other transport fields) decode to nothing.
fn parse_frame(frame: &[u8]) -> Option<Result<AgentEvent, DecodeError>> {
    let Ok(text) = std::str::from_utf8(frame) else {
        return Some(Err(DecodeError::InvalidUtf8));
    };

    for line in text.lines() {
        if let Some(payload) = line.strip_prefix(FRAME_MARKER) {
            return Some(serde_json::from_str(payload).map_err(DecodeError::from));
        }
    }
    None
}

/// A lazy, ordered, finite stream of decoded agent events over a
/// fallible byte transport.
///
/// Frame-level decode failures surface as recoverable `Err` items; a
/// transport failure is yielded once and ends the stream. Not
/// restartable: one instance per underlying transport stream.
pub struct EventStream<'a> {
    inner: Option<BoxStream<'a, Result<Bytes, TransportError>>>,
    decoder: FrameDecoder,
    pending: VecDeque<Result<AgentEvent, DecodeError>>,
}

impl<'a> EventStream<'a> {
    /// Wrap a raw transport byte stream.
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Send + 'a,
    {
        Self {
            inner: Some(inner.boxed()),
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
        }
    }
}

impl Stream for EventStream<'_> {
    type Item = Result<AgentEvent, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Poll::Ready(Some(item.map_err(StreamError::from)));
            }

            let Some(inner) = self.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let items = self.decoder.feed(&chunk);
                    self.pending.extend(items);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.inner = None;
                    return Poll::Ready(Some(Err(StreamError::Transport(e))));
                }
                Poll::Ready(None) => {
                    self.inner = None;
                    if self.decoder.buffered() > 0 {
                        debug!(
                            "transport closed with {} bytes of incomplete frame",
                            self.decoder.buffered()
                        );
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Collect every well-formed event from a decoded stream, logging and
/// skipping recoverable frame errors, stopping at transport failure.
pub async fn drain_events(
    stream: &mut (impl Stream<Item = Result<AgentEvent, StreamError>> + Unpin),
) -> (Vec<AgentEvent>, Option<TransportError>) {
    let mut events = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => events.push(event),
            Err(StreamError::Decode(e)) => warn!("dropping malformed frame: {}", e),
            Err(StreamError::Transport(e)) => return (events, Some(e)),
        }
    }
    (events, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_protocol::events::SummaryPayload;

    fn ok_events(items: Vec<Result<AgentEvent, DecodeError>>) -> Vec<AgentEvent> {
        items.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        let events = ok_events(decoder.feed(b"data: {\"type\":\"text\",\"data\":\"hello\"}\n\n"));
        assert_eq!(events, vec![AgentEvent::Text("hello".to_string())]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_frame_split_at_every_byte_offset() {
        let frame = b"data: {\"type\":\"text\",\"data\":\"hello\"}\n\n";
        for split_at in 1..frame.len() {
            let mut decoder = FrameDecoder::new();
            let mut events = decoder.feed(&frame[..split_at]);
            events.extend(decoder.feed(&frame[split_at..]));
            let events = ok_events(events);
            assert_eq!(
                events,
                vec![AgentEvent::Text("hello".to_string())],
                "split at {}",
                split_at
            );
        }
    }

    #[test]
    fn test_chunking_invariance() {
        let frames = concat!(
            "data: {\"type\":\"initial_screenshot\",\"data\":\"aGk=\"}\n\n",
            "data: {\"type\":\"text\",\"data\":\"looking\"}\n\n",
            "data: {\"type\":\"tool_use\",\"data\":{\"action\":\"left_click\"}}\n\n",
            "data: {\"type\":\"summary\",\"data\":{\"summary\":\"done\"}}\n\n",
        )
        .as_bytes();

        let mut whole = FrameDecoder::new();
        let expected = ok_events(whole.feed(frames));
        assert_eq!(expected.len(), 4);

        // Feed the same bytes one at a time.
        let mut bytewise = FrameDecoder::new();
        let mut events = Vec::new();
        for byte in frames {
            events.extend(bytewise.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(ok_events(events), expected);
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let mut decoder = FrameDecoder::new();
        let items = decoder.feed(
            b"data: {broken\n\ndata: {\"type\":\"text\",\"data\":\"after\"}\n\n",
        );
        assert_eq!(items.len(), 2);
        assert!(items[0].is_err());
        assert_eq!(
            *items[1].as_ref().unwrap(),
            AgentEvent::Text("after".to_string())
        );
    }

    #[test]
    fn test_crlf_delimiters_and_comment_frames() {
        let mut decoder = FrameDecoder::new();
        let items = decoder.feed(
            b": keepalive\r\n\r\ndata: {\"type\":\"text\",\"data\":\"hi\"}\r\n\r\n",
        );
        assert_eq!(ok_events(items), vec![AgentEvent::Text("hi".to_string())]);
    }

    #[test]
    fn test_bytewise_crlf_delimiters() {
        // The resumed scan must still see a delimiter that trickles in
        // one byte at a time.
        let frames = concat!(
            "data: {\"type\":\"text\",\"data\":\"one\"}\r\n\r\n",
            "data: {\"type\":\"text\",\"data\":\"two\"}\r\n\r\n",
        )
        .as_bytes();

        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for byte in frames {
            events.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(
            ok_events(events),
            vec![
                AgentEvent::Text("one".to_string()),
                AgentEvent::Text("two".to_string()),
            ]
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_incomplete_frame_stays_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":\"text\",").is_empty());
        assert!(decoder.buffered() > 0);
        let events = ok_events(decoder.feed(b"\"data\":\"x\"}\n\n"));
        assert_eq!(events, vec![AgentEvent::Text("x".to_string())]);
    }

    #[tokio::test]
    async fn test_event_stream_over_chunked_transport() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"text\",\"da")),
            Ok(Bytes::from_static(b"ta\":\"hello\"}\n\ndata: {\"type\":\"summary\",")),
            Ok(Bytes::from_static(b"\"data\":{\"summary\":\"done\"}}\n\n")),
        ];
        let mut stream = EventStream::new(futures::stream::iter(chunks));

        let (events, error) = drain_events(&mut stream).await;
        assert!(error.is_none());
        assert_eq!(
            events,
            vec![
                AgentEvent::Text("hello".to_string()),
                AgentEvent::Summary(SummaryPayload {
                    summary: "done".to_string(),
                    screenshot: None,
                    full_narrative: None,
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_event_stream_transport_error_is_terminal() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"text\",\"data\":\"one\"}\n\n")),
            Err(TransportError::Connection("reset".to_string())),
        ];
        let mut stream = EventStream::new(futures::stream::iter(chunks));

        let (events, error) = drain_events(&mut stream).await;
        assert_eq!(events, vec![AgentEvent::Text("one".to_string())]);
        assert!(matches!(error, Some(TransportError::Connection(_))));
        assert!(stream.next().await.is_none());
    }
}
