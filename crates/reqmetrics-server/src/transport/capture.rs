//! Response capture: copy outbound bytes while forwarding them untouched.
//!
//! Two decorators share one accumulator:
//! - `CaptureWriter` wraps any `io::Write` (blocking writers).
//! - `CaptureBody` wraps an HTTP response body stream and fires a completion
//!   hook exactly once, when the stream ends, errors, or is dropped.
//!
//! Bytes beyond the capture limit are still forwarded, only the copy stops.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use http_body::{Body as HttpBody, Frame, SizeHint};

/// How the response stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every frame was handed to the transport.
    Completed,
    /// The body stream yielded an error.
    Aborted,
    /// The body was dropped before its end (client gone, task cancelled).
    Dropped,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Aborted => "aborted",
            Outcome::Dropped => "dropped",
        }
    }
}

/// Bytes captured from one response.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub body: Bytes,
    /// True when the handler wrote more than the capture limit.
    pub truncated: bool,
    pub outcome: Outcome,
}

/// Per-request accumulator.
#[derive(Debug)]
pub struct CaptureBuffer {
    buf: BytesMut,
    limit: usize,
    truncated: bool,
}

impl CaptureBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
            truncated: false,
        }
    }

    /// Append in call order, up to the limit.
    pub fn record(&mut self, bytes: &[u8]) {
        let room = self.limit.saturating_sub(self.buf.len());
        if bytes.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn finish(self, outcome: Outcome) -> CapturedResponse {
        CapturedResponse {
            body: self.buf.freeze(),
            truncated: self.truncated,
            outcome,
        }
    }
}

/// `io::Write` decorator: forwards every write and records exactly the bytes
/// the inner writer accepted, so capture and transport never disagree.
///
/// Blocking-writer form for stacks that hand handlers a `Write` sink instead
/// of a body stream; the axum middleware uses `CaptureBody`.
#[derive(Debug)]
pub struct CaptureWriter<W> {
    inner: W,
    capture: CaptureBuffer,
}

impl<W: io::Write> CaptureWriter<W> {
    pub fn new(inner: W, limit: usize) -> Self {
        Self {
            inner,
            capture: CaptureBuffer::new(limit),
        }
    }

    pub fn captured(&self) -> &[u8] {
        self.capture.as_bytes()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_parts(self) -> (W, CapturedResponse) {
        (self.inner, self.capture.finish(Outcome::Completed))
    }
}

impl<W: io::Write> io::Write for CaptureWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.capture.record(buf.get(..n).unwrap_or(buf));
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Completion hook run once with the captured response.
pub type CaptureHook = Box<dyn FnOnce(CapturedResponse) + Send + 'static>;

/// Response body decorator.
pub struct CaptureBody {
    inner: Body,
    capture: Option<CaptureBuffer>,
    hook: Option<CaptureHook>,
}

impl CaptureBody {
    pub fn new(inner: Body, limit: usize, hook: CaptureHook) -> Self {
        Self {
            inner,
            capture: Some(CaptureBuffer::new(limit)),
            hook: Some(hook),
        }
    }

    /// Wrap `inner` and return it as a plain `Body`.
    pub fn wrap(inner: Body, limit: usize, hook: CaptureHook) -> Body {
        Body::new(Self::new(inner, limit, hook))
    }

    fn finish(&mut self, outcome: Outcome) {
        if let (Some(capture), Some(hook)) = (self.capture.take(), self.hook.take()) {
            hook(capture.finish(outcome));
        }
    }
}

impl HttpBody for CaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(data), Some(capture)) = (frame.data_ref(), this.capture.as_mut()) {
                    capture.record(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish(Outcome::Aborted);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish(Outcome::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

// hyper stops polling once `is_end_stream` turns true and then drops the
// body, so a drop after the last frame still counts as completed.
impl Drop for CaptureBody {
    fn drop(&mut self) {
        let outcome = if self.inner.is_end_stream() {
            Outcome::Completed
        } else {
            Outcome::Dropped
        };
        self.finish(outcome);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use futures_util::stream;
    use http_body_util::BodyExt;

    use super::*;

    /// Writer that accepts at most `max` bytes per call.
    struct Trickle {
        out: Vec<u8>,
        max: usize,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.max);
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sink() -> (Arc<Mutex<Option<CapturedResponse>>>, CaptureHook) {
        let slot = Arc::new(Mutex::new(None));
        let s = Arc::clone(&slot);
        let hook: CaptureHook = Box::new(move |c| {
            let mut g = s.lock().unwrap();
            assert!(g.is_none(), "hook must run once");
            *g = Some(c);
        });
        (slot, hook)
    }

    #[test]
    fn writer_forwards_and_records_in_order() {
        let mut w = CaptureWriter::new(Vec::new(), 1024);
        for chunk in [&b"{\"code\":"[..], b"1000,", b"\"message\":\"ok\"}"] {
            assert_eq!(w.write(chunk).unwrap(), chunk.len());
        }
        let (out, captured) = w.into_parts();
        assert_eq!(out, br#"{"code":1000,"message":"ok"}"#);
        assert_eq!(&captured.body[..], &out[..]);
        assert!(!captured.truncated);
    }

    #[test]
    fn partial_writes_are_reported_unchanged() {
        let mut w = CaptureWriter::new(Trickle { out: Vec::new(), max: 3 }, 1024);
        assert_eq!(w.write(b"abcdefgh").unwrap(), 3);
        assert_eq!(w.captured(), b"abc");

        w.write_all(b"defgh").unwrap();
        assert_eq!(w.get_ref().out, b"abcdefgh");
        assert_eq!(w.captured(), b"abcdefgh");
    }

    #[test]
    fn inner_errors_pass_through_without_recording() {
        let mut w = CaptureWriter::new(Broken, 1024);
        let err = w.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(w.captured().is_empty());
    }

    #[test]
    fn buffer_stops_copying_at_limit() {
        let mut buf = CaptureBuffer::new(4);
        buf.record(b"abc");
        buf.record(b"def");
        assert_eq!(buf.as_bytes(), b"abcd");
        assert!(buf.is_truncated());
    }

    #[tokio::test]
    async fn body_forwards_chunks_and_fires_hook_once() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"Code\":1000,")),
            Ok(Bytes::from_static(b"\"Msg\":\"Success\",")),
            Ok(Bytes::from_static(b"\"Data\":\"123\"}")),
        ];
        let inner = Body::from_stream(stream::iter(chunks));
        let (slot, hook) = sink();

        let body = CaptureBody::wrap(inner, 1024, hook);
        let forwarded = body.collect().await.unwrap().to_bytes();

        let captured = slot.lock().unwrap().take().unwrap();
        assert_eq!(&forwarded[..], br#"{"Code":1000,"Msg":"Success","Data":"123"}"#);
        assert_eq!(captured.body, forwarded);
        assert_eq!(captured.outcome, Outcome::Completed);
    }

    #[tokio::test]
    async fn full_body_completes_on_drop_after_last_frame() {
        let (slot, hook) = sink();
        let mut body = CaptureBody::new(Body::from("hello"), 1024, hook);

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), "hello");
        assert!(body.is_end_stream());
        assert!(slot.lock().unwrap().is_none());

        drop(body);
        let captured = slot.lock().unwrap().take().unwrap();
        assert_eq!(&captured.body[..], b"hello");
        assert_eq!(captured.outcome, Outcome::Completed);
    }

    #[tokio::test]
    async fn stream_error_reports_aborted() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"code\":")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "upstream failed")),
        ];
        let (slot, hook) = sink();
        let body = CaptureBody::wrap(Body::from_stream(stream::iter(chunks)), 1024, hook);

        assert!(body.collect().await.is_err());
        let captured = slot.lock().unwrap().take().unwrap();
        assert_eq!(captured.outcome, Outcome::Aborted);
        assert_eq!(&captured.body[..], b"{\"code\":");
    }

    #[tokio::test]
    async fn dropping_unfinished_body_reports_dropped() {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from_static(b"part-1")), Ok(Bytes::from_static(b"part-2"))];
        let (slot, hook) = sink();
        let mut body = CaptureBody::new(Body::from_stream(stream::iter(chunks)), 1024, hook);

        let _ = body.frame().await.unwrap().unwrap();
        drop(body);

        let captured = slot.lock().unwrap().take().unwrap();
        assert_eq!(captured.outcome, Outcome::Dropped);
        assert_eq!(&captured.body[..], b"part-1");
    }

    #[tokio::test]
    async fn oversized_body_is_forwarded_in_full() {
        let payload = vec![b'x'; 4096];
        let (slot, hook) = sink();
        let body = CaptureBody::wrap(Body::from(payload.clone()), 1024, hook);

        let forwarded = body.collect().await.unwrap().to_bytes();
        assert_eq!(forwarded.len(), 4096);
        let captured = slot.lock().unwrap().take().unwrap();
        assert_eq!(captured.body.len(), 1024);
        assert!(captured.truncated);
    }
}
