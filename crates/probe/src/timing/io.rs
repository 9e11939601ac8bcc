//! Stream wrapper that reports request/response byte flow to a recorder.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::recorder::PhaseRecorder;

/// Marks the last request write and the first response byte.
///
/// Wraps the stream handed to the HTTP layer, so TLS handshake traffic is
/// never counted as upload or first byte.
pub(crate) struct TimedStream<S> {
    inner: S,
    recorder: PhaseRecorder,
}

impl<S> TimedStream<S> {
    pub(crate) fn new(inner: S, recorder: PhaseRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            self.recorder.record_read();
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if matches!(poll, Poll::Ready(Ok(n)) if n > 0) {
            self.recorder.record_write();
        }
        poll
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write_vectored(cx, bufs);
        if matches!(poll, Poll::Ready(Ok(n)) if n > 0) {
            self.recorder.record_write();
        }
        poll
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_records_write_then_first_byte() {
        let (client, mut server) = tokio::io::duplex(64);
        let recorder = PhaseRecorder::start();
        recorder.mark(crate::timing::Mark::ConnectStart);
        recorder.mark(crate::timing::Mark::ConnectEnd);
        let mut stream = TimedStream::new(client, recorder.clone());

        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        server.write_all(b"pong").await.unwrap();
        stream.read_exact(&mut buf).await.unwrap();

        let timings = recorder.finish();
        assert!(timings.ttfb >= 4.0, "ttfb was {}", timings.ttfb);
        assert!(timings.phase_sum() <= timings.total + 1e-6);
    }
}
