//! Stream adapter that replays bytes consumed during negotiation.
//!
//! A client may pipeline application data right behind its CONNECT request.
//! Those bytes end up in the negotiation buffer; wrapping the client stream in
//! `PrefixedStream` hands them to the relay before anything read afterwards.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A stream that yields `prefix` before reading from `inner`. Writes go straight through.
pub struct PrefixedStream<S> {
    prefix: Bytes,
    inner: S,
}

impl<S> PrefixedStream<S> {
    pub fn new(prefix: Bytes, inner: S) -> Self {
        Self { prefix, inner }
    }

    /// Bytes of the prefix not yet read.
    pub fn prefix_remaining(&self) -> usize {
        self.prefix.len()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if !self.prefix.is_empty() {
            let n = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..n]);
            self.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[tokio::test]
    async fn pipelined_bytes_come_first() {
        let (mut client, server) = duplex(64);
        let mut stream = PrefixedStream::new(Bytes::from_static(b"GET / "), server);

        client.write_all(b"HTTP/1.0\r\n\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"GET / HTTP/1.0\r\n\r\n");
    }

    #[tokio::test]
    async fn prefix_is_split_across_small_reads() {
        let (_client, server) = duplex(64);
        let mut stream = PrefixedStream::new(Bytes::from_static(b"abcdef"), server);

        let mut buf = [0u8; 4];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"abcd");
        assert_eq!(stream.prefix_remaining(), 2);

        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ef");
        assert_eq!(stream.prefix_remaining(), 0);
    }

    #[tokio::test]
    async fn empty_prefix_reads_inner() {
        let (mut client, server) = duplex(64);
        let mut stream = PrefixedStream::new(Bytes::new(), server);

        client.write_all(b"xyz").await.unwrap();
        let mut buf = [0u8; 8];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"xyz");
    }

    #[tokio::test]
    async fn writes_bypass_prefix() {
        let (mut client, server) = duplex(64);
        let mut stream = PrefixedStream::new(Bytes::from_static(b"unread"), server);

        stream.write_all(b"reply").await.unwrap();
        let mut buf = [0u8; 8];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"reply");
        assert_eq!(stream.prefix_remaining(), 6);
    }
}
