//! Bidirectional byte relay with joint termination.
//!
//! Both directions (client -> destination and destination -> client) are
//! driven as independent poll-based state machines inside a single future, so
//! a silent or back-pressured direction never stalls the other one.
//!
//! The relay is one pipe, not two half-duplex streams: the first direction to
//! observe end-of-stream or an error ends the whole session. Both write halves
//! are shut down and both streams are released when the function returns.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::time::{Instant, Sleep};

use crate::defaults::DEFAULT_RELAY_BUFFER_SIZE;

/// Trait for recording relayed bytes.
pub trait RelayMetrics {
    /// Bytes forwarded from client to destination.
    fn record_upstream(&self, bytes: u64);
    /// Bytes forwarded from destination to client.
    fn record_downstream(&self, bytes: u64);
}

/// No-op metrics implementation for cases where metrics aren't needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl RelayMetrics for NoOpMetrics {
    #[inline]
    fn record_upstream(&self, _bytes: u64) {}
    #[inline]
    fn record_downstream(&self, _bytes: u64) {}
}

/// Per-session byte totals.
#[derive(Debug, Default)]
pub struct ByteCounter {
    upstream: AtomicU64,
    downstream: AtomicU64,
}

impl ByteCounter {
    pub fn upstream(&self) -> u64 {
        self.upstream.load(Ordering::Relaxed)
    }

    pub fn downstream(&self) -> u64 {
        self.downstream.load(Ordering::Relaxed)
    }
}

impl RelayMetrics for ByteCounter {
    #[inline]
    fn record_upstream(&self, bytes: u64) {
        self.upstream.fetch_add(bytes, Ordering::Relaxed);
    }
    #[inline]
    fn record_downstream(&self, bytes: u64) {
        self.downstream.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// Relay tuning.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    /// Size of the fixed buffer allocated for each direction.
    pub buffer_size: usize,
    /// Close the session after this long with no traffic in either direction.
    /// `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            idle_timeout: None,
        }
    }
}

/// Why a relay ended without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The client reached end-of-stream first.
    ClientClosed,
    /// The destination reached end-of-stream first.
    DestinationClosed,
    /// No traffic within the configured idle timeout.
    IdleTimeout,
}

/// State machine for one-directional copy with flush.
enum CopyState {
    Reading,
    Writing(usize, usize), // (pos, len)
    Flushing(usize),       // bytes flushing
}

/// Result of polling one copy direction.
enum CopyPoll {
    /// A chunk was written and flushed.
    Forwarded(usize),
    /// The reader hit end-of-stream.
    Eof,
}

/// Poll-driven one-directional copy: read -> write -> flush.
///
/// Whatever a single read returns is forwarded as-is; partial buffers are
/// never held back to be coalesced with later reads.
fn poll_copy_direction<R, W>(
    cx: &mut Context<'_>,
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    state: &mut CopyState,
) -> Poll<io::Result<CopyPoll>>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    loop {
        match state {
            CopyState::Reading => {
                let mut read_buf = ReadBuf::new(buf);
                match Pin::new(&mut *reader).poll_read(cx, &mut read_buf) {
                    Poll::Ready(Ok(())) => {
                        let n = read_buf.filled().len();
                        if n == 0 {
                            return Poll::Ready(Ok(CopyPoll::Eof));
                        }
                        *state = CopyState::Writing(0, n);
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            CopyState::Writing(pos, len) => {
                match Pin::new(&mut *writer).poll_write(cx, &buf[*pos..*len]) {
                    Poll::Ready(Ok(0)) => {
                        return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                    }
                    Poll::Ready(Ok(n)) => {
                        *pos += n;
                        if *pos >= *len {
                            *state = CopyState::Flushing(*len);
                        }
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            CopyState::Flushing(bytes) => {
                let bytes = *bytes;
                match Pin::new(&mut *writer).poll_flush(cx) {
                    Poll::Ready(Ok(())) => {
                        *state = CopyState::Reading;
                        return Poll::Ready(Ok(CopyPoll::Forwarded(bytes)));
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
        }
    }
}

/// One wake-up of the combined future.
enum Step {
    Activity,
    Closed(RelayOutcome),
}

/// Relay bytes between `client` and `destination` until either side hangs up.
///
/// # Arguments
///
/// * `client` - The accepted client stream (after negotiation)
/// * `destination` - The outbound stream to the requested target
/// * `options` - Buffer size and optional idle timeout
/// * `metrics` - Recorder for bytes forwarded in each direction
///
/// Returns which side ended the session, or the first I/O error seen in
/// either direction. In every case both streams are closed on return.
pub async fn relay_bidirectional<A, B, M>(
    client: A,
    destination: B,
    options: RelayOptions,
    metrics: &M,
) -> io::Result<RelayOutcome>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
    M: RelayMetrics + ?Sized,
{
    let (mut client_r, mut client_w) = tokio::io::split(client);
    let (mut dest_r, mut dest_w) = tokio::io::split(destination);

    let mut up_buf = vec![0u8; options.buffer_size];
    let mut down_buf = vec![0u8; options.buffer_size];
    let mut up_state = CopyState::Reading;
    let mut down_state = CopyState::Reading;

    let mut idle_sleep = options.idle_timeout.map(|d| Box::pin(tokio::time::sleep(d)));

    let outcome = loop {
        // Each direction registers its own waker, so either one can make
        // progress while the other is parked on a read or a blocked write.
        let both = std::future::poll_fn(|cx| {
            let mut activity = false;

            match poll_copy_direction(cx, &mut client_r, &mut dest_w, &mut up_buf, &mut up_state) {
                Poll::Ready(Ok(CopyPoll::Forwarded(n))) => {
                    metrics.record_upstream(n as u64);
                    activity = true;
                }
                Poll::Ready(Ok(CopyPoll::Eof)) => {
                    return Poll::Ready(Ok(Step::Closed(RelayOutcome::ClientClosed)));
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {}
            }

            match poll_copy_direction(cx, &mut dest_r, &mut client_w, &mut down_buf, &mut down_state) {
                Poll::Ready(Ok(CopyPoll::Forwarded(n))) => {
                    metrics.record_downstream(n as u64);
                    activity = true;
                }
                Poll::Ready(Ok(CopyPoll::Eof)) => {
                    return Poll::Ready(Ok(Step::Closed(RelayOutcome::DestinationClosed)));
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {}
            }

            if activity {
                Poll::Ready(Ok(Step::Activity))
            } else {
                Poll::Pending
            }
        });

        let step = tokio::select! {
            result = both => result?,
            _ = idle_elapsed(&mut idle_sleep) => Step::Closed(RelayOutcome::IdleTimeout),
        };

        match step {
            Step::Activity => {
                if let (Some(sleep), Some(timeout)) = (idle_sleep.as_mut(), options.idle_timeout) {
                    sleep.as_mut().reset(Instant::now() + timeout);
                }
            }
            Step::Closed(outcome) => break outcome,
        }
    };

    // No half-close: whichever side hung up, the other one is closed too.
    let _ = client_w.shutdown().await;
    let _ = dest_w.shutdown().await;

    Ok(outcome)
}

async fn idle_elapsed(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
