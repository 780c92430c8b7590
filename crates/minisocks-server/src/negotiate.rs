//! SOCKS5 negotiation: greeting, method selection, CONNECT request, reply.
//!
//! Only the no-authentication method and the CONNECT command are served. The
//! method reply is always `05 00`, whatever the client offered. On success the
//! reply carries the zero-filled bound address `0.0.0.0:0`.

use std::io::ErrorKind;
use std::net::SocketAddrV4;

use bytes::{Buf, Bytes, BytesMut};
use minisocks_config::HandshakeRead;
use minisocks_core::defaults::DEFAULT_HANDSHAKE_READ_SIZE;
use minisocks_proto::{
    METHOD_NO_AUTH, ParseResult, REPLY_LEN, REPLY_SUCCEEDED, parse_greeting, parse_request,
    write_method_selection, write_reply_unspecified,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::SessionError;
use crate::resolve::{Target, resolve_target};
use crate::state::ServerState;
use crate::util::connect_target;

/// A session that finished negotiation and is ready to relay.
#[derive(Debug)]
pub struct Negotiated {
    pub destination: TcpStream,
    /// Resolved endpoint the destination stream is connected to.
    pub target: SocketAddrV4,
    /// Destination exactly as the client asked for it.
    pub requested: Target,
    /// Client bytes that arrived after the request and still need relaying.
    pub leftover: Bytes,
}

/// Buffers handshake bytes and applies the read policy.
pub(crate) struct HandshakeReader {
    buf: BytesMut,
    policy: HandshakeRead,
}

impl HandshakeReader {
    pub(crate) fn new(policy: HandshakeRead) -> Self {
        Self {
            buf: BytesMut::with_capacity(DEFAULT_HANDSHAKE_READ_SIZE),
            policy,
        }
    }

    /// Read until `parse` yields a complete message, then consume it.
    ///
    /// `parse` returns the message length together with an owned value.
    /// Under [`HandshakeRead::Single`] a message may use bytes already
    /// buffered plus at most one read.
    pub(crate) async fn read_message<S, T>(
        &mut self,
        stream: &mut S,
        parse: impl Fn(&[u8]) -> ParseResult<(usize, T)>,
    ) -> Result<T, SessionError>
    where
        S: AsyncRead + Unpin,
    {
        let mut reads = 0usize;
        loop {
            match parse(&self.buf) {
                ParseResult::Complete((len, value)) => {
                    self.buf.advance(len);
                    return Ok(value);
                }
                ParseResult::Invalid(e) => return Err(e.into()),
                ParseResult::Incomplete(_) => {
                    if self.policy == HandshakeRead::Single && reads > 0 {
                        return Err(SessionError::Truncated);
                    }
                    self.buf.reserve(DEFAULT_HANDSHAKE_READ_SIZE);
                    let n = match stream.read_buf(&mut self.buf).await {
                        Ok(n) => n,
                        Err(e) if is_peer_gone(e.kind()) => {
                            return Err(SessionError::ConnectionClosed);
                        }
                        Err(e) => return Err(SessionError::Io(e)),
                    };
                    if n == 0 {
                        return Err(SessionError::ConnectionClosed);
                    }
                    reads += 1;
                }
            }
        }
    }

    pub(crate) fn into_leftover(self) -> Bytes {
        self.buf.freeze()
    }
}

fn is_peer_gone(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

/// Run the full negotiation on a freshly accepted client stream.
///
/// On success the destination is connected and the success reply has been
/// written. On failure nothing is sent unless failure replies are enabled and
/// the error has a REP code; the caller then drops the client stream.
pub async fn negotiate<S>(stream: &mut S, state: &ServerState) -> Result<Negotiated, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = HandshakeReader::new(state.handshake_read);

    let methods = reader
        .read_message(stream, |b| parse_greeting(b).map(|g| (g.len, g.methods.len())))
        .await?;
    trace!(methods, "greeting received");

    let mut out = BytesMut::with_capacity(REPLY_LEN);
    write_method_selection(&mut out, METHOD_NO_AUTH);
    stream.write_all(&out).await?;

    match connect_request(stream, &mut reader, state).await {
        Ok((destination, target, requested)) => {
            out.clear();
            write_reply_unspecified(&mut out, REPLY_SUCCEEDED);
            stream.write_all(&out).await?;
            Ok(Negotiated {
                destination,
                target,
                requested,
                leftover: reader.into_leftover(),
            })
        }
        Err(err) => {
            reply_failure(stream, state, &err).await;
            Err(err)
        }
    }
}

async fn connect_request<S>(
    stream: &mut S,
    reader: &mut HandshakeReader,
    state: &ServerState,
) -> Result<(TcpStream, SocketAddrV4, Target), SessionError>
where
    S: AsyncRead + Unpin,
{
    let requested = reader
        .read_message(stream, |b| {
            parse_request(b).map(|r| (r.len, Target::from(&r.address)))
        })
        .await?;
    debug!(requested = %requested, "connect request");

    let target = resolve_target(&requested, state.resolver.as_ref()).await?;
    let destination = connect_target(target, state.tcp_nodelay, state.connect_timeout)
        .await
        .map_err(|source| SessionError::Connect {
            addr: target,
            source,
        })?;
    Ok((destination, target, requested))
}

async fn reply_failure<S>(stream: &mut S, state: &ServerState, err: &SessionError)
where
    S: AsyncWrite + Unpin,
{
    if !state.failure_replies {
        return;
    }
    let Some(code) = err.reply_code() else {
        return;
    };
    let mut out = BytesMut::with_capacity(REPLY_LEN);
    write_reply_unspecified(&mut out, code);
    if let Err(e) = stream.write_all(&out).await {
        trace!(error = %e, "failure reply not delivered");
    }
}
