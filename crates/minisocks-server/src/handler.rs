//! Per-connection session: negotiate, then relay until either side closes.

use std::net::SocketAddr;
use std::sync::Arc;

use minisocks_core::io::{ByteCounter, PrefixedStream, RelayOutcome, relay_bidirectional};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::debug;

use crate::error::SessionError;
use crate::negotiate::negotiate;
use crate::state::ServerState;

/// Drive one client session to completion.
///
/// Errors end this session only and are logged here; nothing propagates to
/// the acceptor. Both streams are dropped when this returns.
pub async fn handle_conn<S>(mut stream: S, peer: SocketAddr, state: Arc<ServerState>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let start = Instant::now();

    let negotiated = match negotiate(&mut stream, &state).await {
        Ok(n) => n,
        Err(err) => {
            log_negotiation_failure(peer, &err);
            return;
        }
    };

    debug!(
        peer = %peer,
        requested = %negotiated.requested,
        target = %negotiated.target,
        "session established"
    );

    let client = PrefixedStream::new(negotiated.leftover, stream);
    let counter = ByteCounter::default();
    let result = relay_bidirectional(client, negotiated.destination, state.relay, &counter).await;
    let duration_secs = start.elapsed().as_secs_f64();

    match result {
        Ok(outcome) => debug!(
            peer = %peer,
            target = %negotiated.target,
            up = counter.upstream(),
            down = counter.downstream(),
            duration_secs,
            closed_by = outcome_label(outcome),
            "session closed"
        ),
        Err(err) => {
            let err = SessionError::Io(err);
            debug!(
                peer = %peer,
                target = %negotiated.target,
                up = counter.upstream(),
                down = counter.downstream(),
                duration_secs,
                kind = err.kind(),
                error = %err,
                "session closed with error"
            );
        }
    }
}

fn log_negotiation_failure(peer: SocketAddr, err: &SessionError) {
    debug!(peer = %peer, kind = err.kind(), error = %err, "negotiation failed");
}

fn outcome_label(outcome: RelayOutcome) -> &'static str {
    match outcome {
        RelayOutcome::ClientClosed => "client",
        RelayOutcome::DestinationClosed => "destination",
        RelayOutcome::IdleTimeout => "idle_timeout",
    }
}
