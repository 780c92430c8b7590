//! I/O utilities for the session relay.

mod prefixed;
mod relay;

pub use prefixed::PrefixedStream;
pub use relay::{
    ByteCounter, NoOpMetrics, RelayMetrics, RelayOptions, RelayOutcome, relay_bidirectional,
};
