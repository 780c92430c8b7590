//! Server and session error types.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, SocketAddrV4};

use minisocks_core::{
    ERROR_CLOSED, ERROR_CONFIG, ERROR_CONNECT, ERROR_IO, ERROR_PROTOCOL, ERROR_RESOLVE,
};
use minisocks_proto::{
    ParseError, REPLY_ADDRESS_TYPE_NOT_SUPPORTED, REPLY_COMMAND_NOT_SUPPORTED,
    REPLY_CONNECTION_NOT_ALLOWED, REPLY_CONNECTION_REFUSED, REPLY_GENERAL_FAILURE,
    REPLY_HOST_UNREACHABLE, REPLY_NETWORK_UNREACHABLE, REPLY_TTL_EXPIRED,
};

/// Why a single session ended early. Every variant is terminal for its session only.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("invalid SOCKS version: 0x{0:02x}")]
    ProtocolVersion(u8),
    #[error("unsupported command: 0x{0:02x}")]
    UnsupportedCommand(u8),
    #[error("unsupported address type: 0x{0:02x}")]
    UnsupportedAddressType(u8),
    #[error("resolve {0} failed")]
    Resolution(String),
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// A handshake message did not arrive in a single read.
    #[error("handshake message truncated")]
    Truncated,
}

impl From<ParseError> for SessionError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::InvalidVersion(v) => Self::ProtocolVersion(v),
            ParseError::UnsupportedCommand(c) => Self::UnsupportedCommand(c),
            ParseError::UnsupportedAddressType(a) => Self::UnsupportedAddressType(a),
        }
    }
}

impl SessionError {
    /// Get the error kind label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::ConnectionClosed => ERROR_CLOSED,
            SessionError::ProtocolVersion(_)
            | SessionError::UnsupportedCommand(_)
            | SessionError::UnsupportedAddressType(_)
            | SessionError::Truncated => ERROR_PROTOCOL,
            SessionError::Resolution(_) => ERROR_RESOLVE,
            SessionError::Connect { .. } => ERROR_CONNECT,
            SessionError::Io(_) => ERROR_IO,
        }
    }

    /// SOCKS5 REP code describing this failure, if the protocol defines one.
    pub fn reply_code(&self) -> Option<u8> {
        match self {
            SessionError::UnsupportedCommand(_) => Some(REPLY_COMMAND_NOT_SUPPORTED),
            SessionError::UnsupportedAddressType(_) => Some(REPLY_ADDRESS_TYPE_NOT_SUPPORTED),
            SessionError::Resolution(_) => Some(REPLY_HOST_UNREACHABLE),
            SessionError::Connect { source, .. } => Some(match source.kind() {
                ErrorKind::ConnectionRefused => REPLY_CONNECTION_REFUSED,
                ErrorKind::NetworkUnreachable => REPLY_NETWORK_UNREACHABLE,
                ErrorKind::HostUnreachable => REPLY_HOST_UNREACHABLE,
                ErrorKind::PermissionDenied => REPLY_CONNECTION_NOT_ALLOWED,
                ErrorKind::TimedOut => REPLY_TTL_EXPIRED,
                ErrorKind::AddrNotAvailable => REPLY_HOST_UNREACHABLE,
                _ => REPLY_GENERAL_FAILURE,
            }),
            SessionError::ConnectionClosed
            | SessionError::ProtocolVersion(_)
            | SessionError::Truncated
            | SessionError::Io(_) => None,
        }
    }
}

/// Errors that stop the acceptor itself.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("config: {0}")]
    Config(String),
}

impl ServerError {
    /// Get the error kind label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Io(_) | ServerError::Bind { .. } => ERROR_IO,
            ServerError::Config(_) => ERROR_CONFIG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn connect_err(kind: ErrorKind) -> SessionError {
        SessionError::Connect {
            addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9),
            source: io::Error::new(kind, "test"),
        }
    }

    #[test]
    fn reply_code_maps_connect_errors() {
        assert_eq!(
            connect_err(ErrorKind::ConnectionRefused).reply_code(),
            Some(REPLY_CONNECTION_REFUSED)
        );
        assert_eq!(
            connect_err(ErrorKind::PermissionDenied).reply_code(),
            Some(REPLY_CONNECTION_NOT_ALLOWED)
        );
        assert_eq!(
            connect_err(ErrorKind::TimedOut).reply_code(),
            Some(REPLY_TTL_EXPIRED)
        );
        assert_eq!(
            connect_err(ErrorKind::Other).reply_code(),
            Some(REPLY_GENERAL_FAILURE)
        );
    }

    #[test]
    fn reply_code_for_negotiation_errors() {
        assert_eq!(
            SessionError::UnsupportedCommand(0x02).reply_code(),
            Some(REPLY_COMMAND_NOT_SUPPORTED)
        );
        assert_eq!(
            SessionError::UnsupportedAddressType(0x04).reply_code(),
            Some(REPLY_ADDRESS_TYPE_NOT_SUPPORTED)
        );
        assert_eq!(
            SessionError::Resolution("nowhere.invalid".into()).reply_code(),
            Some(REPLY_HOST_UNREACHABLE)
        );
        assert_eq!(SessionError::ProtocolVersion(0x04).reply_code(), None);
        assert_eq!(SessionError::ConnectionClosed.reply_code(), None);
    }

    #[test]
    fn parse_errors_convert_to_taxonomy() {
        assert!(matches!(
            SessionError::from(ParseError::InvalidVersion(4)),
            SessionError::ProtocolVersion(4)
        ));
        assert_eq!(SessionError::from(ParseError::UnsupportedCommand(3)).kind(), ERROR_PROTOCOL);
        assert_eq!(connect_err(ErrorKind::Other).kind(), ERROR_CONNECT);
    }
}
