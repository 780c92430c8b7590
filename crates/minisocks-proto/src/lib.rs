//! SOCKS5 wire codec (RFC 1928 subset).
//!
//! Sans-I/O parsers for the client greeting and the connection request, plus
//! encoders for the server's method selection and reply messages. Parsing is
//! incremental: callers accumulate bytes and retry on `Incomplete`.
//!
//! Only the unauthenticated CONNECT flow with IPv4 or domain-name targets is
//! accepted. Everything else is reported as `Invalid` with a precise reason so
//! the caller can decide whether to answer with a failure reply.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::BytesMut;

pub const SOCKS5_VERSION: u8 = 0x05;

pub const METHOD_NO_AUTH: u8 = 0x00;

pub const CMD_CONNECT: u8 = 0x01;
pub const CMD_BIND: u8 = 0x02;
pub const CMD_UDP_ASSOCIATE: u8 = 0x03;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

/// SOCKS5 reply codes.
pub const REPLY_SUCCEEDED: u8 = 0x00;
pub const REPLY_GENERAL_FAILURE: u8 = 0x01;
pub const REPLY_CONNECTION_NOT_ALLOWED: u8 = 0x02;
pub const REPLY_NETWORK_UNREACHABLE: u8 = 0x03;
pub const REPLY_HOST_UNREACHABLE: u8 = 0x04;
pub const REPLY_CONNECTION_REFUSED: u8 = 0x05;
pub const REPLY_TTL_EXPIRED: u8 = 0x06;
pub const REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;
pub const REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// Maximum domain name length.
pub const MAX_DOMAIN_LEN: usize = 255;
/// Largest greeting a client can send: VER + NMETHODS + 255 methods.
pub const MAX_GREETING_LEN: usize = 2 + 255;
/// Largest request: VER CMD RSV ATYP + LEN + 255 domain bytes + PORT.
pub const MAX_REQUEST_LEN: usize = 4 + 1 + MAX_DOMAIN_LEN + 2;
/// Reply length for an IPv4 bound address.
pub const REPLY_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// First byte of a message is not 0x05.
    InvalidVersion(u8),
    /// CMD is not CONNECT.
    UnsupportedCommand(u8),
    /// ATYP is neither IPv4 nor domain name.
    UnsupportedAddressType(u8),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVersion(v) => write!(f, "invalid SOCKS version: 0x{v:02x}"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command: 0x{c:02x}"),
            Self::UnsupportedAddressType(a) => write!(f, "unsupported address type: 0x{a:02x}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse result for incremental parsing.
///
/// - `Complete(T)` - parsing succeeded, contains the parsed value.
/// - `Incomplete(n)` - buffer too small; `n` is the **minimum total bytes** needed
///   (not the additional bytes needed). Caller should accumulate more data and retry.
/// - `Invalid(e)` - protocol violation, the session must be terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult<T> {
    Complete(T),
    Incomplete(usize),
    Invalid(ParseError),
}

impl<T> ParseResult<T> {
    /// Maps a `Complete` value, leaving `Incomplete` and `Invalid` untouched.
    #[inline]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseResult<U> {
        match self {
            ParseResult::Complete(v) => ParseResult::Complete(f(v)),
            ParseResult::Incomplete(n) => ParseResult::Incomplete(n),
            ParseResult::Invalid(e) => ParseResult::Invalid(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRef<'a> {
    Ipv4([u8; 4]),
    Domain(&'a [u8]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRef<'a> {
    pub host: HostRef<'a>,
    pub port: u16,
}

impl fmt::Display for AddressRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host {
            HostRef::Ipv4(ip) => write!(f, "{}:{}", Ipv4Addr::from(ip), self.port),
            HostRef::Domain(d) => match std::str::from_utf8(d) {
                Ok(s) => write!(f, "{s}:{}", self.port),
                Err(_) => write!(f, "<invalid>:{}", self.port),
            },
        }
    }
}

/// Method-selection message sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting<'a> {
    pub methods: &'a [u8],
    /// Total bytes consumed from the buffer.
    pub len: usize,
}

/// Connection request sent by the client after method selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub command: u8,
    pub address: AddressRef<'a>,
    /// Total bytes consumed from the buffer.
    pub len: usize,
}

#[inline]
pub fn parse_greeting(buf: &[u8]) -> ParseResult<Greeting<'_>> {
    if let Some(res) = expect_version(buf) {
        return res;
    }
    if buf.len() < 2 {
        return ParseResult::Incomplete(2);
    }
    let nmethods = buf[1] as usize;
    let len = 2 + nmethods;
    if buf.len() < len {
        return ParseResult::Incomplete(len);
    }
    ParseResult::Complete(Greeting {
        methods: &buf[2..len],
        len,
    })
}

#[inline]
pub fn parse_request(buf: &[u8]) -> ParseResult<Request<'_>> {
    if let Some(res) = expect_version(buf) {
        return res;
    }
    if buf.len() < 2 {
        return ParseResult::Incomplete(2);
    }
    let command = buf[1];
    if command != CMD_CONNECT {
        return ParseResult::Invalid(ParseError::UnsupportedCommand(command));
    }
    // buf[2] is RSV and is not checked.
    if buf.len() < 4 {
        return ParseResult::Incomplete(4);
    }
    let atyp = buf[3];
    let offset = 4;

    let (address, addr_len) = match parse_address(atyp, &buf[offset..]) {
        ParseResult::Complete(v) => v,
        ParseResult::Incomplete(n) => return ParseResult::Incomplete(offset + n),
        ParseResult::Invalid(e) => return ParseResult::Invalid(e),
    };

    ParseResult::Complete(Request {
        command,
        address,
        len: offset + addr_len,
    })
}

/// Writes the two-byte method selection reply.
pub fn write_method_selection(buf: &mut BytesMut, method: u8) {
    buf.extend_from_slice(&[SOCKS5_VERSION, method]);
}

/// Writes a reply with an IPv4 bound address.
pub fn write_reply(buf: &mut BytesMut, reply: u8, bind: SocketAddrV4) {
    buf.extend_from_slice(&[SOCKS5_VERSION, reply, 0x00, ATYP_IPV4]);
    buf.extend_from_slice(&bind.ip().octets());
    buf.extend_from_slice(&bind.port().to_be_bytes());
}

/// Writes a reply with the zero-filled bound address `0.0.0.0:0`.
pub fn write_reply_unspecified(buf: &mut BytesMut, reply: u8) {
    write_reply(buf, reply, SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
}

#[inline]
fn expect_version<T>(buf: &[u8]) -> Option<ParseResult<T>> {
    match buf.first() {
        None => Some(ParseResult::Incomplete(1)),
        Some(&SOCKS5_VERSION) => None,
        Some(&v) => Some(ParseResult::Invalid(ParseError::InvalidVersion(v))),
    }
}

#[inline]
fn parse_address(atyp: u8, buf: &[u8]) -> ParseResult<(AddressRef<'_>, usize)> {
    match atyp {
        ATYP_IPV4 => {
            if buf.len() < 6 {
                return ParseResult::Incomplete(6);
            }
            let host = HostRef::Ipv4([buf[0], buf[1], buf[2], buf[3]]);
            let port = read_u16(&buf[4..6]);
            ParseResult::Complete((AddressRef { host, port }, 6))
        }
        ATYP_DOMAIN => {
            if buf.is_empty() {
                return ParseResult::Incomplete(1);
            }
            let len = buf[0] as usize;
            let need = 1 + len + 2;
            if buf.len() < need {
                return ParseResult::Incomplete(need);
            }
            let host = HostRef::Domain(&buf[1..1 + len]);
            let port = read_u16(&buf[1 + len..need]);
            ParseResult::Complete((AddressRef { host, port }, need))
        }
        other => ParseResult::Invalid(ParseError::UnsupportedAddressType(other)),
    }
}

#[inline]
fn read_u16(buf: &[u8]) -> u16 {
    u16::from_be_bytes([buf[0], buf[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_greeting_complete() {
        let buf = [0x05, 0x02, 0x00, 0x02, 0xAA];
        match parse_greeting(&buf) {
            ParseResult::Complete(g) => {
                assert_eq!(g.methods, &[0x00, 0x02]);
                assert_eq!(g.len, 4);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_greeting_rejects_version_from_first_byte() {
        assert_eq!(
            parse_greeting(&[0x04]),
            ParseResult::Invalid(ParseError::InvalidVersion(0x04))
        );
    }

    #[test]
    fn parse_greeting_incomplete_reports_total_len() {
        assert_eq!(parse_greeting(&[]), ParseResult::Incomplete(1));
        assert_eq!(parse_greeting(&[0x05]), ParseResult::Incomplete(2));
        assert_eq!(parse_greeting(&[0x05, 0x03, 0x00]), ParseResult::Incomplete(5));
    }

    #[test]
    fn parse_greeting_zero_methods() {
        let buf = [0x05, 0x00];
        match parse_greeting(&buf) {
            ParseResult::Complete(g) => {
                assert!(g.methods.is_empty());
                assert_eq!(g.len, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_request_connect_ipv4() {
        let buf = [0x05, 0x01, 0x00, 0x01, 93, 184, 216, 34, 0x00, 0x50];
        match parse_request(&buf) {
            ParseResult::Complete(req) => {
                assert_eq!(req.command, CMD_CONNECT);
                assert_eq!(req.address.host, HostRef::Ipv4([93, 184, 216, 34]));
                assert_eq!(req.address.port, 80);
                assert_eq!(req.len, 10);
                assert_eq!(req.address.to_string(), "93.184.216.34:80");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_request_connect_domain_with_trailing_payload() {
        let mut buf = vec![0x05, 0x01, 0x00, 0x03, 11];
        buf.extend_from_slice(b"example.com");
        buf.extend_from_slice(&443u16.to_be_bytes());
        buf.extend_from_slice(b"GET");
        match parse_request(&buf) {
            ParseResult::Complete(req) => {
                assert_eq!(req.address.host, HostRef::Domain(b"example.com"));
                assert_eq!(req.address.port, 443);
                assert_eq!(req.len, buf.len() - 3);
                assert_eq!(req.address.to_string(), "example.com:443");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_request_ignores_reserved_byte() {
        let buf = [0x05, 0x01, 0xFF, 0x01, 127, 0, 0, 1, 0x1F, 0x90];
        assert!(matches!(parse_request(&buf), ParseResult::Complete(_)));
    }

    #[test]
    fn parse_request_rejects_bind_and_udp() {
        assert_eq!(
            parse_request(&[0x05, CMD_BIND]),
            ParseResult::Invalid(ParseError::UnsupportedCommand(CMD_BIND))
        );
        assert_eq!(
            parse_request(&[0x05, CMD_UDP_ASSOCIATE, 0x00, 0x01]),
            ParseResult::Invalid(ParseError::UnsupportedCommand(CMD_UDP_ASSOCIATE))
        );
    }

    #[test]
    fn parse_request_rejects_ipv6_and_unknown_atyp() {
        assert_eq!(
            parse_request(&[0x05, 0x01, 0x00, ATYP_IPV6]),
            ParseResult::Invalid(ParseError::UnsupportedAddressType(ATYP_IPV6))
        );
        assert_eq!(
            parse_request(&[0x05, 0x01, 0x00, 0x09]),
            ParseResult::Invalid(ParseError::UnsupportedAddressType(0x09))
        );
    }

    #[test]
    fn parse_request_wrong_version() {
        assert_eq!(
            parse_request(&[0x04, 0x01]),
            ParseResult::Invalid(ParseError::InvalidVersion(0x04))
        );
    }

    #[test]
    fn parse_request_incomplete() {
        assert_eq!(parse_request(&[0x05, 0x01, 0x00]), ParseResult::Incomplete(4));
        assert_eq!(
            parse_request(&[0x05, 0x01, 0x00, 0x01, 10, 0]),
            ParseResult::Incomplete(10)
        );
        assert_eq!(
            parse_request(&[0x05, 0x01, 0x00, 0x03]),
            ParseResult::Incomplete(5)
        );
        assert_eq!(
            parse_request(&[0x05, 0x01, 0x00, 0x03, 4, b'a']),
            ParseResult::Incomplete(11)
        );
    }

    #[test]
    fn parse_request_empty_domain() {
        let buf = [0x05, 0x01, 0x00, 0x03, 0x00, 0x00, 0x50];
        match parse_request(&buf) {
            ParseResult::Complete(req) => {
                assert_eq!(req.address.host, HostRef::Domain(b""));
                assert_eq!(req.len, 7);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn map_keeps_incomplete_and_invalid() {
        let buf = [0x05, 0x01, 0x00];
        assert_eq!(parse_greeting(&buf).map(|g| g.len), ParseResult::Complete(3));
        assert_eq!(parse_request(&buf).map(|r| r.len), ParseResult::Incomplete(4));
        assert_eq!(
            parse_greeting(&[0x01]).map(|g| g.len),
            ParseResult::Invalid(ParseError::InvalidVersion(0x01))
        );
    }

    #[test]
    fn write_success_reply_is_zero_filled() {
        let mut buf = BytesMut::new();
        write_reply_unspecified(&mut buf, REPLY_SUCCEEDED);
        assert_eq!(&buf[..], &[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(buf.len(), REPLY_LEN);
    }

    #[test]
    fn write_reply_encodes_bound_address() {
        let mut buf = BytesMut::new();
        write_reply(
            &mut buf,
            REPLY_HOST_UNREACHABLE,
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 1080),
        );
        assert_eq!(&buf[..], &[0x05, 0x04, 0x00, 0x01, 10, 0, 0, 1, 0x04, 0x38]);
    }

    #[test]
    fn write_method_selection_no_auth() {
        let mut buf = BytesMut::new();
        write_method_selection(&mut buf, METHOD_NO_AUTH);
        assert_eq!(&buf[..], &[0x05, 0x00]);
    }

    #[test]
    fn longest_messages_match_bounds() {
        let mut greeting = vec![0x05, 0xFF];
        greeting.extend(std::iter::repeat_n(0x00, 255));
        match parse_greeting(&greeting) {
            ParseResult::Complete(g) => assert_eq!(g.len, MAX_GREETING_LEN),
            other => panic!("unexpected: {other:?}"),
        }

        let mut request = vec![0x05, 0x01, 0x00, ATYP_DOMAIN, MAX_DOMAIN_LEN as u8];
        request.extend(std::iter::repeat_n(b'a', MAX_DOMAIN_LEN));
        request.extend_from_slice(&[0x01, 0xBB]);
        match parse_request(&request) {
            ParseResult::Complete(r) => {
                assert_eq!(r.len, MAX_REQUEST_LEN);
                assert_eq!(r.address.port, 443);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
