//! Destination resolution.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use minisocks_proto::{AddressRef, HostRef};
use tracing::trace;

use crate::error::SessionError;

/// Destination as requested by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Ipv4(SocketAddrV4),
    Domain { host: Vec<u8>, port: u16 },
}

impl From<&AddressRef<'_>> for Target {
    fn from(addr: &AddressRef<'_>) -> Self {
        match addr.host {
            HostRef::Ipv4(ip) => Target::Ipv4(SocketAddrV4::new(Ipv4Addr::from(ip), addr.port)),
            HostRef::Domain(d) => Target::Domain {
                host: d.to_vec(),
                port: addr.port,
            },
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Ipv4(addr) => write!(f, "{addr}"),
            Target::Domain { host, port } => {
                write!(f, "{}:{port}", String::from_utf8_lossy(host))
            }
        }
    }
}

/// Forward lookup of a domain name to one IPv4 address.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, SessionError>;
}

/// Resolver backed by the operating system (`getaddrinfo` on tokio's blocking pool).
///
/// The first IPv4 address returned wins; IPv6 results are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, SessionError> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| {
                trace!(host, error = %e, "lookup failed");
                SessionError::Resolution(host.to_string())
            })?;
        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| SessionError::Resolution(host.to_string()))
    }
}

/// Turn a requested target into a concrete IPv4 endpoint.
///
/// IPv4 literals are returned as-is. Domains go through `resolver` exactly once;
/// there is no retry and no fallback to another address.
pub async fn resolve_target(
    target: &Target,
    resolver: &dyn Resolver,
) -> Result<SocketAddrV4, SessionError> {
    match target {
        Target::Ipv4(addr) => Ok(*addr),
        Target::Domain { host, port } => {
            let name = std::str::from_utf8(host)
                .map_err(|_| SessionError::Resolution(String::from_utf8_lossy(host).into_owned()))?;
            if name.is_empty() {
                return Err(SessionError::Resolution("<empty>".into()));
            }
            let ip = resolver.resolve_ipv4(name).await?;
            Ok(SocketAddrV4::new(ip, *port))
        }
    }
}
