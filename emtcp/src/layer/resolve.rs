//! Address resolution consumed by client sockets.
//!
//! Before a client can send its SYN it needs the link address of the remote host, or of the
//! gateway towards it, and possibly its IP address if only a host name was given. The TCP layer
//! does not implement ARP or DNS itself but polls a [`Resolver`] from the scheduler tick. Both
//! protocols are asynchronous: a request is started once and then polled until it yields.
//!
//! DNS is modelled as a single shared module. A socket must acquire it with `dns_begin_usage`
//! before resolving and release it with `dns_end_usage` afterwards.
//!
//! [`Resolver`]: trait.Resolver.html
use core::fmt;

use crate::wire::{EthernetAddress, Ipv4Address};

/// The ARP and DNS collaborator of the TCP layer.
pub trait Resolver {
    /// Start resolving the link address for `ip`.
    fn arp_resolve(&mut self, ip: Ipv4Address);

    /// Poll a previously started ARP resolution.
    fn arp_is_resolved(&mut self, ip: Ipv4Address) -> Option<EthernetAddress>;

    /// Try to acquire the DNS module.
    fn dns_begin_usage(&mut self) -> bool;

    /// Start resolving `host` to an IPv4 address.
    fn dns_resolve(&mut self, host: &str);

    /// Poll the running DNS query.
    fn dns_is_resolved(&mut self) -> Option<Ipv4Address>;

    /// Release the DNS module.
    ///
    /// Returns `false` if the query did not finish successfully, in which case the result of
    /// `dns_is_resolved` should not be trusted.
    fn dns_end_usage(&mut self) -> bool;
}

impl<T: Resolver + ?Sized> Resolver for &'_ mut T {
    fn arp_resolve(&mut self, ip: Ipv4Address) {
        (**self).arp_resolve(ip)
    }

    fn arp_is_resolved(&mut self, ip: Ipv4Address) -> Option<EthernetAddress> {
        (**self).arp_is_resolved(ip)
    }

    fn dns_begin_usage(&mut self) -> bool {
        (**self).dns_begin_usage()
    }

    fn dns_resolve(&mut self, host: &str) {
        (**self).dns_resolve(host)
    }

    fn dns_is_resolved(&mut self) -> Option<Ipv4Address> {
        (**self).dns_is_resolved()
    }

    fn dns_end_usage(&mut self) -> bool {
        (**self).dns_end_usage()
    }
}

/// A host name stored inline.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostName {
    bytes: [u8; HostName::MAX_LEN],
    len: u8,
}

impl HostName {
    /// The longest name that can be stored.
    pub const MAX_LEN: usize = 32;

    /// Store a name, or `None` if it is too long.
    pub fn new(name: &str) -> Option<Self> {
        if name.len() > Self::MAX_LEN {
            return None;
        }

        let mut bytes = [0; Self::MAX_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Some(HostName {
            bytes,
            len: name.len() as u8,
        })
    }

    /// The stored name.
    pub fn as_str(&self) -> &str {
        // Only ever constructed from a complete `str`.
        core::str::from_utf8(&self.bytes[..usize::from(self.len)]).unwrap_or("")
    }
}

impl fmt::Debug for HostName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolver answering from fixed tables.
///
/// Addresses not in the tables never resolve, which lets the ARP and DNS retry logic run.
pub struct StaticResolver<'a> {
    neighbors: &'a [(Ipv4Address, EthernetAddress)],
    hosts: &'a [(&'a str, Ipv4Address)],
    dns_in_use: bool,
    query: Option<Ipv4Address>,
}

impl<'a> StaticResolver<'a> {
    /// A resolver over a neighbor cache and a host table.
    pub fn new(
        neighbors: &'a [(Ipv4Address, EthernetAddress)],
        hosts: &'a [(&'a str, Ipv4Address)],
    ) -> Self {
        StaticResolver {
            neighbors,
            hosts,
            dns_in_use: false,
            query: None,
        }
    }

    /// Whether some socket holds the DNS module.
    pub fn dns_in_use(&self) -> bool {
        self.dns_in_use
    }
}

impl Resolver for StaticResolver<'_> {
    fn arp_resolve(&mut self, ip: Ipv4Address) {
        net_trace!("arp request for {}", ip);
    }

    fn arp_is_resolved(&mut self, ip: Ipv4Address) -> Option<EthernetAddress> {
        self.neighbors.iter()
            .find(|(addr, _)| *addr == ip)
            .map(|&(_, mac)| mac)
    }

    fn dns_begin_usage(&mut self) -> bool {
        if self.dns_in_use {
            return false;
        }
        self.dns_in_use = true;
        true
    }

    fn dns_resolve(&mut self, host: &str) {
        self.query = self.hosts.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(host))
            .map(|&(_, ip)| ip);
    }

    fn dns_is_resolved(&mut self) -> Option<Ipv4Address> {
        self.query
    }

    fn dns_end_usage(&mut self) -> bool {
        let ok = self.query.is_some();
        self.dns_in_use = false;
        self.query = None;
        ok
    }
}
