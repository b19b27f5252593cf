/*! Low-level segment access and construction.

The `wire` module deals with the segment *representation*. It provides two levels of
functionality.

 * First, it provides functions to extract fields from sequences of octets, and to insert fields
   into sequences of octets. This happens in the lowercase structure [`tcp_packet`].
 * Second, it provides a compact, high-level representation of header data that can be created
   from parsing and emitted into a sequence of octets. This happens through [`TcpRepr`].

The TCP core never holds a whole segment in local memory. Payload bytes stay in the network
interface buffer and are moved with the transport primitive of the [`storage`] module, so the
representation here only ever covers a header and its options.

The `tcp_packet` structure guarantees that, if `tcp_packet::check_len()` returned `Ok(())`, then
no field accessor or setter method will panic. `TcpRepr::parse()` never panics and
`TcpRepr::emit()` never panics as long as the buffer is at least `TcpRepr::header_len()` octets
long.

[`tcp_packet`]: struct.tcp_packet.html
[`TcpRepr`]: struct.TcpRepr.html
[`storage`]: ../storage/index.html
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to `ethernet.rs`, `ip.rs` and `tcp.rs` in this folder.
#![allow(missing_docs)]

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod error;
pub mod ethernet;
pub mod ip;
pub mod tcp;

pub use self::error::{Error, Result};

pub use self::ethernet::Address as EthernetAddress;

pub use self::ip::{
    checksum,
    Address as Ipv4Address,
    Protocol as IpProtocol};

pub use self::tcp::{
    tcp_packet,
    Flags as TcpFlags,
    Repr as TcpRepr,
    SeqNumber as TcpSeqNumber,
    TcpOption};

/// The network and link layer address of a remote node.
///
/// This is what an ARP resolution produces and what the IP layer needs to address a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeInfo {
    /// The IPv4 address of the node.
    pub ip: Ipv4Address,
    /// The link layer address of the node, or of the gateway towards it.
    pub mac: EthernetAddress,
}

impl NodeInfo {
    pub const fn new(ip: Ipv4Address, mac: EthernetAddress) -> Self {
        NodeInfo { ip, mac }
    }
}
