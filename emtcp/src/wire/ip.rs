use core::{fmt, str::FromStr};

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub doc enum Protocol(u8) {
        /// Internet control message protocol.
        Icmp = 0x01,
        /// Transmission control protocol.
        Tcp  = 0x06,
        /// User datagram protocol.
        Udp  = 0x11,
    }
}

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// The loopback address of this host.
    ///
    /// Segments claiming to come from it are never accepted from the network.
    pub const LOOPBACK: Address = Address([127, 0, 0, 1]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// The address as a `u32` in network byte order.
    pub fn to_network_integer(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// The two 16-bit halves of the address, high word first.
    pub fn words(self) -> (u16, u16) {
        let word = self.to_network_integer();
        ((word >> 16) as u16, word as u16)
    }

    /// Query whether the address is the host loopback address.
    pub fn is_loopback(&self) -> bool {
        *self == Self::LOOPBACK
    }
}

#[cfg(feature = "std")]
impl From<::std::net::Ipv4Addr> for Address {
    fn from(addr: ::std::net::Ipv4Addr) -> Address {
        Address(addr.octets())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

/// The error when parsing an address from its dotted decimal form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseAddressError;

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("expected four decimal octets separated by '.'")
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(src: &str) -> core::result::Result<Self, ParseAddressError> {
        let mut octets = [0; 4];
        let mut parts = src.split('.');
        for octet in octets.iter_mut() {
            *octet = parts.next()
                .and_then(|part| part.parse().ok())
                .ok_or(ParseAddressError)?;
        }

        if parts.next().is_some() {
            return Err(ParseAddressError);
        }
        Ok(Address(octets))
    }
}

/// RFC 1071 checksum arithmetic.
///
/// All sums are computed without the final complement so that partial sums over separate
/// regions, such as a pseudo header and a segment kept in interface memory, can be combined. A
/// region of odd length may only be the last one of a combined sum.
pub mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::*;

    fn fold(mut sum: u32) -> u16 {
        while sum > 0xffff {
            sum = (sum >> 16) + (sum & 0xffff);
        }
        sum as u16
    }

    /// One's complement sum of `data` as big endian words, an odd byte padded with zero.
    pub fn data(data: &[u8]) -> u16 {
        let mut words = data.chunks_exact(2);
        let mut sum: u32 = words.by_ref()
            .map(|word| u32::from(NetworkEndian::read_u16(word)))
            .fold(0, |sum, word| sum + word);
        if let [odd] = words.remainder() {
            sum += u32::from(*odd) << 8;
        }
        // At most 2^16 words fit before the sum needs folding, segments are far shorter.
        fold(sum)
    }

    /// Add up several partial sums.
    pub fn combine(checksums: &[u16]) -> u16 {
        fold(checksums.iter().map(|&sum| u32::from(sum)).sum())
    }

    /// The sum over the IPv4 pseudo header of a segment.
    pub fn pseudo_header(src_addr: &Address, dst_addr: &Address,
                         protocol: Protocol, length: u32) -> u16 {
        let mut header = [0u8; 12];
        header[..4].copy_from_slice(&src_addr.0);
        header[4..8].copy_from_slice(&dst_addr.0);
        header[9] = protocol.into();
        NetworkEndian::write_u16(&mut header[10..], length as u16);
        data(&header)
    }
}
