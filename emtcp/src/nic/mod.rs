//! Encapsulates a network interface card.
//!
//! The TCP core does not own frames in local memory. A segment is parsed and assembled in place
//! in the buffer memory of the interface, which is why a [`Device`] is also a [`Ram`]. The
//! interface is responsible for the layers below TCP: it strips the link and IP headers on
//! receive and adds them on transmit.
//!
//! Also permits software emulation of one, see [`SoftDevice`].
//!
//! [`Device`]: trait.Device.html
//! [`Ram`]: ../storage/trait.Ram.html
//! [`SoftDevice`]: struct.SoftDevice.html
mod soft;

use crate::layer::Result;
use crate::storage::Ram;
use crate::wire::{checksum, Ipv4Address, NodeInfo};

pub use self::soft::{Sink, SoftDevice, FRAME_SIZE, RX_SLOTS};

/// A TCP segment waiting in interface memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Incoming {
    /// The sender of the segment, with the link address the frame came from.
    pub remote: NodeInfo,
    /// The destination address of the IP datagram.
    pub local: Ipv4Address,
    /// Offset of the TCP header in interface memory.
    pub at: usize,
    /// Length of the TCP segment, header included.
    pub len: usize,
}

/// A network interface with its own buffer memory.
pub trait Device: Ram {
    /// Whether the physical link is established.
    fn link_is_up(&self) -> bool;

    /// The IPv4 address configured on this interface.
    fn local_addr(&self) -> Ipv4Address;

    /// Whether a frame can be assembled in the transmit buffer right now.
    fn is_tx_ready(&self) -> bool;

    /// Offset in interface memory where an outgoing TCP header is assembled.
    ///
    /// The payload follows the header directly.
    fn tx_segment_at(&self) -> usize;

    /// Add the IP and link headers and send the `len` bytes of TCP segment.
    fn transmit(&mut self, remote: &NodeInfo, len: usize) -> Result<()>;

    /// The oldest received TCP segment, if any.
    ///
    /// The segment stays available until `discard_rx` is called.
    fn receive(&mut self) -> Option<Incoming>;

    /// Release the segment returned by the last `receive`.
    fn discard_rx(&mut self);

    /// Receive buffer space of the interface not occupied by frames.
    fn free_rx_size(&self) -> usize;

    /// RFC 1071 sum over `len` bytes of interface memory, without the final complement.
    ///
    /// Interfaces with a checksum engine should override this.
    fn checksum(&mut self, at: usize, len: usize) -> u16 {
        // Even sized so that only the final chunk can have an odd byte.
        const CHUNK: usize = 32;
        let mut buffer = [0u8; CHUNK];
        let mut sum = 0;
        let mut done = 0;
        while done < len {
            let count = CHUNK.min(len - done);
            self.read(at + done, &mut buffer[..count]);
            sum = checksum::combine(&[sum, checksum::data(&buffer[..count])]);
            done += count;
        }
        sum
    }
}

impl<T: Device + ?Sized> Device for &'_ mut T {
    fn link_is_up(&self) -> bool {
        (**self).link_is_up()
    }

    fn local_addr(&self) -> Ipv4Address {
        (**self).local_addr()
    }

    fn is_tx_ready(&self) -> bool {
        (**self).is_tx_ready()
    }

    fn tx_segment_at(&self) -> usize {
        (**self).tx_segment_at()
    }

    fn transmit(&mut self, remote: &NodeInfo, len: usize) -> Result<()> {
        (**self).transmit(remote, len)
    }

    fn receive(&mut self) -> Option<Incoming> {
        (**self).receive()
    }

    fn discard_rx(&mut self) {
        (**self).discard_rx()
    }

    fn free_rx_size(&self) -> usize {
        (**self).free_rx_size()
    }

    fn checksum(&mut self, at: usize, len: usize) -> u16 {
        (**self).checksum(at, len)
    }
}
