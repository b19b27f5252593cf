//! A software network interface over a plain byte buffer.
use crate::layer::{Error, Result};
use crate::storage::{Ram, Region};
use crate::wire::{Ipv4Address, NodeInfo};

use super::{Device, Incoming};

/// The size of one frame slot in interface memory.
pub const FRAME_SIZE: usize = 1536;

/// Number of received segments the device can hold.
pub const RX_SLOTS: usize = 4;

/// Where transmitted segments go.
pub trait Sink {
    /// Take one outgoing TCP segment from `local` to `remote`.
    fn transmit(&mut self, local: Ipv4Address, remote: &NodeInfo, segment: &[u8]);
}

impl<F> Sink for F where F: FnMut(Ipv4Address, &NodeInfo, &[u8]) {
    fn transmit(&mut self, local: Ipv4Address, remote: &NodeInfo, segment: &[u8]) {
        self(local, remote, segment)
    }
}

/// A software emulated interface.
///
/// The buffer is split into `RX_SLOTS` receive slots and one transmit slot, each `FRAME_SIZE`
/// bytes. Whatever remains after them is available for socket buffers through `socket_region`.
/// Received segments are queued with `deliver` and transmitted ones are handed to the `Sink`.
pub struct SoftDevice<'a, S> {
    ram: &'a mut [u8],
    addr: Ipv4Address,
    sink: S,
    link_up: bool,
    queue: [Option<Incoming>; RX_SLOTS],
    next: usize,
}

impl<'a, S: Sink> SoftDevice<'a, S> {
    /// Create a device with address `addr` over `ram`.
    ///
    /// # Panics
    /// This function panics if `ram` can not hold the frame slots.
    pub fn new(ram: &'a mut [u8], addr: Ipv4Address, sink: S) -> Self {
        assert!(ram.len() >= Self::FRAME_AREA, "Device memory must hold all frame slots");
        SoftDevice {
            ram,
            addr,
            sink,
            link_up: true,
            queue: [None; RX_SLOTS],
            next: 0,
        }
    }

    const FRAME_AREA: usize = (RX_SLOTS + 1) * FRAME_SIZE;

    /// The part of device memory not used for frames.
    pub fn socket_region(&self) -> Region {
        Region {
            base: Self::FRAME_AREA,
            len: self.ram.len() - Self::FRAME_AREA,
        }
    }

    /// Simulate plugging or unplugging the cable.
    pub fn set_link(&mut self, up: bool) {
        self.link_up = up;
    }

    /// The sink receiving transmitted segments.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Number of received segments not yet consumed.
    pub fn pending(&self) -> usize {
        self.queue.iter().filter(|slot| slot.is_some()).count()
    }

    /// Queue a TCP segment sent by `remote` to this device.
    pub fn deliver(&mut self, remote: NodeInfo, segment: &[u8]) -> Result<()> {
        if segment.len() > FRAME_SIZE {
            return Err(Error::BadSize);
        }

        // Slots are consumed in order, so the free ones follow all occupied ones.
        let pending = self.pending();
        if pending == RX_SLOTS {
            return Err(Error::Exhausted);
        }

        let slot = (self.next + pending) % RX_SLOTS;
        let at = slot * FRAME_SIZE;
        self.ram[at..at + segment.len()].copy_from_slice(segment);
        self.queue[slot] = Some(Incoming {
            remote,
            local: self.addr,
            at,
            len: segment.len(),
        });
        Ok(())
    }
}

impl<S> Ram for SoftDevice<'_, S> {
    fn read(&mut self, at: usize, buf: &mut [u8]) {
        self.ram.read(at, buf)
    }

    fn write(&mut self, at: usize, data: &[u8]) {
        self.ram.write(at, data)
    }

    fn move_within(&mut self, dst: usize, src: usize, len: usize) {
        self.ram.move_within(dst, src, len)
    }
}

impl<S: Sink> Device for SoftDevice<'_, S> {
    fn link_is_up(&self) -> bool {
        self.link_up
    }

    fn local_addr(&self) -> Ipv4Address {
        self.addr
    }

    fn is_tx_ready(&self) -> bool {
        self.link_up
    }

    fn tx_segment_at(&self) -> usize {
        RX_SLOTS * FRAME_SIZE
    }

    fn transmit(&mut self, remote: &NodeInfo, len: usize) -> Result<()> {
        if !self.link_up {
            return Err(Error::Unreachable);
        }

        if len > FRAME_SIZE {
            return Err(Error::BadSize);
        }

        let at = self.tx_segment_at();
        self.sink.transmit(self.addr, remote, &self.ram[at..at + len]);
        Ok(())
    }

    fn receive(&mut self) -> Option<Incoming> {
        self.queue[self.next]
    }

    fn discard_rx(&mut self) {
        if self.queue[self.next].take().is_some() {
            self.next = (self.next + 1) % RX_SLOTS;
        }
    }

    fn free_rx_size(&self) -> usize {
        (RX_SLOTS - self.pending()) * FRAME_SIZE
    }
}
