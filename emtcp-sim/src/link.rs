//! The wire between the two stacks.
//!
//! Each side owns the transmitting half of one direction. Segments that survive the loss model
//! wait in a queue until the main loop hands them to the device on the other side.
use std::collections::VecDeque;

use emtcp::nic::Sink;
use emtcp::wire::{tcp_packet, Ipv4Address, NodeInfo, TcpRepr, TcpSeqNumber};

use crate::loss::Loss;

/// Counters of one direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Segments put on the wire.
    pub segments: u32,
    /// Segments the loss model swallowed.
    pub dropped: u32,
    /// Segments covering only sequence space that was sent before, keep-alive probes included.
    pub retransmitted: u32,
    /// Payload bytes sent for the first time.
    pub payload: u64,
}

/// The transmitting half of one direction.
pub struct Wire {
    node: NodeInfo,
    loss: Loss,
    queue: VecDeque<Vec<u8>>,
    highest: Option<TcpSeqNumber>,
    stats: Stats,
}

impl Wire {
    /// The wire of `node`, the sender as seen by the other side.
    pub fn new(node: NodeInfo, loss: Loss) -> Self {
        Wire {
            node,
            loss,
            queue: VecDeque::new(),
            highest: None,
            stats: Stats::default(),
        }
    }

    pub fn node(&self) -> NodeInfo {
        self.node
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Take the oldest segment in flight.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.queue.pop_front()
    }

    fn account(&mut self, segment: &[u8]) {
        self.stats.segments += 1;

        let (repr, header_len) = match tcp_packet::new_checked(segment)
            .and_then(|packet| Ok((TcpRepr::parse(packet)?, usize::from(packet.header_len()))))
        {
            Ok(parsed) => parsed,
            Err(_) => return,
        };

        let payload = segment.len() - header_len;
        let len = payload + usize::from(repr.flags.syn()) + usize::from(repr.flags.fin());
        if len == 0 {
            return;
        }

        // A new connection starts over in sequence space.
        if repr.flags.syn() {
            self.highest = None;
        }

        let end = repr.seq_number + len;
        match self.highest {
            Some(highest) if end <= highest => self.stats.retransmitted += 1,
            _ => {
                self.highest = Some(end);
                self.stats.payload += payload as u64;
            },
        }
    }
}

impl Sink for Wire {
    fn transmit(&mut self, local: Ipv4Address, remote: &NodeInfo, segment: &[u8]) {
        self.account(segment);

        if self.loss.drops() {
            log::trace!("wire: lost segment {} -> {}, {} bytes", local, remote.ip, segment.len());
            self.stats.dropped += 1;
            return;
        }

        self.queue.push_back(segment.to_vec());
    }
}
