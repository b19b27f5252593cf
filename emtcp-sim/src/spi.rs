//! An emulated serial RAM chip.
use emtcp::storage::{Ram, Region};

/// A serial RAM that counts the bytes moved over its bus.
///
/// There is no copy engine, moves within the chip are staged through the controller like on a
/// real bus.
pub struct SerialRam {
    bytes: Vec<u8>,
    transferred: u64,
}

impl SerialRam {
    pub fn new(len: usize) -> Self {
        SerialRam {
            bytes: vec![0; len],
            transferred: 0,
        }
    }

    /// The whole chip as a window for socket buffers.
    pub fn region(&self) -> Region {
        Region { base: 0, len: self.bytes.len() }
    }

    /// Bytes read or written so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }
}

impl Ram for SerialRam {
    fn read(&mut self, at: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.bytes[at..at + buf.len()]);
        self.transferred += buf.len() as u64;
    }

    fn write(&mut self, at: usize, data: &[u8]) {
        self.bytes[at..at + data.len()].copy_from_slice(data);
        self.transferred += data.len() as u64;
    }
}
