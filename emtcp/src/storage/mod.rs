//! Memory mediums backing the socket buffers, and the ways of moving bytes between them.
//!
//! A socket's transmit and receive rings may live in one of three memories: the local RAM of the
//! controller, the buffer RAM of the network interface, or an auxiliary serial RAM. The rest of
//! the crate never touches those memories directly. It addresses bytes through a [`Location`],
//! which is tagged with its [`Medium`] so that offsets from different memories can not be mixed,
//! and moves bytes with [`Memory::copy`], the single transport primitive that knows how to get
//! from any medium to any other.
//!
//! The [`Ring`] describes the geometry of one FIFO inside a medium and [`Hole`] tracks the one
//! out-of-order gap a receive ring can hold.
//!
//! [`Location`]: enum.Location.html
//! [`Medium`]: enum.Medium.html
//! [`Memory::copy`]: struct.Memory.html#method.copy
//! [`Ring`]: struct.Ring.html
//! [`Hole`]: struct.Hole.html
mod hole;
mod medium;
mod ring;

pub use self::hole::{Contig, Hole};
pub use self::medium::{Location, Medium, Memory, Ram, Region};
pub use self::ring::Ring;
