//! The TCP layer.
//!
//! A small, allocation free TCP for a node with a single interface. All connection state lives in
//! a table of socket slots fixed at initialization, all socket buffers are rings placed in one of
//! three memories: local RAM, the buffer memory of the network interface or an external serial
//! RAM. Segment data is moved between them and the interface without intermediate copies.
//!
//! ## Structure
//!
//! The [`Endpoint`] owns the table and the memories. It is driven by two calls from the main loop
//! of the node:
//!
//! * [`process`] consumes one received segment from the interface, finds its socket and applies
//!   it to the state machine. Only a single segment is handled per call.
//! * [`tick`] advances the timers of every socket: delayed acknowledgements, automatic transmission
//!   of queued data, retransmission, keep-alive and the resolution of client remotes.
//!
//! Applications use the remaining, non-blocking methods of the endpoint on a [`SocketHandle`]. No
//! method waits for the network. Instead operations report a [`Status`] or the amount of buffered
//! data and the application tries again on a later iteration.
//!
//! [`Endpoint`]: struct.Endpoint.html
//! [`process`]: struct.Endpoint.html#method.process
//! [`tick`]: struct.Endpoint.html#method.tick
//! [`SocketHandle`]: struct.SocketHandle.html
//! [`Status`]: ../enum.Status.html
//!
//! ## Sockets
//!
//! Each slot is provisioned for a [`Purpose`] and `open` only claims a closed slot of the
//! requested purpose. Server slots are permanent: closing their connection returns them to
//! `Listen`, waiting for the next remote. A listening slot is claimed by the first SYN towards
//! its port and serves only that remote until it is closed again. Provision more slots for the
//! same port to accept concurrent connections.
//!
//! [`Purpose`]: struct.Purpose.html
//!
//! ## Deviations
//!
//! The implementation trades parts of RFC793 for code size and memory.
//!
//! * There is no congestion control, only the window of the remote limits the data in flight.
//! * Out-of-order data is stored, but only a single gap in front of it is remembered. Data
//!   arriving beyond a second gap is dropped and must be retransmitted by the remote.
//! * A retransmission repeats everything unacknowledged from the first unacknowledged byte.
//! * Urgent data is not supported, segments with the URG flag are acknowledged but ignored.
//! * A FIN is only accepted in order.
//!
//! Since RFC793 allows it, a socket waiting in `SynSent` ignores a RST and keeps retrying until
//! its SYN retries are used up. The application decides on its own when to give up.
mod config;
mod connection;
mod endpoint;
mod engine;
mod retry;
mod send;
mod siphash;
mod socket;
mod state;
mod tick;

#[cfg(test)]
mod tests;

pub use config::{
    Config,
    Layout,
    Purpose,
    Remote,
    SocketSpec};

pub use connection::Connection;

pub use endpoint::{
    Endpoint,
    SocketHandle};

pub use retry::Retry;

pub use socket::{
    FifoFlags,
    SocketInfo};

pub use state::State;

// publically exposed for initialization.
pub use siphash::IsnGenerator;
