//! The application side of the endpoint.
//!
//! All operations are non-blocking. A socket never reports an error for something the remote did,
//! the application observes the connection through `is_connected` and the amount of buffered
//! data instead and polls again from its main loop.
//!
//! Each operation takes a [`SocketHandle`] returned by `open` and panics if the handle was created
//! by another endpoint with more sockets.
//!
//! [`SocketHandle`]: struct.SocketHandle.html
use core::ops;

use crate::layer::{Error, Result, Status};
use crate::layer::resolve::Resolver;
use crate::nic::Device;
use crate::storage::Location;
use crate::time::Expiration;
use crate::wire::{Ipv4Address, NodeInfo, TcpFlags};

use super::config::{Purpose, Remote};
use super::connection::{Connection, Markers};
use super::endpoint::{Endpoint, SocketHandle};
use super::retry::Retry;
use super::send::TimerMode;
use super::state::State;

/// The remote end of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketInfo {
    /// Address of the remote node.
    pub remote: NodeInfo,
    /// Port on the remote node.
    pub remote_port: u16,
}

/// How `adjust_fifo_size` splits the buffer space of a socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FifoFlags(u8);

impl FifoFlags {
    /// Space beyond the minimums goes to the receive buffer.
    pub const GIVE_REST_TO_RX: FifoFlags = FifoFlags(0x01);
    /// Space beyond the minimums goes to the transmit buffer.
    pub const GIVE_REST_TO_TX: FifoFlags = FifoFlags(0x02);
    /// Keep the unread received data.
    pub const PRESERVE_RX: FifoFlags = FifoFlags(0x04);
    /// Keep the queued and unacknowledged outgoing data.
    pub const PRESERVE_TX: FifoFlags = FifoFlags(0x08);

    /// Whether all flags of `other` are set.
    pub fn contains(self, other: FifoFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for FifoFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        FifoFlags(self.0 | rhs.0)
    }
}

impl<D: Device, R: Resolver> Endpoint<'_, D, R> {
    /// Claim a closed socket of `purpose`.
    ///
    /// With `Remote::Server` the socket listens on local `port`. Otherwise it connects to `port`
    /// of the remote from the next ephemeral port. A resolved node is sent a SYN right away, an
    /// address or a host name is resolved by the following ticks first.
    ///
    /// Fails with `Exhausted` if no socket of the purpose is closed.
    pub fn open(&mut self, remote: Remote, port: u16, purpose: Purpose) -> Result<SocketHandle> {
        let index = self.slots.iter()
            .position(|conn| conn.state == State::Closed && conn.purpose == purpose)
            .ok_or(Error::Exhausted)?;

        let now = self.now;
        let local_port = match remote {
            Remote::Server => port,
            _ => self.next_local_port(),
        };

        let conn = &mut self.slots[index];
        conn.tx.clear();
        conn.rx.clear();
        conn.unacked = 0;
        conn.hole.clear();
        conn.markers = Markers::default();
        conn.deferred = TcpFlags::default();
        conn.host = None;
        conn.local_port = local_port;

        if let Remote::Server = remote {
            net_debug!("tcp {}: listening on {}", index, port);
            conn.markers.server = true;
            conn.hash = port;
            conn.state = State::Listen;
            return Ok(SocketHandle(index));
        }

        conn.remote_port = port;
        conn.timer = Expiration::When(now);
        match remote {
            Remote::Host(name) => {
                conn.host = Some(name);
                conn.state = State::GetDnsModule;
            },
            Remote::Ip(ip) => {
                conn.remote = NodeInfo { ip, ..NodeInfo::default() };
                conn.hash = Connection::hash_of(&conn.remote, port, local_port);
                conn.retry = Retry::new(self.config.arp_retry_start);
                conn.state = State::GatewaySendArp;
            },
            Remote::Node(node) => {
                conn.remote = node;
                conn.hash = Connection::hash_of(&node, port, local_port);
                conn.state = State::SynSent;
                self.send_syn(index);
            },
            Remote::Server => (),
        }

        net_debug!("tcp {}: opened from port {} to {:?}", index, local_port, remote);
        Ok(SocketHandle(index))
    }

    /// Open a server socket of the default purpose.
    pub fn listen(&mut self, port: u16) -> Result<SocketHandle> {
        self.open(Remote::Server, port, Purpose::DEFAULT)
    }

    /// Open a client socket of the default purpose.
    pub fn connect(&mut self, remote: impl Into<Remote>, port: u16) -> Result<SocketHandle> {
        self.open(remote.into(), port, Purpose::DEFAULT)
    }

    /// Send the first SYN of an active open.
    pub(crate) fn send_syn(&mut self, index: usize) {
        let now = self.now;
        let conn = &mut self.slots[index];
        conn.send_next = self.isn.get_isn(
            conn.local_port, conn.remote.ip, conn.remote_port, conn.generation, now);
        conn.unacked = conn.tx.tail();
        self.send_segment(index, TcpFlags::SYN, TimerMode::Reset);
    }

    fn next_local_port(&mut self) -> u16 {
        let range = &self.config.local_ports;
        let port = if range.contains(&self.next_port) {
            self.next_port
        } else {
            *range.start()
        };
        self.next_port = if port == *range.end() { *range.start() } else { port + 1 };
        port
    }

    /// Whether data can be exchanged with the remote.
    pub fn is_connected(&self, handle: SocketHandle) -> bool {
        match self.slots[handle.0].state {
            State::Established | State::Loopback => true,
            _ => false,
        }
    }

    /// Close our side of the connection.
    ///
    /// Unread data is discarded. A connection that is not fully open yet is aborted silently, an
    /// open one sends its FIN after the queued data. Calling this again on a closing connection
    /// resets it, which is the way to get rid of an unresponsive remote.
    pub fn disconnect(&mut self, handle: SocketHandle) {
        let index = handle.0;
        self.slots[index].rx.drain();

        match self.slots[index].state {
            State::Closed => (),
            State::Listen
            | State::GetDnsModule
            | State::DnsResolve
            | State::GatewaySendArp
            | State::GatewayGetArp
            | State::SynSent => self.close_socket(index),
            State::SynReceived | State::Established => {
                self.send_segment(index, TcpFlags::FIN | TcpFlags::ACK, TimerMode::Reset);
                self.slots[index].state = State::FinWait1;
            },
            State::CloseWait => {
                self.send_segment(index, TcpFlags::FIN | TcpFlags::ACK, TimerMode::Reset);
                self.slots[index].state = State::LastAck;
            },
            State::Loopback => self.slots[index].state = State::LoopbackClosed,
            State::FinWait1
            | State::FinWait2
            | State::Closing
            | State::LastAck
            | State::LoopbackClosed => {
                self.send_segment(index, TcpFlags::RST | TcpFlags::ACK, TimerMode::Keep);
                self.close_socket(index);
            },
        }
    }

    /// Send queued data now instead of waiting for more.
    pub fn flush(&mut self, handle: SocketHandle) {
        if self.slots[handle.0].unsent() > 0 {
            self.send_segment(handle.0, TcpFlags::PSH | TcpFlags::ACK, TimerMode::Reset);
        }
    }

    /// Bytes that can be queued for sending right now.
    pub fn is_put_ready(&self, handle: SocketHandle) -> usize {
        let conn = &self.slots[handle.0];
        if conn.state.accepts_data() {
            conn.tx.free()
        } else {
            0
        }
    }

    /// Queue one byte.
    pub fn put(&mut self, handle: SocketHandle, byte: u8) -> bool {
        self.put_array(handle, &[byte]).done() == Some(1)
    }

    /// Queue as much of `data` as fits.
    ///
    /// Returns `WouldBlock` if nothing fits. Queued data is sent once the buffer is filled, when
    /// it first crosses half full, or after the auto-transmit delay.
    pub fn put_array(&mut self, handle: SocketHandle, data: &[u8]) -> Status<usize> {
        let index = handle.0;
        let free = self.is_put_ready(handle);
        if free == 0 {
            self.flush(handle);
            return Status::WouldBlock;
        }

        let conn = &self.slots[index];
        if !conn.markers.half_full_flush && free <= conn.tx.footprint() / 2 {
            self.flush(handle);
            self.slots[index].markers.half_full_flush = true;
        }

        let len = free.min(data.len());
        let conn = &mut self.slots[index];
        let head = conn.tx.head();
        conn.tx.write(&mut self.memory, head, &data[..len]);
        conn.tx.advance_head(len);

        if free <= data.len() {
            self.flush(handle);
        } else if !conn.auto_transmit.is_armed() {
            conn.auto_transmit = Expiration::When(self.now + self.config.auto_transmit);
        }

        Status::Done(len)
    }

    /// Bytes received and not yet read.
    pub fn is_get_ready(&self, handle: SocketHandle) -> usize {
        let conn = &self.slots[handle.0];
        match conn.state {
            State::LoopbackClosed => 0,
            _ => conn.rx.used(),
        }
    }

    /// Read one byte.
    pub fn get(&mut self, handle: SocketHandle) -> Option<u8> {
        let mut byte = [0];
        self.get_array(handle, &mut byte).done().map(|_| byte[0])
    }

    /// Read received data into `buf`.
    ///
    /// Returns `NeedMoreData` if nothing has been received. Reading most of the buffered data
    /// announces the opened window right away.
    pub fn get_array(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Status<usize> {
        let ready = self.is_get_ready(handle);
        if ready == 0 {
            return Status::NeedMoreData;
        }

        let len = ready.min(buf.len());
        let conn = &mut self.slots[handle.0];
        let tail = conn.rx.tail();
        conn.rx.read(&mut self.memory, tail, &mut buf[..len]);
        conn.rx.advance_tail(len);

        if ready - len <= len {
            conn.markers.tx_asap = true;
        } else if !conn.auto_transmit.is_armed() {
            conn.auto_transmit = Expiration::When(self.now + self.config.auto_transmit);
        }

        Status::Done(len)
    }

    /// Drop all unread data and announce the window.
    pub fn discard(&mut self, handle: SocketHandle) {
        if self.is_get_ready(handle) == 0 {
            return;
        }
        self.slots[handle.0].rx.drain();
        self.send_segment(handle.0, TcpFlags::ACK, TimerMode::Reset);
    }

    /// Whether the socket was reset since the last call.
    pub fn was_reset(&mut self, handle: SocketHandle) -> bool {
        let markers = &mut self.slots[handle.0].markers;
        let reset = markers.socket_reset;
        markers.socket_reset = false;
        reset
    }

    /// The remote end, if the socket has one.
    pub fn remote_info(&self, handle: SocketHandle) -> Option<SocketInfo> {
        let conn = &self.slots[handle.0];
        match conn.state {
            State::Closed | State::Listen => None,
            _ => Some(SocketInfo {
                remote: conn.remote,
                remote_port: conn.remote_port,
            }),
        }
    }

    /// Free space of the receive buffer.
    pub fn rx_fifo_free(&self, handle: SocketHandle) -> usize {
        self.slots[handle.0].rx.free()
    }

    /// Bytes held by the transmit buffer, sent or not.
    pub fn tx_fifo_full(&self, handle: SocketHandle) -> usize {
        self.slots[handle.0].tx.used()
    }

    /// Search unread data for a byte.
    ///
    /// See `find_array` for the meaning of the arguments.
    pub fn find(
        &mut self,
        handle: SocketHandle,
        byte: u8,
        start: usize,
        search_len: usize,
        case_insensitive: bool,
    ) -> Option<usize> {
        self.find_array(handle, &[byte], start, search_len, case_insensitive)
    }

    /// Search unread data for a sequence of bytes.
    ///
    /// The search covers `search_len` bytes from offset `start` of the unread data, or all of it
    /// when `search_len` is zero. The match must lie within that range. Returns the offset of the
    /// first match relative to the first unread byte. A case insensitive search only folds ASCII
    /// letters.
    pub fn find_array(
        &mut self,
        handle: SocketHandle,
        pattern: &[u8],
        start: usize,
        search_len: usize,
        case_insensitive: bool,
    ) -> Option<usize> {
        let ready = self.is_get_ready(handle);
        let end = match search_len {
            0 => ready,
            len => start.saturating_add(len).min(ready),
        };
        if pattern.is_empty() || start >= end || end - start < pattern.len() {
            return None;
        }

        let memory = &mut self.memory;
        let rx = &self.slots[handle.0].rx;
        let same = |a: u8, b: u8| if case_insensitive { a.eq_ignore_ascii_case(&b) } else { a == b };
        (start..=end - pattern.len()).find(|&offset| {
            pattern.iter().enumerate().all(|(i, &expected)| {
                let at = rx.wrap_add(rx.tail(), offset + i);
                same(rx.byte_at(memory, at), expected)
            })
        })
    }

    /// Redistribute the buffer space of a socket between its transmit and receive buffer.
    ///
    /// Both buffers get at least their minimum. `flags` decide who gets the rest, and whether
    /// buffered data is kept. Buffers that are not preserved are emptied, out-of-order data is
    /// always dropped. Fails with `BadSize` if the minimums or the preserved data do not fit.
    pub fn adjust_fifo_size(
        &mut self,
        handle: SocketHandle,
        min_rx: usize,
        min_tx: usize,
        flags: FifoFlags,
    ) -> Result<()> {
        let memory = &mut self.memory;
        let conn = &mut self.slots[handle.0];

        let base = conn.tx.start();
        let capacity = conn.tx.capacity() + conn.rx.capacity();
        let rest = capacity.checked_sub(min_rx)
            .and_then(|rest| rest.checked_sub(min_tx))
            .ok_or(Error::BadSize)?;

        let to_rx = flags.contains(FifoFlags::GIVE_REST_TO_RX);
        let to_tx = flags.contains(FifoFlags::GIVE_REST_TO_TX);
        let (rx_size, tx_size) = match (to_rx, to_tx) {
            (true, false) => (min_rx + rest, min_tx),
            (false, true) => (min_rx, min_tx + rest),
            // Odd byte to the receive side.
            _ => (min_rx + rest - rest / 2, min_tx + rest / 2),
        };

        let keep_rx = flags.contains(FifoFlags::PRESERVE_RX);
        let keep_tx = flags.contains(FifoFlags::PRESERVE_TX);
        if (keep_rx && conn.rx.used() > rx_size) || (keep_tx && conn.tx.used() > tx_size) {
            return Err(Error::BadSize);
        }

        let (tx_used, in_flight) = if keep_tx {
            let in_flight = conn.in_flight();
            conn.tx.linearize(memory);
            (conn.tx.used(), in_flight)
        } else {
            (0, 0)
        };

        let rx_start = base + tx_size + 1;
        let rx_used = if keep_rx {
            conn.rx.linearize(memory);
            let used = conn.rx.used();
            memory.copy(Location::new(conn.rx.medium(), rx_start), conn.rx.location(0), used);
            used
        } else {
            0
        };

        conn.tx.relocate(base, tx_size);
        conn.tx.set_indices(0, tx_used);
        conn.unacked = in_flight;
        conn.rx.relocate(rx_start, rx_size);
        conn.rx.set_indices(0, rx_used);
        conn.hole.clear();

        net_debug!("tcp {}: buffers now tx {} rx {}", handle.0, tx_size, rx_size);
        Ok(())
    }

    /// Connect to a local server socket without the network.
    ///
    /// Claims the socket listening on `port`, which then appears connected to its application.
    /// The caller plays the remote side with `inject` and `steal`. Fails with `Unreachable` if
    /// nobody listens on the port.
    pub fn open_loopback(&mut self, port: u16) -> Result<SocketHandle> {
        let index = self.slots.iter()
            .position(|conn| conn.state == State::Listen && conn.local_port == port)
            .ok_or(Error::Unreachable)?;

        let conn = &mut self.slots[index];
        conn.tx.clear();
        conn.rx.clear();
        conn.unacked = 0;
        conn.hole.clear();
        conn.remote = NodeInfo { ip: Ipv4Address::LOOPBACK, ..NodeInfo::default() };
        conn.remote_port = 0;
        conn.timer = Expiration::Never;
        conn.state = State::Loopback;
        net_debug!("tcp {}: loopback on port {}", index, port);
        Ok(SocketHandle(index))
    }

    /// End a loopback connection.
    ///
    /// Returns `false` if the socket was not looped back.
    pub fn close_loopback(&mut self, handle: SocketHandle) -> bool {
        if !self.is_loopback(handle) {
            return false;
        }
        self.close_socket(handle.0);
        true
    }

    /// Whether the socket is connected to a local user.
    pub fn is_loopback(&self, handle: SocketHandle) -> bool {
        self.slots[handle.0].state.is_loopback()
    }

    /// Provide data to a loopback socket as if received.
    ///
    /// Returns how much of `data` fit.
    pub fn inject(&mut self, handle: SocketHandle, data: &[u8]) -> Result<usize> {
        if !self.is_loopback(handle) {
            return Err(Error::Illegal);
        }

        let conn = &mut self.slots[handle.0];
        let len = conn.rx.free().min(data.len());
        let head = conn.rx.head();
        conn.rx.write(&mut self.memory, head, &data[..len]);
        conn.rx.advance_head(len);
        Ok(len)
    }

    /// Take data sent by the application of a loopback socket.
    ///
    /// The data counts as acknowledged. Returns the number of bytes written to `buf`.
    pub fn steal(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize> {
        if !self.is_loopback(handle) {
            return Err(Error::Illegal);
        }

        let conn = &mut self.slots[handle.0];
        let len = conn.tx.used().min(buf.len());
        let tail = conn.tx.tail();
        conn.tx.read(&mut self.memory, tail, &mut buf[..len]);
        conn.tx.advance_tail(len);
        conn.unacked = conn.tx.tail();
        Ok(len)
    }
}
