use crate::layer::resolve::HostName;
use crate::storage::{Hole, Medium, Ring};
use crate::time::{Duration, Expiration, Instant};
use crate::wire::{NodeInfo, TcpFlags, TcpSeqNumber};

use super::config::Purpose;
use super::retry::Retry;
use super::state::State;

/// The control block of one socket slot.
///
/// A slot is provisioned once for a purpose and keeps its buffers for its whole lifetime. Closing
/// a connection only resets the connection related parts, the slot is then free for the next
/// `open` of the same purpose.
#[derive(Clone, Copy, Debug)]
pub struct Connection {
    /// The current state of the state machine.
    pub(crate) state: State,

    /// Which `open` requests may claim this slot.
    pub(crate) purpose: Purpose,

    pub(crate) local_port: u16,

    pub(crate) remote_port: u16,

    /// Address of the remote, its link address is valid from `SynSent` on.
    pub(crate) remote: NodeInfo,

    /// The name to resolve for a client opened by host name.
    pub(crate) host: Option<HostName>,

    /// Quick filter for incoming segments.
    ///
    /// A listening socket stores its local port here, a connection the hash of its remote
    /// address and the port pair.
    pub(crate) hash: u16,

    /// Outgoing data, from `tail` to `unacked` sent and waiting for an acknowledgement.
    pub(crate) tx: Ring,

    /// Incoming data not yet read by the application.
    pub(crate) rx: Ring,

    /// Index in `tx` of the first byte not yet sent.
    pub(crate) unacked: usize,

    /// The next sequence number to send.
    ///
    /// In RFC793 this is referred to as `SND.NXT`. Once our FIN was sent it is counted here even
    /// while data before it is retransmitted.
    pub(crate) send_next: TcpSeqNumber,

    /// The next sequence number we expect.
    ///
    /// In RFC793 this is referred to as `RCV.NXT`.
    pub(crate) recv_next: TcpSeqNumber,

    /// The last window advertised by the remote.
    ///
    /// In RFC793 this is referred to as `SND.WND`.
    pub(crate) remote_window: u16,

    /// The segment size announced in the SYN of the remote.
    pub(crate) remote_mss: Option<u16>,

    pub(crate) retry: Retry,

    /// Retransmission timeout, or the next step of address resolution.
    pub(crate) timer: Expiration,

    /// Latest time to send queued data or a window update.
    pub(crate) auto_transmit: Expiration,

    /// Latest time to acknowledge received data.
    pub(crate) delayed_ack: Expiration,

    /// Latest time before our side closes after the remote did.
    pub(crate) close_wait: Expiration,

    /// Next keep-alive probe, only considered while `timer` is idle.
    pub(crate) keep_alive: Instant,

    /// When the last ARP request was issued.
    pub(crate) arp_started: Instant,

    /// The out-of-order block in `rx` beyond its head.
    pub(crate) hole: Hole,

    pub(crate) markers: Markers,

    /// Control flags of a segment the interface could not take yet.
    pub(crate) deferred: TcpFlags,

    /// Number of times the slot has been reset.
    pub(crate) generation: u32,
}

/// Boolean conditions of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct Markers {
    /// Opened passively, returns to `Listen` when closed.
    pub(crate) server: bool,
    /// Our SYN is counted in `send_next`.
    pub(crate) syn_sent: bool,
    /// Our FIN is counted in `send_next`.
    pub(crate) fin_sent: bool,
    /// The application closed its side, a FIN is owed after the data.
    pub(crate) tx_fin: bool,
    /// Transmit at the next tick without waiting for more data.
    pub(crate) tx_asap: bool,
    /// The transmit buffer crossed half full since the last transmission.
    pub(crate) half_full_flush: bool,
    /// A segment arrived since the last transmission, the next one must not be delayed further.
    pub(crate) one_segment: bool,
    /// The remote reset the connection, cleared when queried.
    pub(crate) socket_reset: bool,
}

impl Connection {
    /// An unprovisioned slot.
    pub(crate) fn unused() -> Self {
        Connection::new(Purpose::DEFAULT, Ring::new(Medium::Local, 0, 0), Ring::new(Medium::Local, 0, 0))
    }

    /// A closed slot with its buffers.
    pub(crate) fn new(purpose: Purpose, tx: Ring, rx: Ring) -> Self {
        Connection {
            state: State::Closed,
            purpose,
            local_port: 0,
            remote_port: 0,
            remote: NodeInfo::default(),
            host: None,
            hash: 0,
            tx,
            rx,
            unacked: 0,
            send_next: TcpSeqNumber::default(),
            recv_next: TcpSeqNumber::default(),
            remote_window: 1,
            remote_mss: None,
            retry: Retry::new(Duration::from_secs(1)),
            timer: Expiration::Never,
            auto_transmit: Expiration::Never,
            delayed_ack: Expiration::Never,
            close_wait: Expiration::Never,
            keep_alive: Instant::from_millis(0),
            arp_started: Instant::from_millis(0),
            hole: Hole::default(),
            markers: Markers::default(),
            deferred: TcpFlags::default(),
            generation: 0,
        }
    }

    /// The state of the connection.
    pub fn state(&self) -> State {
        self.state
    }

    /// The purpose the slot was provisioned for.
    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    /// Our port.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// The port of the remote.
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// The remote node, its link address only valid once resolved.
    pub fn remote(&self) -> NodeInfo {
        self.remote
    }

    /// The transmit buffer.
    pub fn tx(&self) -> &Ring {
        &self.tx
    }

    /// The receive buffer.
    pub fn rx(&self) -> &Ring {
        &self.rx
    }

    /// Index of the first unsent byte in the transmit buffer.
    pub fn unacked(&self) -> usize {
        self.unacked
    }

    /// The next sequence number to send.
    pub fn send_next(&self) -> TcpSeqNumber {
        self.send_next
    }

    /// The next sequence number expected from the remote.
    pub fn recv_next(&self) -> TcpSeqNumber {
        self.recv_next
    }

    /// The last window advertised by the remote.
    pub fn remote_window(&self) -> u16 {
        self.remote_window
    }

    /// The retransmission back-off.
    pub fn retry(&self) -> Retry {
        self.retry
    }

    /// The out-of-order data held beyond the receive head.
    pub fn hole(&self) -> Hole {
        self.hole
    }

    /// Bytes queued but never sent.
    pub fn unsent(&self) -> usize {
        self.tx.distance(self.unacked, self.tx.head())
    }

    /// Bytes sent and not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.tx.distance(self.tx.tail(), self.unacked)
    }

    /// The quick filter value of a connection.
    pub(crate) fn hash_of(remote: &NodeInfo, remote_port: u16, local_port: u16) -> u16 {
        let (high, low) = remote.ip.words();
        high.wrapping_add(low).wrapping_add(remote_port) ^ local_port
    }

    /// Forget the connection, keeping the provisioning.
    ///
    /// Buffers are emptied in place, a server socket goes back to listening on its port.
    pub(crate) fn reset(&mut self) {
        let server = self.markers.server;
        let generation = self.generation.wrapping_add(1);
        let local_port = self.local_port;

        self.tx.clear();
        self.rx.clear();
        self.unacked = 0;
        self.hole.clear();
        self.host = None;
        self.remote = NodeInfo::default();
        self.remote_port = 0;
        self.remote_window = 1;
        self.remote_mss = None;
        self.timer = Expiration::Never;
        self.auto_transmit = Expiration::Never;
        self.delayed_ack = Expiration::Never;
        self.close_wait = Expiration::Never;
        self.markers = Markers {
            server,
            socket_reset: true,
            ..Markers::default()
        };
        self.deferred = TcpFlags::default();
        self.generation = generation;

        if server {
            self.state = State::Listen;
            self.hash = local_port;
        } else {
            self.state = State::Closed;
            self.local_port = 0;
            self.hash = 0;
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Connection::unused()
    }
}
