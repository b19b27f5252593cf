use core::ops::RangeInclusive;

use crate::layer::resolve::HostName;
use crate::storage::{Medium, Region};
use crate::time::Duration;
use crate::wire::{Ipv4Address, NodeInfo};

/// Protocol parameters of an endpoint.
///
/// The defaults suit a small embedded node on a local network.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// Largest payload of an outgoing segment.
    ///
    /// Also advertised in the MSS option of our SYN, minus four bytes of slack.
    pub max_segment_size: u16,

    /// First retransmission timeout, doubled on every retry.
    pub start_timeout: Duration,

    /// Longest time a received segment may go unacknowledged.
    pub delayed_ack: Duration,

    /// Time to wait for the FIN of the other side once ours is acknowledged.
    pub fin_wait_2_timeout: Duration,

    /// Idle time of an established connection before a keep-alive is sent.
    pub keep_alive: Duration,

    /// Time the application has to close its side after the remote closed.
    pub close_wait_timeout: Duration,

    /// Longest time queued data or a window update waits before being sent.
    pub auto_transmit: Duration,

    /// Retransmissions of data and FIN before giving up.
    pub max_retries: u8,

    /// Retransmissions of a SYN before giving up.
    pub max_syn_retries: u8,

    /// First ARP retry interval.
    pub arp_retry_start: Duration,

    /// Number of doublings of the ARP retry interval, afterwards it stays constant.
    pub arp_backoff_limit: u8,

    /// Wait before trying again to acquire the busy DNS module.
    pub dns_busy_retry: Duration,

    /// The ephemeral ports handed to client sockets, in order.
    pub local_ports: RangeInclusive<u16>,

    /// Receive buffer space of the interface kept free of the advertised window.
    pub rx_window_reserve: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_segment_size: 1024,
            start_timeout: Duration::from_secs(1),
            delayed_ack: Duration::from_millis(100),
            fin_wait_2_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(5),
            close_wait_timeout: Duration::from_millis(200),
            auto_transmit: Duration::from_millis(40),
            max_retries: 5,
            max_syn_retries: 2,
            arp_retry_start: Duration::from_millis(250),
            arp_backoff_limit: 6,
            dns_busy_retry: Duration::from_secs(10),
            local_ports: 3000..=5000,
            rx_window_reserve: 64,
        }
    }
}

/// The class of application a socket is provisioned for.
///
/// `open` only hands out a socket whose purpose matches the request, which lets every service
/// reserve sockets with buffer sizes suited to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Purpose(pub u8);

impl Purpose {
    /// Sockets without a special use.
    pub const DEFAULT: Purpose = Purpose(0);
    /// Outgoing connections of generic client applications.
    pub const GENERIC_TCP_CLIENT: Purpose = Purpose(1);
    /// Listening sockets of generic server applications.
    pub const GENERIC_TCP_SERVER: Purpose = Purpose(2);
    /// The telnet server.
    pub const TELNET: Purpose = Purpose(3);
    /// The FTP control connection.
    pub const FTP_COMMAND: Purpose = Purpose(4);
    /// FTP data transfers.
    pub const FTP_DATA: Purpose = Purpose(5);
    /// Throughput test, sending side.
    pub const PERFORMANCE_TX: Purpose = Purpose(6);
    /// Throughput test, receiving side.
    pub const PERFORMANCE_RX: Purpose = Purpose(7);
    /// The serial port to TCP bridge.
    pub const UART_2_TCP_BRIDGE: Purpose = Purpose(8);
}

/// One entry of the static socket table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketSpec {
    /// What the socket is reserved for.
    pub purpose: Purpose,
    /// Where its buffers are placed.
    pub medium: Medium,
    /// Capacity of the transmit buffer.
    pub tx_size: u16,
    /// Capacity of the receive buffer.
    pub rx_size: u16,
}

impl SocketSpec {
    /// Describe a socket.
    pub const fn new(purpose: Purpose, medium: Medium, tx_size: u16, rx_size: u16) -> Self {
        SocketSpec { purpose, medium, tx_size, rx_size }
    }

    /// Bytes the socket occupies in its medium.
    pub fn footprint(&self) -> usize {
        usize::from(self.tx_size) + 1 + usize::from(self.rx_size) + 1
    }
}

/// The windows of the non-local mediums that may hold socket buffers.
///
/// The local medium is always the complete slice handed to the endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Socket memory inside the network interface.
    pub device: Region,
    /// Socket memory in the serial RAM.
    pub spi: Region,
}

/// The other end of a connection to open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Remote {
    /// Listen for a connection on the local port.
    Server,
    /// Connect to a host name, resolved through DNS and ARP first.
    Host(HostName),
    /// Connect to an address, its link address resolved through ARP first.
    Ip(Ipv4Address),
    /// Connect to a fully resolved node, the SYN is sent immediately.
    Node(NodeInfo),
}

impl From<NodeInfo> for Remote {
    fn from(node: NodeInfo) -> Self {
        Remote::Node(node)
    }
}

impl From<Ipv4Address> for Remote {
    fn from(ip: Ipv4Address) -> Self {
        Remote::Ip(ip)
    }
}

impl From<HostName> for Remote {
    fn from(name: HostName) -> Self {
        Remote::Host(name)
    }
}
