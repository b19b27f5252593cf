use crate::layer::{Error, Result, Status};
use crate::layer::resolve::Resolver;
use crate::nic::{Device, Incoming};
use crate::storage::{Location, Medium, Memory, Region, Ring};
use crate::time::Instant;
use crate::wire::{checksum, tcp_packet, IpProtocol, NodeInfo, TcpRepr};
use crate::wire::tcp::MAX_HEADER_LEN;

use super::config::{Config, Layout, SocketSpec};
use super::connection::Connection;
use super::siphash::IsnGenerator;
use super::state::State;

/// Refers to one socket of an [`Endpoint`].
///
/// Handles are plain indices into the socket table and stay valid for the lifetime of the
/// endpoint, across any number of connections made with the socket.
///
/// [`Endpoint`]: struct.Endpoint.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketHandle(pub(crate) usize);

/// The TCP layer of one network interface.
///
/// Owns the socket table and all memory the socket buffers live in. Incoming segments are
/// consumed with [`process`], timers are driven by [`tick`]. Both must be called regularly from
/// the main loop of the node, every other operation is a non-blocking call from an application.
///
/// Operations on a socket take the time of the last `process` or `tick` as the current time.
///
/// [`process`]: #method.process
/// [`tick`]: #method.tick
pub struct Endpoint<'a, D, R> {
    pub(crate) slots: &'a mut [Connection],
    pub(crate) memory: Memory<'a, D>,
    pub(crate) resolver: R,
    pub(crate) config: Config,
    pub(crate) isn: IsnGenerator,
    pub(crate) next_port: u16,
    pub(crate) now: Instant,
}

impl SocketHandle {
    /// The position of the socket in the table.
    pub fn index(self) -> usize {
        self.0
    }
}

impl<'a, D: Device, R: Resolver> Endpoint<'a, D, R> {
    /// Provision the socket table.
    ///
    /// Every socket of `specs` claims its buffers in its medium, in order. The local medium is
    /// the complete local pool of `memory`, the other mediums are restricted to the windows in
    /// `layout`. Fails with `Overcommitted` when a medium runs out and with `Exhausted` when
    /// `slots` is shorter than `specs`. Surplus slots are not used.
    pub fn new(
        slots: &'a mut [Connection],
        specs: &[SocketSpec],
        memory: Memory<'a, D>,
        layout: Layout,
        resolver: R,
        isn: IsnGenerator,
    ) -> Result<Self> {
        if slots.len() < specs.len() {
            return Err(Error::Exhausted);
        }

        let mut local = Region { base: 0, len: memory.local_len() };
        let mut device = layout.device;
        let mut spi = if memory.has_spi() { layout.spi } else { Region::default() };

        let slots = &mut slots[..specs.len()];
        for (slot, spec) in slots.iter_mut().zip(specs) {
            let region = match spec.medium {
                Medium::Local => &mut local,
                Medium::Device => &mut device,
                Medium::Spi => &mut spi,
            };
            let base = carve(region, spec.footprint())
                .ok_or(Error::Overcommitted(spec.medium))?;
            let tx = Ring::new(spec.medium, base, usize::from(spec.tx_size));
            let rx = Ring::new(spec.medium, base + tx.footprint(), usize::from(spec.rx_size));
            *slot = Connection::new(spec.purpose, tx, rx);
        }

        let config = Config::default();
        net_debug!("tcp: provisioned {} sockets", slots.len());
        Ok(Endpoint {
            slots,
            memory,
            resolver,
            next_port: *config.local_ports.start(),
            config,
            isn,
            now: Instant::from_millis(0),
        })
    }

    /// Replace the protocol parameters.
    pub fn with_config(mut self, config: Config) -> Self {
        self.next_port = *config.local_ports.start();
        self.config = config;
        self
    }

    /// The protocol parameters.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of sockets in the table.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no sockets at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Handles of all sockets, in table order.
    pub fn handles(&self) -> impl Iterator<Item=SocketHandle> {
        (0..self.slots.len()).map(SocketHandle)
    }

    /// Inspect the control block of a socket.
    ///
    /// # Panics
    /// This function panics if the handle does not belong to this endpoint.
    pub fn connection(&self, handle: SocketHandle) -> &Connection {
        &self.slots[handle.0]
    }

    /// The time of the last `process` or `tick`.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// The network interface.
    pub fn device(&self) -> &D {
        self.memory.device()
    }

    /// The network interface, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        self.memory.device_mut()
    }

    /// The memory of all mediums.
    pub fn memory_mut(&mut self) -> &mut Memory<'a, D> {
        &mut self.memory
    }

    /// The address resolution in use.
    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    /// Consume one received segment.
    ///
    /// Returns `NeedMoreData` if the interface holds no segment. Segments that fail the checksum,
    /// come from a loopback source or do not belong to any socket are dropped silently.
    pub fn process(&mut self, now: Instant) -> Status<()> {
        self.now = now;
        let incoming = match self.memory.device_mut().receive() {
            Some(incoming) => incoming,
            None => return Status::NeedMoreData,
        };

        self.dispatch(incoming);
        self.memory.device_mut().discard_rx();
        Status::Done(())
    }

    fn dispatch(&mut self, incoming: Incoming) {
        let Incoming { remote, local, at, len } = incoming;

        let sum = checksum::combine(&[
            checksum::pseudo_header(&remote.ip, &local, IpProtocol::Tcp, len as u32),
            self.memory.device_mut().checksum(at, len),
        ]);
        if sum != !0 {
            net_debug!("tcp: invalid checksum from {}", remote.ip);
            return;
        }

        if remote.ip.is_loopback() {
            net_debug!("tcp: dropped segment with loopback source");
            return;
        }

        let mut header = [0u8; MAX_HEADER_LEN];
        let header = &mut header[..len.min(MAX_HEADER_LEN)];
        self.memory.read(Location::Device(at), header);
        let (repr, header_len) = match tcp_packet::new_checked(header)
            .and_then(|packet| Ok((TcpRepr::parse(packet)?, usize::from(packet.header_len()))))
        {
            Ok(parsed) => parsed,
            Err(err) => {
                net_debug!("tcp: malformed segment from {}: {}", remote.ip, err);
                return;
            },
        };

        let index = match self.find_socket(&repr, &remote) {
            Some(index) => index,
            None => {
                net_trace!("tcp: no socket for {}", repr);
                return;
            },
        };

        net_trace!("tcp {}: rx {}", index, repr);
        let payload = Location::Device(at + header_len);
        self.segment(index, &repr, payload, len - header_len);
    }

    /// Find the socket a segment is addressed to.
    ///
    /// A connection matching the complete four-tuple wins. Otherwise the first socket listening on
    /// the destination port takes on the remote in place and is returned.
    pub(crate) fn find_socket(&mut self, repr: &TcpRepr, remote: &NodeInfo) -> Option<usize> {
        let hash = Connection::hash_of(remote, repr.src_port, repr.dst_port);
        let mut listener = None;

        for (index, conn) in self.slots.iter().enumerate() {
            match conn.state {
                State::Closed | State::Loopback | State::LoopbackClosed => continue,
                State::Listen => {
                    if listener.is_none() && conn.hash == repr.dst_port {
                        listener = Some(index);
                    }
                    continue;
                },
                _ if conn.hash != hash => continue,
                _ => (),
            }

            if conn.local_port == repr.dst_port
                && conn.remote_port == repr.src_port
                && conn.remote.ip == remote.ip
            {
                return Some(index);
            }
        }

        let index = listener?;
        let now = self.now;
        let conn = &mut self.slots[index];
        conn.hash = hash;
        conn.remote = *remote;
        conn.remote_port = repr.src_port;
        conn.local_port = repr.dst_port;
        conn.send_next = self.isn.get_isn(
            conn.local_port, remote.ip, conn.remote_port, conn.generation, now);
        conn.unacked = conn.tx.tail();
        Some(index)
    }

    /// Tear down the connection of a socket.
    ///
    /// A server socket returns to listening, a client socket becomes closed. The next connection
    /// starts from a new initial sequence number.
    pub(crate) fn close_socket(&mut self, index: usize) {
        let conn = &mut self.slots[index];
        net_debug!("tcp {}: closed in {}", index, conn.state);
        if conn.state == State::DnsResolve {
            self.resolver.dns_end_usage();
        }
        conn.reset();
    }
}

fn carve(region: &mut Region, len: usize) -> Option<usize> {
    if region.len < len {
        return None;
    }
    let base = region.base;
    region.base += len;
    region.len -= len;
    Some(base)
}
