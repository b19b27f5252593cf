//! Two emtcp nodes on a simulated link.
//!
//! The client resolves the server by name, connects, streams a payload and closes. The server
//! checks every byte against the expected pattern and closes its side once the client is done.
//! Both nodes run on software devices, time is simulated and advances by a fixed step per
//! iteration of the main loop.
pub mod config;
mod link;
mod loss;
mod pattern;
mod score;
mod spi;

use core::fmt;

use emtcp::layer::{self, Status};
use emtcp::layer::resolve::{HostName, StaticResolver};
use emtcp::layer::tcp::{Connection, Endpoint, IsnGenerator, Layout, Purpose, Remote, SocketSpec, State};
use emtcp::nic::{SoftDevice, FRAME_SIZE, RX_SLOTS};
use emtcp::storage::Memory;
use emtcp::time::{Duration, Instant};
use emtcp::wire::{EthernetAddress, Ipv4Address, NodeInfo};

pub use config::Config;
pub use link::{Stats, Wire};
pub use loss::Loss;
pub use score::Score;
pub use spi::SerialRam;

const CLIENT: NodeInfo = NodeInfo::new(
    Ipv4Address::new(10, 0, 0, 1),
    EthernetAddress([2, 0, 0, 0, 0, 1]));

const SERVER: NodeInfo = NodeInfo::new(
    Ipv4Address::new(10, 0, 0, 2),
    EthernetAddress([2, 0, 0, 0, 0, 2]));

const SERVER_NAME: &str = "server.sim";
const PORT: u16 = 5001;

/// Size of the chunks the applications read and write.
const CHUNK: usize = 512;

type SimEndpoint<'a> = Endpoint<'a, SoftDevice<'a, Wire>, StaticResolver<'a>>;

/// Why a transfer did not complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    /// The stacks could not be set up.
    Setup(layer::Error),
    /// The client gave up before the connection was established.
    Refused,
    /// The connection was closed before all data arrived.
    Reset {
        received: usize,
    },
    /// The server received a byte that does not match the pattern.
    Corrupt {
        offset: usize,
    },
    /// The simulated time ran out.
    Timeout {
        sent: usize,
        received: usize,
    },
}

/// The memory of one node.
struct Node {
    slots: [Connection; 1],
    local: Vec<u8>,
    device: Vec<u8>,
    spi: SerialRam,
}

impl Node {
    fn new(spec: &SocketSpec) -> Self {
        let footprint = spec.footprint();
        Node {
            slots: [Connection::default(); 1],
            local: vec![0; footprint],
            device: vec![0; (RX_SLOTS + 1) * FRAME_SIZE + footprint],
            spi: SerialRam::new(footprint),
        }
    }

    fn endpoint<'a>(
        &'a mut self,
        wire: Wire,
        specs: &[SocketSpec],
        resolver: StaticResolver<'a>,
        key: u64,
    ) -> Result<SimEndpoint<'a>, Failure> {
        let device = SoftDevice::new(&mut self.device, wire.node().ip, wire);
        let layout = Layout {
            device: device.socket_region(),
            spi: self.spi.region(),
        };
        let memory = Memory::new(&mut self.local, device)
            .with_spi(&mut self.spi);
        let isn = IsnGenerator::from_key(key, key.rotate_left(32));
        Ok(Endpoint::new(&mut self.slots, specs, memory, layout, resolver, isn)?)
    }
}

/// Run one transfer as configured.
pub fn run(config: &Config) -> Result<Score, Failure> {
    let client_specs = [SocketSpec::new(Purpose::DEFAULT, config.client_medium, config.tx_size, config.rx_size)];
    let server_specs = [SocketSpec::new(Purpose::DEFAULT, config.server_medium, config.tx_size, config.rx_size)];
    let neighbors = [(SERVER.ip, SERVER.mac)];
    let hosts = [(SERVER_NAME, SERVER.ip)];

    let loss = |seed: u64| Loss::uniform(config.loss, seed).with_burst(config.burst);

    let mut client_node = Node::new(&client_specs[0]);
    let mut server_node = Node::new(&server_specs[0]);
    let mut client = client_node.endpoint(
        Wire::new(CLIENT, loss(config.seed)),
        &client_specs,
        StaticResolver::new(&neighbors, &hosts),
        config.seed)?;
    let mut server = server_node.endpoint(
        Wire::new(SERVER, loss(config.seed.wrapping_add(1))),
        &server_specs,
        StaticResolver::new(&[], &[]),
        !config.seed)?;

    let listener = server.listen(PORT)?;
    let host = HostName::new(SERVER_NAME).ok_or(Failure::Setup(layer::Error::BadSize))?;
    let handle = client.connect(Remote::Host(host), PORT)?;
    log::debug!("sim: client connecting to {}:{}", SERVER_NAME, PORT);

    let step = Duration::from_millis(config.step_ms.max(1));
    let deadline = Instant::from_secs(config.timeout_secs as i64);
    let mut now = Instant::from_millis(0);
    let mut connected_at = None;
    let mut closing = false;
    let mut sent = 0;
    let mut received = 0;
    let mut chunk = [0u8; CHUNK];

    loop {
        if now > deadline {
            return Err(Failure::Timeout { sent, received });
        }

        client.tick(now);
        server.tick(now);
        exchange(&mut client, &mut server, now);

        // The client application.
        if !closing && client.was_reset(handle) {
            return Err(match connected_at {
                None => Failure::Refused,
                Some(_) => Failure::Reset { received },
            });
        }

        if client.is_connected(handle) {
            connected_at.get_or_insert(now);
            while sent < config.bytes {
                let len = (config.bytes - sent).min(CHUNK);
                pattern::init(&mut chunk[..len], sent);
                match client.put_array(handle, &chunk[..len]) {
                    Status::Done(written) => sent += written,
                    _ => break,
                }
            }

            if sent == config.bytes && client.tx_fifo_full(handle) == 0 {
                log::debug!("sim: all data acknowledged at {}, closing", now);
                client.disconnect(handle);
                closing = true;
            }
        }

        // The server application.
        while let Status::Done(len) = server.get_array(listener, &mut chunk) {
            if let Some(offset) = pattern::verify(&chunk[..len], received) {
                return Err(Failure::Corrupt { offset });
            }
            received += len;
        }

        if server.connection(listener).state() == State::CloseWait {
            server.disconnect(listener);
        }

        if closing
            && client.connection(handle).state() == State::Closed
            && server.connection(listener).state() == State::Listen
        {
            break;
        }

        now += step;
    }

    if received != config.bytes {
        return Err(Failure::Reset { received });
    }

    let time = now - connected_at.unwrap_or(now);
    let client_stats = client.device_mut().sink_mut().stats();
    let server_stats = server.device_mut().sink_mut().stats();
    drop(client);
    drop(server);

    Ok(Score {
        data_len: received as u64,
        time,
        client: client_stats,
        server: server_stats,
        spi_traffic: client_node.spi.transferred() + server_node.spi.transferred(),
    })
}

/// Deliver segments in both directions until both wires are empty.
fn exchange(client: &mut SimEndpoint, server: &mut SimEndpoint, now: Instant) {
    while forward(client, server, now) + forward(server, client, now) > 0 { }
}

fn forward(from: &mut SimEndpoint, to: &mut SimEndpoint, now: Instant) -> usize {
    let node = from.device_mut().sink_mut().node();
    let mut count = 0;
    while let Some(segment) = from.device_mut().sink_mut().pop() {
        count += 1;
        if let Err(err) = to.device_mut().deliver(node, &segment) {
            log::debug!("sim: {} could not take segment: {}", node.ip, err);
            continue;
        }
        while to.process(now).is_done() { }
    }
    count
}

impl From<layer::Error> for Failure {
    fn from(err: layer::Error) -> Self {
        Failure::Setup(err)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Failure::Setup(err) => write!(f, "Setup failed: {}", err),
            Failure::Refused => write!(f, "Connection was not established"),
            Failure::Reset { received } => write!(f, "Connection closed after {} bytes", received),
            Failure::Corrupt { offset } => write!(f, "Corrupt data at offset {}", offset),
            Failure::Timeout { sent, received } => write!(
                f,
                "Timed out with {} bytes sent and {} bytes received",
                sent,
                received,
            ),
        }
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod test {
    use super::*;
    use emtcp::storage::Medium;

    #[test]
    fn lossless_transfer() {
        let config = Config {
            bytes: 20_000,
            ..Config::default()
        };
        let score = run(&config).unwrap();
        assert_eq!(score.data_len(), 20_000);
        assert_eq!(score.client().dropped, 0);
        assert_eq!(score.client().payload, 20_000);
        assert_eq!(score.spi_traffic(), 0);
    }

    #[test]
    fn serial_ram_buffers() {
        let config = Config {
            bytes: 5000,
            client_medium: Medium::Spi,
            server_medium: Medium::Spi,
            ..Config::default()
        };
        let score = run(&config).unwrap();
        assert_eq!(score.data_len(), 5000);
        assert!(score.spi_traffic() >= 2 * 5000);
    }

    #[test]
    fn lossy_transfer() {
        let config = Config {
            bytes: 4096,
            loss: 0.02,
            seed: 3,
            ..Config::default()
        };
        let score = run(&config).unwrap();
        assert_eq!(score.data_len(), 4096);
    }

    #[test]
    fn dead_link() {
        let config = Config {
            bytes: 100,
            loss: 1.0,
            ..Config::default()
        };
        assert_eq!(run(&config).err(), Some(Failure::Refused));
    }
}
