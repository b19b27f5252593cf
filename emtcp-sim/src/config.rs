use structopt::StructOpt;

use emtcp::storage::Medium;

/// Command line of the simulation.
#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "emtcp-sim")]
pub struct Config {
    /// Number of bytes the client sends to the server.
    #[structopt(short = "n", long = "bytes", default_value = "65536")]
    pub bytes: usize,

    /// Probability that a segment is lost on the wire, between 0 and 1.
    #[structopt(long = "loss", default_value = "0")]
    pub loss: f64,

    /// Number of consecutive segments lost together.
    #[structopt(long = "burst", default_value = "1")]
    pub burst: u32,

    /// Seed of the loss model and the sequence number keys.
    #[structopt(long = "seed", default_value = "1")]
    pub seed: u64,

    /// Simulated milliseconds per iteration of the main loop.
    #[structopt(long = "step", default_value = "1")]
    pub step_ms: u64,

    /// Give up after this many simulated seconds.
    #[structopt(long = "timeout", default_value = "600")]
    pub timeout_secs: u64,

    /// Transmit buffer size of each socket.
    #[structopt(long = "tx-size", default_value = "2048")]
    pub tx_size: u16,

    /// Receive buffer size of each socket.
    #[structopt(long = "rx-size", default_value = "2048")]
    pub rx_size: u16,

    /// Buffer memory of the client socket: local, device or spi.
    #[structopt(long = "client-medium", default_value = "local", parse(try_from_str = "parse_medium"))]
    pub client_medium: Medium,

    /// Buffer memory of the server socket: local, device or spi.
    #[structopt(long = "server-medium", default_value = "device", parse(try_from_str = "parse_medium"))]
    pub server_medium: Medium,
}

impl Config {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bytes: 65536,
            loss: 0.0,
            burst: 1,
            seed: 1,
            step_ms: 1,
            timeout_secs: 600,
            tx_size: 2048,
            rx_size: 2048,
            client_medium: Medium::Local,
            server_medium: Medium::Device,
        }
    }
}

fn parse_medium(name: &str) -> Result<Medium, String> {
    match name {
        "local" => Ok(Medium::Local),
        "device" => Ok(Medium::Device),
        "spi" => Ok(Medium::Spi),
        other => Err(format!("unknown medium `{}`", other)),
    }
}
