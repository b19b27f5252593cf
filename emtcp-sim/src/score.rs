use core::fmt;

use emtcp::time::Duration;

use crate::link::Stats;

/// The result of one transfer.
#[derive(Clone, Copy, Debug)]
pub struct Score {
    /// The amount of data the server received and verified.
    pub(crate) data_len: u64,
    /// Simulated time from the established connection to the closed one.
    pub(crate) time: Duration,
    /// Segments sent by the client.
    pub(crate) client: Stats,
    /// Segments sent by the server.
    pub(crate) server: Stats,
    /// Bytes moved over the serial RAM bus of both nodes.
    pub(crate) spi_traffic: u64,
}

impl Score {
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn client(&self) -> Stats {
        self.client
    }

    pub fn server(&self) -> Stats {
        self.server
    }

    pub fn spi_traffic(&self) -> u64 {
        self.spi_traffic
    }

    fn total_kb(&self) -> u64 {
        self.data_len / 1024
    }

    fn effective_rate(&self) -> f32 {
        (self.data_len as f32) / self.elapsed_secs().max(0.001)
    }

    fn elapsed_secs(&self) -> f32 {
        self.time.as_millis() as f32 / 1000.0
    }

    fn loss_rate(stats: &Stats) -> f32 {
        if stats.segments == 0 {
            return 0.0;
        }
        (stats.dropped as f32) / (stats.segments as f32)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Loosely in the iperf style:
        //
        // ```text
        // [  3]  0.0- 1.0 sec   131 KBytes  1.05 Mbits/sec   0.000 ms    0/   91 (0%)
        // ```
        for (name, stats) in [("client", &self.client), ("server", &self.server)].iter() {
            writeln!(
                f,
                "[{name:>6}] {segments} segments\t{retransmitted} retransmitted\t\
                {dropped}/{segments} lost ({loss_percent:.1}%)",
                name = name,
                segments = stats.segments,
                retransmitted = stats.retransmitted,
                dropped = stats.dropped,
                loss_percent = Score::loss_rate(stats) * 100.0,
            )?;
        }

        if self.spi_traffic > 0 {
            writeln!(f, "[   spi] {} bytes over the bus", self.spi_traffic)?;
        }

        write!(
            f,
            "[  data] {begin:.1}-{end:.1} sec\t{total} KBytes\t{rate:.0} Byte/sec",
            // The clock starts with the established connection.
            begin = 0.0,
            end = self.elapsed_secs(),
            total = self.total_kb(),
            rate = self.effective_rate(),
        )
    }
}
