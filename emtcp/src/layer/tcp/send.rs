use crate::layer::resolve::Resolver;
use crate::nic::Device;
use crate::storage::Location;
use crate::time::Expiration;
use crate::wire::{checksum, tcp_packet, IpProtocol, TcpFlags, TcpRepr};
use crate::wire::tcp::HEADER_LEN;

use super::endpoint::Endpoint;

/// How a transmission treats the retransmission timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TimerMode {
    /// New data or control, the back-off starts over.
    Reset,
    /// A retransmission or an answer that keeps the back-off.
    Keep,
    /// A keep-alive probe repeating the last acknowledged byte.
    KeepAlive,
}

/// Bytes of the MSS option in a SYN.
const MSS_OPTION_LEN: usize = 4;

impl<D: Device, R: Resolver> Endpoint<'_, D, R> {
    /// Assemble and transmit one segment of a connection.
    ///
    /// The segment carries as much unsent data as the remote window and segment size allow,
    /// unless it is a SYN or RST. A FIN in `flags` is not sent directly but queued behind the
    /// data and sent once everything before it fits into one segment.
    pub(crate) fn send_segment(&mut self, index: usize, mut flags: TcpFlags, mode: TimerMode) {
        let now = self.now;
        let config = &self.config;
        let memory = &mut self.memory;
        let conn = &mut self.slots[index];

        if conn.state.is_loopback() {
            return;
        }

        let fin = flags.fin();
        if fin {
            conn.markers.tx_fin = true;
            flags.set_fin(false);
        }

        if !memory.device().is_tx_ready() {
            net_debug!("tcp {}: interface busy, deferring {}", index, flags);
            conn.markers.tx_asap = true;
            if flags.syn() || flags.rst() {
                conn.deferred = flags;
            }
            // Handshake and FIN stay under the retransmission timer and its retry cap.
            if flags.syn() || fin {
                if mode == TimerMode::Reset {
                    conn.retry.reset(config.start_timeout);
                }
                conn.timer = Expiration::When(now + conn.retry.interval());
            }
            return;
        }

        conn.auto_transmit = Expiration::Never;
        conn.delayed_ack = Expiration::Never;
        conn.markers.one_segment = false;
        conn.markers.tx_asap = false;
        conn.markers.half_full_flush = false;
        conn.deferred = TcpFlags::default();

        let at = memory.device().tx_segment_at();
        let max_seg_size = if flags.syn() {
            Some(config.max_segment_size.saturating_sub(MSS_OPTION_LEN as u16))
        } else {
            None
        };
        let header_len = HEADER_LEN + if flags.syn() { MSS_OPTION_LEN } else { 0 };
        let payload = Location::Device(at + header_len);

        let mut len = 0;
        if !flags.syn() && !flags.rst() {
            let unsent = conn.unsent();
            if unsent == 0 {
                if conn.markers.tx_fin && conn.remote_window != 0 {
                    flags.set_fin(true);
                }
            } else {
                let window = usize::from(conn.remote_window).saturating_sub(conn.in_flight());
                let mss = usize::from(match conn.remote_mss {
                    Some(remote) => remote.min(config.max_segment_size),
                    None => config.max_segment_size,
                });

                len = unsent.min(window);
                if len > mss {
                    len = mss;
                    conn.markers.tx_asap = true;
                }

                // Only once the remaining data fits this segment.
                if conn.markers.tx_fin && len != window && len != mss {
                    flags.set_fin(true);
                }

                conn.tx.copy_out(memory, conn.unacked, payload, len);
                conn.unacked = conn.tx.wrap_add(conn.unacked, len);
            }
        }

        if len > 0 || flags.syn() || flags.fin() {
            if mode == TimerMode::Reset {
                conn.retry.reset(config.start_timeout);
            }
            conn.timer = Expiration::When(now + conn.retry.interval());
        } else if mode == TimerMode::KeepAlive {
            // One already acknowledged byte, the remote answers with an ACK.
            conn.send_next -= 1;
            memory.write(payload, &[0]);
            len = 1;
        } else if conn.timer.is_armed() {
            if mode != TimerMode::Reset {
                conn.retry.on_stalled();
            }
            conn.timer = Expiration::When(now + conn.retry.interval());
        }

        let mut seq_number = conn.send_next;
        conn.send_next += len;
        if flags.syn() {
            if conn.markers.syn_sent {
                seq_number -= 1;
            } else {
                conn.send_next += 1;
                conn.markers.syn_sent = true;
            }
        }
        if flags.fin() {
            // A repeated FIN never follows data, `len` is zero.
            if conn.markers.fin_sent {
                seq_number -= 1;
            } else {
                conn.send_next += 1;
                conn.markers.fin_sent = true;
            }
        }

        let device_space = memory.device().free_rx_size()
            .saturating_sub(usize::from(config.rx_window_reserve));
        let window = conn.rx.free().min(device_space).min(usize::from(u16::max_value()));

        let repr = TcpRepr {
            src_port: conn.local_port,
            dst_port: conn.remote_port,
            flags,
            seq_number,
            ack_number: if flags.ack() { Some(conn.recv_next) } else { None },
            window_len: window as u16,
            max_seg_size,
        };

        let mut header = [0u8; HEADER_LEN + MSS_OPTION_LEN];
        let header = &mut header[..header_len];
        repr.emit(tcp_packet::new_unchecked_mut(header));
        memory.write(Location::Device(at), header);

        let segment_len = header_len + len;
        let local = memory.device().local_addr();
        let sum = checksum::combine(&[
            checksum::pseudo_header(&local, &conn.remote.ip, IpProtocol::Tcp, segment_len as u32),
            memory.device_mut().checksum(at, segment_len),
        ]);
        tcp_packet::new_unchecked_mut(header).set_checksum(!sum);
        memory.write(Location::Device(at), header);

        net_trace!("tcp {}: tx {} len={}", index, repr, len);
        if let Err(err) = memory.device_mut().transmit(&conn.remote, segment_len) {
            net_debug!("tcp {}: transmit failed: {}", index, err);
        }
    }
}
