//! The receive side of the state machine.
use crate::layer::resolve::Resolver;
use crate::nic::Device;
use crate::storage::Location;
use crate::time::Expiration;
use crate::wire::{TcpFlags, TcpRepr, TcpSeqNumber};

use super::endpoint::Endpoint;
use super::send::TimerMode;
use super::state::State;

impl<D: Device, R: Resolver> Endpoint<'_, D, R> {
    /// Apply one incoming segment to the connection at `index`.
    ///
    /// `payload` is where the `len` bytes of segment data start in interface memory.
    pub(crate) fn segment(&mut self, index: usize, repr: &TcpRepr, payload: Location, len: usize) {
        let now = self.now;
        let flags = repr.flags;
        let seq = repr.seq_number;

        self.slots[index].keep_alive = now + self.config.keep_alive;

        match self.slots[index].state {
            State::Listen => return self.segment_listen(index, repr),
            State::SynSent => return self.segment_syn_sent(index, repr),
            state if state.is_resolving() || state.is_loopback() => return,
            State::Closed => return,
            _ => (),
        }

        let seg_len = repr.sequence_len(len);
        let free = self.slots[index].rx.free();
        let missing = i64::from(seq.offset_from(self.slots[index].recv_next));
        if !is_acceptable(missing, seg_len, free) {
            net_trace!("tcp {}: unacceptable segment, seq={} len={}", index, seq, seg_len);
            if !flags.rst() {
                self.send_segment(index, TcpFlags::ACK, TimerMode::Reset);
            }
            return;
        }

        if flags.rst() || flags.syn() {
            net_debug!("tcp {}: reset by remote", index);
            return self.close_socket(index);
        }

        let ack = match repr.ack_number {
            Some(ack) => ack,
            None => return,
        };

        if self.slots[index].state == State::SynReceived {
            if ack != self.slots[index].send_next {
                return self.reset_at(index, ack);
            }
            net_debug!("tcp {}: established", index);
            self.slots[index].state = State::Established;
        }

        match self.slots[index].state {
            State::Established
            | State::FinWait1
            | State::FinWait2
            | State::CloseWait
            | State::Closing => (),
            State::LastAck => {
                if self.our_fin_acked(index, ack) {
                    self.close_socket(index);
                }
                return;
            },
            _ => return,
        }

        if ack.offset_from(self.slots[index].send_next) > 0 {
            // Acknowledges something never sent.
            self.send_segment(index, TcpFlags::ACK, TimerMode::Reset);
            return;
        }

        self.acknowledge(index, ack, repr.window_len);

        match self.slots[index].state {
            State::FinWait1 => if self.our_fin_acked(index, ack) {
                let conn = &mut self.slots[index];
                conn.timer = Expiration::When(now + self.config.fin_wait_2_timeout);
                conn.state = State::FinWait2;
            },
            State::FinWait2 => if !flags.fin() {
                // Still sending data after our FIN is through, close forcefully.
                self.slots[index].send_next = ack;
                self.send_segment(index, TcpFlags::RST | TcpFlags::ACK, TimerMode::Keep);
                return self.close_socket(index);
            },
            State::Closing => {
                if self.our_fin_acked(index, ack) {
                    self.close_socket(index);
                }
                return;
            },
            _ => (),
        }

        if flags.urg() {
            return;
        }

        match self.slots[index].state {
            State::CloseWait | State::Closing | State::LastAck => return,
            _ => (),
        }

        if len > 0 {
            self.receive_data(index, missing, payload, len);
        }

        if seg_len > 0 {
            let conn = &mut self.slots[index];
            // Nobody reads a closing socket, keep the window open for the FIN.
            if conn.state != State::Established {
                conn.rx.drain();
            }

            if conn.markers.one_segment {
                self.send_segment(index, TcpFlags::ACK, TimerMode::Reset);
            } else {
                conn.markers.one_segment = true;
                if !conn.delayed_ack.is_armed() {
                    conn.delayed_ack = Expiration::When(now + self.config.delayed_ack);
                }
            }
        }

        if flags.fin() {
            self.receive_fin(index, seq + seg_len, ack);
        }
    }

    fn segment_listen(&mut self, index: usize, repr: &TcpRepr) {
        if repr.flags.rst() {
            return self.close_socket(index);
        }

        if let Some(ack) = repr.ack_number {
            self.slots[index].send_next = ack;
            self.send_segment(index, TcpFlags::RST, TimerMode::Keep);
            return self.close_socket(index);
        }

        if !repr.flags.syn() {
            return self.close_socket(index);
        }

        let conn = &mut self.slots[index];
        conn.recv_next = repr.seq_number + 1;
        conn.remote_window = repr.window_len;
        conn.remote_mss = repr.max_seg_size;
        self.send_segment(index, TcpFlags::SYN | TcpFlags::ACK, TimerMode::Reset);
        net_debug!("tcp {}: connection request from {}:{}",
            index, self.slots[index].remote.ip, self.slots[index].remote_port);
        self.slots[index].state = State::SynReceived;
    }

    fn segment_syn_sent(&mut self, index: usize, repr: &TcpRepr) {
        // The application times out on its own, keep trying.
        if repr.flags.rst() {
            return;
        }

        if let Some(ack) = repr.ack_number {
            if ack != self.slots[index].send_next {
                return self.reset_at(index, ack);
            }
        }

        if !repr.flags.syn() {
            return;
        }

        let conn = &mut self.slots[index];
        conn.recv_next = repr.seq_number + 1;
        conn.remote_window = repr.window_len;
        conn.remote_mss = repr.max_seg_size;

        if repr.ack_number.is_some() {
            self.send_segment(index, TcpFlags::ACK, TimerMode::Reset);
            let conn = &mut self.slots[index];
            conn.state = State::Established;
            conn.timer = Expiration::Never;
            net_debug!("tcp {}: established", index);
        } else {
            // Simultaneous open.
            self.send_segment(index, TcpFlags::SYN | TcpFlags::ACK, TimerMode::Reset);
            self.slots[index].state = State::SynReceived;
        }
    }

    /// Send a RST with the sequence number the remote acknowledged, keeping our own.
    fn reset_at(&mut self, index: usize, ack: TcpSeqNumber) {
        let send_next = self.slots[index].send_next;
        self.slots[index].send_next = ack;
        self.send_segment(index, TcpFlags::RST, TimerMode::Reset);
        self.slots[index].send_next = send_next;
    }

    fn our_fin_acked(&self, index: usize, ack: TcpSeqNumber) -> bool {
        let conn = &self.slots[index];
        conn.markers.fin_sent && ack == conn.send_next
    }

    /// Release acknowledged data and take on the advertised window.
    fn acknowledge(&mut self, index: usize, ack: TcpSeqNumber, window: u16) {
        let now = self.now;
        let config = &self.config;
        let conn = &mut self.slots[index];

        let in_flight = conn.in_flight();
        let mut first_unacked = conn.send_next - in_flight;
        if conn.markers.fin_sent {
            first_unacked -= 1;
        }

        let acked = ack.offset_from(first_unacked);
        if acked > 0 {
            let acked = (acked as usize).min(in_flight);
            conn.markers.half_full_flush = false;
            conn.tx.advance_tail(acked);
            if conn.in_flight() > 0 {
                conn.retry.reset(config.start_timeout);
                conn.timer = Expiration::When(now + conn.retry.interval());
            }
        }

        if conn.tx.is_empty() {
            let fin_acked = conn.markers.fin_sent && ack == conn.send_next;
            if !conn.markers.tx_fin || fin_acked {
                conn.timer = Expiration::Never;
                conn.keep_alive = now + config.keep_alive;
                conn.markers.tx_fin = false;
            }
        }

        if conn.remote_window == 0 && window != 0 {
            conn.markers.tx_asap = true;
        }
        conn.remote_window = window;
    }

    /// Store segment data in the receive ring.
    ///
    /// `missing` is the distance of the segment from the next expected sequence number. Data
    /// ahead of it is kept behind a hole, data beyond the free space is cut off and must be
    /// retransmitted by the remote.
    fn receive_data(&mut self, index: usize, missing: i64, payload: Location, len: usize) {
        let memory = &mut self.memory;
        let conn = &mut self.slots[index];
        let free = conn.rx.free();

        if missing <= 0 {
            let skip = (-missing) as usize;
            let take = len.saturating_sub(skip).min(free);
            let head = conn.rx.head();
            conn.rx.copy_in(memory, head, payload.add(skip), take);
            conn.rx.advance_head(take);
            conn.recv_next += take;

            let joined = conn.hole.advance(take);
            if joined > 0 {
                net_trace!("tcp {}: hole closed, {} bytes joined", index, joined);
                conn.rx.advance_head(joined);
                conn.recv_next += joined;
            }
        } else {
            let offset = missing as usize;
            let take = len.min(free - offset);
            let at = conn.rx.wrap_add(conn.rx.head(), offset);
            conn.rx.copy_in(memory, at, payload, take);
            conn.hole.add_out_of_order(offset, take);
            net_trace!("tcp {}: out-of-order data at +{}", index, offset);
        }
    }

    /// Process a FIN ending at sequence number `end`.
    fn receive_fin(&mut self, index: usize, end: TcpSeqNumber, ack: TcpSeqNumber) {
        let now = self.now;
        // Only in order, the ring can not remember a FIN behind a hole.
        if self.slots[index].recv_next + 1 != end {
            return;
        }

        self.slots[index].recv_next += 1;
        match self.slots[index].state {
            State::SynReceived => {
                self.slots[index].state = State::LastAck;
                return self.send_segment(index, TcpFlags::FIN | TcpFlags::ACK, TimerMode::Reset);
            },
            State::Established => {
                net_debug!("tcp {}: closed by remote", index);
                let conn = &mut self.slots[index];
                conn.state = State::CloseWait;
                conn.close_wait = Expiration::When(now + self.config.close_wait_timeout);
            },
            State::FinWait1 => if self.our_fin_acked(index, ack) {
                self.send_segment(index, TcpFlags::ACK, TimerMode::Keep);
                return self.close_socket(index);
            } else {
                self.slots[index].state = State::Closing;
            },
            State::FinWait2 => {
                self.send_segment(index, TcpFlags::ACK, TimerMode::Keep);
                return self.close_socket(index);
            },
            _ => (),
        }

        self.send_segment(index, TcpFlags::ACK, TimerMode::Reset);
    }
}

/// The RFC793 acceptability test against the free space of the receive ring.
///
/// `missing` is the signed distance of the segment start from the next expected sequence number.
fn is_acceptable(missing: i64, seg_len: usize, free: usize) -> bool {
    let seg_len = seg_len as i64;
    let free = free as i64;
    if seg_len == 0 {
        missing == 0 || (missing >= 0 && missing < free)
    } else {
        free > 0 && missing < free && missing + seg_len > 0
    }
}

#[cfg(test)]
mod test {
    use super::is_acceptable;

    #[test]
    fn acceptability() {
        // Empty segments at the expected number, always.
        assert!(is_acceptable(0, 0, 0));
        assert!(is_acceptable(3, 0, 4));
        assert!(!is_acceptable(4, 0, 4));
        assert!(!is_acceptable(-1, 0, 4));

        // Data needs some overlap with the window.
        assert!(!is_acceptable(0, 10, 0));
        assert!(is_acceptable(-5, 10, 4));
        assert!(!is_acceptable(-10, 10, 4));
        assert!(is_acceptable(3, 10, 4));
        assert!(!is_acceptable(4, 10, 4));
    }
}
