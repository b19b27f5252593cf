//! The timer side of the state machine.
use crate::layer::resolve::Resolver;
use crate::nic::Device;
use crate::time::{Expiration, Instant};
use crate::wire::TcpFlags;

use super::connection::Connection;
use super::endpoint::Endpoint;
use super::retry::Retry;
use super::send::TimerMode;
use super::state::State;

impl<D: Device, R: Resolver> Endpoint<'_, D, R> {
    /// Advance the timers of all sockets.
    ///
    /// Sockets are visited in table order and each takes at most one action per call: sending
    /// due data or acknowledgements, retransmitting, or giving up on its connection.
    pub fn tick(&mut self, now: Instant) {
        self.now = now;
        for index in 0..self.slots.len() {
            self.tick_socket(index);
        }
    }

    fn tick_socket(&mut self, index: usize) {
        let now = self.now;
        let tx_ready = self.memory.device().is_tx_ready();
        let conn = &mut self.slots[index];

        match conn.state {
            State::Closed | State::Listen | State::Loopback | State::LoopbackClosed => return,
            _ => (),
        }

        let mut flags = None;
        let due = conn.markers.tx_asap
            || conn.auto_transmit.is_due(now)
            || conn.delayed_ack.is_due(now);
        if due && tx_ready {
            // A deferred SYN or RST goes out as it was meant to.
            flags = Some(if conn.deferred.is_empty() { TcpFlags::ACK } else { conn.deferred });
        }
        if conn.state == State::CloseWait && conn.close_wait.is_due(now) {
            net_debug!("tcp {}: application did not close, closing", index);
            conn.close_wait = Expiration::Never;
            conn.state = State::LastAck;
            flags = Some(TcpFlags::FIN | TcpFlags::ACK);
        }
        if let Some(flags) = flags {
            self.send_segment(index, flags, TimerMode::Reset);
        }

        let conn = &mut self.slots[index];
        if !conn.timer.is_armed() {
            if conn.state == State::Established && conn.keep_alive <= now {
                conn.keep_alive = now + self.config.keep_alive;
                self.send_segment(index, TcpFlags::ACK, TimerMode::KeepAlive);
            }
            return;
        }

        if conn.timer.is_due(now) {
            self.timeout(index);
        }
    }

    /// Act on an expired main timer.
    fn timeout(&mut self, index: usize) {
        let now = self.now;
        let max_retries = self.config.max_retries;
        let max_syn_retries = self.config.max_syn_retries;
        let conn = &mut self.slots[index];

        match conn.state {
            State::GetDnsModule => {
                if self.resolver.dns_begin_usage() {
                    conn.state = State::DnsResolve;
                    if let Some(host) = conn.host {
                        net_debug!("tcp {}: resolving {}", index, host);
                        self.resolver.dns_resolve(host.as_str());
                    }
                } else {
                    conn.timer = Expiration::When(now + self.config.dns_busy_retry);
                }
            },
            State::DnsResolve => {
                let ip = match self.resolver.dns_is_resolved() {
                    Some(ip) => ip,
                    None => return,
                };
                if self.resolver.dns_end_usage() {
                    conn.remote.ip = ip;
                    conn.hash = Connection::hash_of(&conn.remote, conn.remote_port, conn.local_port);
                    conn.retry = Retry::new(self.config.arp_retry_start);
                    conn.state = State::GatewaySendArp;
                } else {
                    conn.timer = Expiration::When(now + self.config.dns_busy_retry);
                    conn.state = State::GetDnsModule;
                }
            },
            State::GatewaySendArp => {
                conn.arp_started = now;
                self.resolver.arp_resolve(conn.remote.ip);
                conn.state = State::GatewayGetArp;
            },
            State::GatewayGetArp => match self.resolver.arp_is_resolved(conn.remote.ip) {
                Some(mac) => {
                    conn.remote.mac = mac;
                    conn.state = State::SynSent;
                    net_debug!("tcp {}: {} is at {}", index, conn.remote.ip, mac);
                    self.send_syn(index);
                },
                None => if now - conn.arp_started > conn.retry.interval() {
                    conn.retry.on_timeout_limited(self.config.arp_backoff_limit);
                    conn.state = State::GatewaySendArp;
                },
            },
            State::SynSent => if conn.retry.exhausted(max_syn_retries) {
                net_debug!("tcp {}: no answer to SYN", index);
                self.close_socket(index);
            } else {
                self.retransmit(index, TcpFlags::SYN);
            },
            State::SynReceived => if !conn.retry.exhausted(max_syn_retries) {
                self.retransmit(index, TcpFlags::SYN | TcpFlags::ACK);
            } else if conn.markers.server {
                self.abort(index);
            } else {
                self.send_segment(index, TcpFlags::SYN, TimerMode::Reset);
            },
            State::Established | State::CloseWait => if !conn.retry.exhausted(max_retries) {
                self.retransmit(index, TcpFlags::PSH | TcpFlags::ACK);
            } else {
                net_debug!("tcp {}: remote unresponsive, closing", index);
                conn.state = State::FinWait1;
                self.send_segment(index, TcpFlags::FIN | TcpFlags::ACK, TimerMode::Reset);
            },
            State::FinWait1 | State::LastAck => if !conn.retry.exhausted(max_retries) {
                self.retransmit(index, TcpFlags::FIN | TcpFlags::ACK);
            } else {
                self.abort(index);
            },
            // The FIN is repeated as long as it is unacknowledged.
            State::Closing => if !conn.retry.exhausted(max_retries) {
                self.retransmit(index, TcpFlags::ACK);
            } else {
                self.abort(index);
            },
            State::FinWait2 => self.abort(index),
            State::Closed | State::Listen | State::Loopback | State::LoopbackClosed => (),
        }
    }

    /// Send everything not yet acknowledged again.
    fn retransmit(&mut self, index: usize, flags: TcpFlags) {
        let conn = &mut self.slots[index];
        conn.retry.on_timeout();

        let in_flight = conn.in_flight();
        conn.send_next -= in_flight;
        if conn.markers.fin_sent {
            conn.send_next -= 1;
            conn.markers.fin_sent = false;
        }
        conn.unacked = conn.tx.tail();

        net_debug!("tcp {}: retransmission {} in {}", index, conn.retry.count(), conn.state);
        self.send_segment(index, flags, TimerMode::Keep);
    }

    /// Give up on the connection, telling the remote.
    pub(crate) fn abort(&mut self, index: usize) {
        net_debug!("tcp {}: aborting in {}", index, self.slots[index].state);
        self.send_segment(index, TcpFlags::RST | TcpFlags::ACK, TimerMode::Reset);
        self.close_socket(index);
    }
}
