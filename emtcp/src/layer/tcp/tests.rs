//! Tcp layer tests.
//!
//! The endpoint under test runs on a `SoftDevice` whose transmitted segments are captured. The
//! remote side is either scripted segment by segment or a second endpoint, with segments shuttled
//! between the two devices by hand.
use crate::layer::Status;
use crate::layer::resolve::{HostName, StaticResolver};
use crate::nic::{Sink, SoftDevice, FRAME_SIZE};
use crate::storage::{Medium, Memory, Region};
use crate::time::{Duration, Instant};
use crate::wire::{checksum, tcp_packet, EthernetAddress, IpProtocol, Ipv4Address, NodeInfo};
use crate::wire::{TcpFlags, TcpRepr, TcpSeqNumber};

use super::*;

const LOCAL_IP: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);
const LOCAL: NodeInfo = NodeInfo::new(LOCAL_IP, EthernetAddress([2, 0, 0, 0, 0, 1]));
const PEER_IP: Ipv4Address = Ipv4Address::new(10, 0, 0, 2);
const PEER: NodeInfo = NodeInfo::new(PEER_IP, EthernetAddress([2, 0, 0, 0, 0, 2]));

const SERVER_PORT: u16 = 80;
const PEER_PORT: u16 = 4242;
const PEER_ISN: i32 = 5000;

const NEIGHBORS: [(Ipv4Address, EthernetAddress); 1] = [(PEER_IP, EthernetAddress([2, 0, 0, 0, 0, 2]))];

#[derive(Default)]
struct Capture {
    sent: Vec<Vec<u8>>,
}

impl Sink for Capture {
    fn transmit(&mut self, _: Ipv4Address, _: &NodeInfo, segment: &[u8]) {
        self.sent.push(segment.to_vec());
    }
}

type TestEndpoint<'a> = Endpoint<'a, SoftDevice<'a, Capture>, StaticResolver<'a>>;

struct Buffers {
    slots: [Connection; 4],
    local: [u8; 1024],
    device: Vec<u8>,
}

impl Buffers {
    fn new() -> Self {
        Buffers {
            slots: [Connection::default(); 4],
            local: [0; 1024],
            device: vec![0; 8 * FRAME_SIZE],
        }
    }

    fn endpoint<'a>(
        &'a mut self,
        addr: Ipv4Address,
        specs: &[SocketSpec],
        resolver: StaticResolver<'a>,
    ) -> TestEndpoint<'a> {
        let device = SoftDevice::new(&mut self.device, addr, Capture::default());
        let layout = Layout { device: device.socket_region(), spi: Region::default() };
        let memory = Memory::new(&mut self.local, device);
        Endpoint::new(&mut self.slots, specs, memory, layout, resolver, IsnGenerator::from_key(7, 11))
            .expect("Sockets fit into memory")
    }
}

fn socket(medium: Medium) -> SocketSpec {
    SocketSpec::new(Purpose::DEFAULT, medium, 64, 64)
}

fn at(millis: i64) -> Instant {
    Instant::from_millis(millis)
}

fn peer_repr(dst_port: u16, flags: TcpFlags, seq: i32, ack: Option<TcpSeqNumber>) -> TcpRepr {
    TcpRepr {
        src_port: PEER_PORT,
        dst_port,
        flags,
        seq_number: TcpSeqNumber(seq),
        ack_number: ack,
        window_len: 1024,
        max_seg_size: None,
    }
}

/// Assemble a complete segment as sent from `src` to `dst`.
fn build(src: Ipv4Address, dst: Ipv4Address, repr: TcpRepr, payload: &[u8]) -> Vec<u8> {
    let header_len = repr.header_len();
    let mut bytes = vec![0; header_len + payload.len()];
    repr.emit(tcp_packet::new_unchecked_mut(&mut bytes));
    bytes[header_len..].copy_from_slice(payload);
    let sum = checksum::combine(&[
        checksum::pseudo_header(&src, &dst, IpProtocol::Tcp, bytes.len() as u32),
        checksum::data(&bytes),
    ]);
    tcp_packet::new_unchecked_mut(&mut bytes).set_checksum(!sum);
    bytes
}

/// Deliver a segment from the scripted peer and process it.
fn receive(endpoint: &mut TestEndpoint, now: Instant, repr: TcpRepr, payload: &[u8]) {
    let bytes = build(PEER_IP, LOCAL_IP, repr, payload);
    endpoint.device_mut().deliver(PEER, &bytes).unwrap();
    assert_eq!(endpoint.process(now), Status::Done(()));
}

/// Take all segments transmitted since the last call.
fn sent(endpoint: &mut TestEndpoint) -> Vec<(TcpRepr, Vec<u8>)> {
    endpoint.device_mut().sink_mut().sent.drain(..).map(|bytes| {
        let packet = tcp_packet::new_checked(&bytes).unwrap();
        let repr = TcpRepr::parse(packet).unwrap();
        let payload = bytes[usize::from(packet.header_len())..].to_vec();
        (repr, payload)
    }).collect()
}

fn single(endpoint: &mut TestEndpoint) -> (TcpRepr, Vec<u8>) {
    let mut segments = sent(endpoint);
    assert_eq!(segments.len(), 1, "Expected exactly one segment");
    segments.remove(0)
}

/// Move every transmitted segment of `from` to `to` and process it there.
fn shuttle(from: &mut TestEndpoint, from_node: NodeInfo, to: &mut TestEndpoint, now: Instant) -> usize {
    let segments: Vec<_> = from.device_mut().sink_mut().sent.drain(..).collect();
    for bytes in &segments {
        to.device_mut().deliver(from_node, bytes).unwrap();
        assert_eq!(to.process(now), Status::Done(()));
    }
    segments.len()
}

fn pump(a: &mut TestEndpoint, a_node: NodeInfo, b: &mut TestEndpoint, b_node: NodeInfo, now: Instant) {
    while shuttle(a, a_node, b, now) + shuttle(b, b_node, a, now) > 0 { }
}

/// Accept a connection on a listening server, returns our initial sequence number.
fn accept(endpoint: &mut TestEndpoint, handle: SocketHandle) -> TcpSeqNumber {
    receive(endpoint, at(0), peer_repr(SERVER_PORT, TcpFlags::SYN, PEER_ISN, None), &[]);
    let (syn_ack, _) = single(endpoint);
    assert_eq!(syn_ack.flags, TcpFlags::SYN | TcpFlags::ACK);
    assert_eq!(syn_ack.ack_number, Some(TcpSeqNumber(PEER_ISN + 1)));
    assert_eq!(syn_ack.max_seg_size, Some(1020));
    assert_eq!(endpoint.connection(handle).state(), State::SynReceived);

    let isn = syn_ack.seq_number;
    receive(endpoint, at(1), peer_repr(SERVER_PORT, TcpFlags::ACK, PEER_ISN + 1, Some(isn + 1)), &[]);
    assert!(endpoint.is_connected(handle));
    assert!(sent(endpoint).is_empty());
    isn
}

#[test]
fn provisioning() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local), socket(Medium::Device)];
    let endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));
    assert_eq!(endpoint.len(), 2);

    let local = endpoint.connection(SocketHandle(0));
    assert_eq!(local.tx().medium(), Medium::Local);
    assert_eq!(local.rx().start(), 65);
    let device = endpoint.connection(SocketHandle(1));
    assert_eq!(device.tx().medium(), Medium::Device);
    assert_eq!(device.tx().start(), endpoint.device().socket_region().base);
    assert_eq!(device.state(), State::Closed);
}

#[test]
fn provisioning_overcommit() {
    let mut slots = [Connection::default(); 2];
    let mut local = [0u8; 100];
    let mut ram = vec![0u8; 8 * FRAME_SIZE];
    let device = SoftDevice::new(&mut ram, LOCAL_IP, Capture::default());
    let specs = [socket(Medium::Local)];
    let result = Endpoint::new(
        &mut slots,
        &specs,
        Memory::new(&mut local, device),
        Layout::default(),
        StaticResolver::new(&[], &[]),
        IsnGenerator::from_key(0, 0));
    assert_eq!(result.err(), Some(crate::layer::Error::Overcommitted(Medium::Local)));
}

#[test]
fn server_data_and_remote_close() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Device)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    assert_eq!(endpoint.connection(handle).state(), State::Listen);
    let isn = accept(&mut endpoint, handle);
    assert_eq!(endpoint.remote_info(handle), Some(SocketInfo { remote: PEER, remote_port: PEER_PORT }));

    receive(&mut endpoint, at(2),
        peer_repr(SERVER_PORT, TcpFlags::PSH | TcpFlags::ACK, PEER_ISN + 1, Some(isn + 1)),
        b"hello");
    // The acknowledgement is delayed.
    assert!(sent(&mut endpoint).is_empty());
    assert_eq!(endpoint.is_get_ready(handle), 5);
    assert_eq!(endpoint.find(handle, b'L', 0, 0, true), Some(2));
    assert_eq!(endpoint.find(handle, b'L', 0, 0, false), None);

    let mut buf = [0; 16];
    assert_eq!(endpoint.get_array(handle, &mut buf), Status::Done(5));
    assert_eq!(&buf[..5], b"hello");
    assert_eq!(endpoint.get_array(handle, &mut buf), Status::NeedMoreData);

    // Reading everything announces the window on the next tick.
    endpoint.tick(at(3));
    let (ack, _) = single(&mut endpoint);
    assert_eq!(ack.flags, TcpFlags::ACK);
    assert_eq!(ack.ack_number, Some(TcpSeqNumber(PEER_ISN + 6)));
    assert_eq!(ack.window_len, 64);

    receive(&mut endpoint, at(4),
        peer_repr(SERVER_PORT, TcpFlags::FIN | TcpFlags::ACK, PEER_ISN + 6, Some(isn + 1)),
        &[]);
    assert_eq!(endpoint.connection(handle).state(), State::CloseWait);
    let (ack, _) = single(&mut endpoint);
    assert_eq!(ack.ack_number, Some(TcpSeqNumber(PEER_ISN + 7)));

    endpoint.disconnect(handle);
    let (fin, _) = single(&mut endpoint);
    assert_eq!(fin.flags, TcpFlags::FIN | TcpFlags::ACK);
    assert_eq!(fin.seq_number, isn + 1);
    assert_eq!(endpoint.connection(handle).state(), State::LastAck);

    receive(&mut endpoint, at(5),
        peer_repr(SERVER_PORT, TcpFlags::ACK, PEER_ISN + 7, Some(isn + 2)),
        &[]);
    // Server sockets return to listening.
    assert_eq!(endpoint.connection(handle).state(), State::Listen);
    assert!(endpoint.was_reset(handle));
    assert!(!endpoint.was_reset(handle));
}

#[test]
fn close_wait_times_out() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let isn = accept(&mut endpoint, handle);
    receive(&mut endpoint, at(10),
        peer_repr(SERVER_PORT, TcpFlags::FIN | TcpFlags::ACK, PEER_ISN + 1, Some(isn + 1)),
        &[]);
    sent(&mut endpoint);

    endpoint.tick(at(100));
    assert!(sent(&mut endpoint).is_empty());

    // The application never closed its side.
    endpoint.tick(at(210));
    let (fin, _) = single(&mut endpoint);
    assert!(fin.flags.fin());
    assert_eq!(endpoint.connection(handle).state(), State::LastAck);
}

#[test]
fn teardown_after_fin_wait_2() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let isn = accept(&mut endpoint, handle);

    endpoint.disconnect(handle);
    let (fin, _) = single(&mut endpoint);
    assert_eq!(fin.flags, TcpFlags::FIN | TcpFlags::ACK);
    assert_eq!(endpoint.connection(handle).state(), State::FinWait1);
    assert_eq!(endpoint.connection(handle).send_next(), isn + 2);

    receive(&mut endpoint, at(10),
        peer_repr(SERVER_PORT, TcpFlags::ACK, PEER_ISN + 1, Some(isn + 2)),
        &[]);
    assert_eq!(endpoint.connection(handle).state(), State::FinWait2);
    assert!(sent(&mut endpoint).is_empty());

    receive(&mut endpoint, at(20),
        peer_repr(SERVER_PORT, TcpFlags::FIN | TcpFlags::ACK, PEER_ISN + 1, Some(isn + 2)),
        &[]);
    let (ack, _) = single(&mut endpoint);
    assert_eq!(ack.flags, TcpFlags::ACK);
    assert_eq!(ack.ack_number, Some(TcpSeqNumber(PEER_ISN + 2)));
    assert_eq!(endpoint.connection(handle).state(), State::Listen);
}

#[test]
fn fin_wait_2_times_out() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let isn = accept(&mut endpoint, handle);
    endpoint.disconnect(handle);
    receive(&mut endpoint, at(10),
        peer_repr(SERVER_PORT, TcpFlags::ACK, PEER_ISN + 1, Some(isn + 2)),
        &[]);
    sent(&mut endpoint);

    endpoint.tick(at(5010));
    let (rst, _) = single(&mut endpoint);
    assert!(rst.flags.rst());
    assert_eq!(endpoint.connection(handle).state(), State::Listen);
}

#[test]
fn hole_closes_exactly() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let isn = accept(&mut endpoint, handle);
    let flags = TcpFlags::PSH | TcpFlags::ACK;

    receive(&mut endpoint, at(10),
        peer_repr(SERVER_PORT, flags, PEER_ISN + 6, Some(isn + 1)),
        b"world");
    assert_eq!(endpoint.is_get_ready(handle), 0);
    assert_eq!(endpoint.connection(handle).recv_next(), TcpSeqNumber(PEER_ISN + 1));
    assert!(!endpoint.connection(handle).hole().is_empty());

    receive(&mut endpoint, at(11),
        peer_repr(SERVER_PORT, flags, PEER_ISN + 1, Some(isn + 1)),
        b"hello");
    assert_eq!(endpoint.is_get_ready(handle), 10);
    assert!(endpoint.connection(handle).hole().is_empty());

    // Second segment in a row, acknowledged right away.
    let (ack, _) = single(&mut endpoint);
    assert_eq!(ack.ack_number, Some(TcpSeqNumber(PEER_ISN + 11)));

    let mut buf = [0; 10];
    assert_eq!(endpoint.get_array(handle, &mut buf), Status::Done(10));
    assert_eq!(&buf, b"helloworld");
}

#[test]
fn overlapping_retransmission() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Device)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let isn = accept(&mut endpoint, handle);
    let flags = TcpFlags::PSH | TcpFlags::ACK;

    receive(&mut endpoint, at(10), peer_repr(SERVER_PORT, flags, PEER_ISN + 1, Some(isn + 1)), b"abc");
    receive(&mut endpoint, at(11), peer_repr(SERVER_PORT, flags, PEER_ISN + 1, Some(isn + 1)), b"abcdef");
    assert_eq!(endpoint.connection(handle).recv_next(), TcpSeqNumber(PEER_ISN + 7));

    let mut buf = [0; 8];
    assert_eq!(endpoint.get_array(handle, &mut buf), Status::Done(6));
    assert_eq!(&buf[..6], b"abcdef");
}

#[test]
fn duplicate_segments_are_idempotent() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.connect(PEER, SERVER_PORT).unwrap();
    let (syn, _) = single(&mut endpoint);
    assert_eq!(syn.flags, TcpFlags::SYN);
    let port = syn.src_port;

    // Simultaneous open, then the same SYN again.
    let repr = TcpRepr { src_port: SERVER_PORT, ..peer_repr(port, TcpFlags::SYN, PEER_ISN, None) };
    receive(&mut endpoint, at(1), repr, &[]);
    assert_eq!(endpoint.connection(handle).state(), State::SynReceived);
    let (syn_ack, _) = single(&mut endpoint);
    assert_eq!(syn_ack.flags, TcpFlags::SYN | TcpFlags::ACK);
    assert_eq!(syn_ack.seq_number, syn.seq_number);

    receive(&mut endpoint, at(2), repr, &[]);
    assert_eq!(endpoint.connection(handle).recv_next(), TcpSeqNumber(PEER_ISN + 1));
    let (ack, _) = single(&mut endpoint);
    assert_eq!(ack.ack_number, Some(TcpSeqNumber(PEER_ISN + 1)));

    let ack = TcpRepr {
        src_port: SERVER_PORT,
        ..peer_repr(port, TcpFlags::ACK, PEER_ISN + 1, Some(syn.seq_number + 1))
    };
    receive(&mut endpoint, at(3), ack, &[]);
    assert!(endpoint.is_connected(handle));
    receive(&mut endpoint, at(4), ack, &[]);
    assert!(endpoint.is_connected(handle));
    assert_eq!(endpoint.connection(handle).recv_next(), TcpSeqNumber(PEER_ISN + 1));
    assert_eq!(endpoint.connection(handle).send_next(), syn.seq_number + 1);
    assert!(sent(&mut endpoint).is_empty());
}

#[test]
fn open_by_address_and_send() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Device)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&NEIGHBORS, &[]));

    let handle = endpoint.connect(PEER_IP, SERVER_PORT).unwrap();
    assert_eq!(endpoint.connection(handle).state(), State::GatewaySendArp);
    endpoint.tick(at(0));
    assert_eq!(endpoint.connection(handle).state(), State::GatewayGetArp);
    endpoint.tick(at(1));
    assert_eq!(endpoint.connection(handle).state(), State::SynSent);
    assert_eq!(endpoint.connection(handle).remote(), PEER);

    let (syn, _) = single(&mut endpoint);
    let port = syn.src_port;
    assert_eq!(port, *Config::default().local_ports.start());
    assert_eq!(syn.dst_port, SERVER_PORT);

    let syn_ack = TcpRepr {
        src_port: SERVER_PORT,
        max_seg_size: Some(536),
        ..peer_repr(port, TcpFlags::SYN | TcpFlags::ACK, PEER_ISN, Some(syn.seq_number + 1))
    };
    receive(&mut endpoint, at(2), syn_ack, &[]);
    assert!(endpoint.is_connected(handle));
    let (ack, _) = single(&mut endpoint);
    assert_eq!(ack.flags, TcpFlags::ACK);
    assert_eq!(ack.seq_number, syn.seq_number + 1);

    assert_eq!(endpoint.is_put_ready(handle), 64);
    assert_eq!(endpoint.put_array(handle, b"0123456789"), Status::Done(10));
    assert!(sent(&mut endpoint).is_empty());
    endpoint.flush(handle);

    let (data, payload) = single(&mut endpoint);
    assert_eq!(data.flags, TcpFlags::PSH | TcpFlags::ACK);
    assert_eq!(data.seq_number, syn.seq_number + 1);
    assert_eq!(payload, b"0123456789");
    assert_eq!(endpoint.connection(handle).send_next(), syn.seq_number + 11);
    assert_eq!(endpoint.is_put_ready(handle), 54);

    let ack = TcpRepr {
        src_port: SERVER_PORT,
        ..peer_repr(port, TcpFlags::ACK, PEER_ISN + 1, Some(syn.seq_number + 11))
    };
    receive(&mut endpoint, at(3), ack, &[]);
    assert_eq!(endpoint.is_put_ready(handle), 64);
    assert_eq!(endpoint.tx_fifo_full(handle), 0);
    assert!(sent(&mut endpoint).is_empty());
}

#[test]
fn open_by_host_name() {
    let hosts = [("peer.local", PEER_IP)];
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&NEIGHBORS, &hosts));

    let name = HostName::new("peer.local").unwrap();
    let handle = endpoint.connect(name, SERVER_PORT).unwrap();
    assert_eq!(endpoint.connection(handle).state(), State::GetDnsModule);

    let states = [State::DnsResolve, State::GatewaySendArp, State::GatewayGetArp, State::SynSent];
    for (tick, &state) in states.iter().enumerate() {
        endpoint.tick(at(tick as i64));
        assert_eq!(endpoint.connection(handle).state(), state);
    }

    assert!(!endpoint.resolver_mut().dns_in_use());
    let (syn, _) = single(&mut endpoint);
    assert!(syn.flags.syn());
}

#[test]
fn dns_is_released_on_disconnect() {
    let hosts = [("peer.local", PEER_IP)];
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &hosts));

    let handle = endpoint.connect(HostName::new("peer.local").unwrap(), SERVER_PORT).unwrap();
    endpoint.tick(at(0));
    assert!(endpoint.resolver_mut().dns_in_use());
    endpoint.disconnect(handle);
    assert!(!endpoint.resolver_mut().dns_in_use());
    assert_eq!(endpoint.connection(handle).state(), State::Closed);
}

#[test]
fn arp_retries_back_off() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.connect(PEER_IP, SERVER_PORT).unwrap();
    endpoint.tick(at(0));
    endpoint.tick(at(100));
    assert_eq!(endpoint.connection(handle).state(), State::GatewayGetArp);
    endpoint.tick(at(300));
    assert_eq!(endpoint.connection(handle).state(), State::GatewaySendArp);
    assert_eq!(endpoint.connection(handle).retry().interval(), Duration::from_millis(500));
    assert!(sent(&mut endpoint).is_empty());
}

#[test]
fn syn_retries_are_capped() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.connect(PEER, SERVER_PORT).unwrap();
    let (first, _) = single(&mut endpoint);

    endpoint.tick(at(999));
    assert!(sent(&mut endpoint).is_empty());

    endpoint.tick(at(1000));
    let (second, _) = single(&mut endpoint);
    assert_eq!(second.seq_number, first.seq_number);
    endpoint.tick(at(3000));
    let (third, _) = single(&mut endpoint);
    assert_eq!(third.seq_number, first.seq_number);
    assert_eq!(endpoint.connection(handle).state(), State::SynSent);

    endpoint.tick(at(7000));
    assert_eq!(endpoint.connection(handle).state(), State::Closed);
    assert!(endpoint.was_reset(handle));
    assert!(sent(&mut endpoint).is_empty());
}

#[test]
fn data_is_retransmitted() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let isn = accept(&mut endpoint, handle);

    assert_eq!(endpoint.put_array(handle, b"abcd"), Status::Done(4));
    endpoint.flush(handle);
    let (first, payload) = single(&mut endpoint);
    assert_eq!(payload, b"abcd");

    endpoint.tick(at(1001));
    let (again, payload) = single(&mut endpoint);
    assert_eq!(again.seq_number, first.seq_number);
    assert_eq!(payload, b"abcd");
    assert_eq!(endpoint.connection(handle).send_next(), isn + 5);
    assert_eq!(endpoint.connection(handle).retry().count(), 1);

    // A partial acknowledgement starts the back-off over.
    receive(&mut endpoint, at(1100),
        peer_repr(SERVER_PORT, TcpFlags::ACK, PEER_ISN + 1, Some(isn + 3)),
        &[]);
    assert_eq!(endpoint.tx_fifo_full(handle), 2);
    assert_eq!(endpoint.connection(handle).retry().count(), 0);
}

#[test]
fn unresponsive_remote_is_given_up() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    accept(&mut endpoint, handle);
    endpoint.was_reset(handle);

    let data = TcpFlags::PSH | TcpFlags::ACK;
    let fin = TcpFlags::FIN | TcpFlags::ACK;
    assert_eq!(endpoint.put_array(handle, b"abcd"), Status::Done(4));
    endpoint.flush(handle);
    let (first, payload) = single(&mut endpoint);
    assert_eq!((first.flags, payload.len()), (data, 4));

    let mut segments = Vec::new();
    for step in 1..2000 {
        endpoint.tick(at(step * 100));
        let state = endpoint.connection(handle).state();
        segments.extend(sent(&mut endpoint).into_iter()
            .map(|(repr, payload)| (repr.flags, payload.len(), state)));
    }

    // Five retransmissions of the data, then a graceful close is attempted.
    let mut expected = vec![(data, 4, State::Established); 5];
    expected.push((fin, 0, State::FinWait1));
    // The FIN is repeated together with the unacknowledged data, then the connection is reset.
    expected.extend(vec![(fin, 4, State::FinWait1); 5]);
    expected.push((TcpFlags::RST | TcpFlags::ACK, 0, State::Listen));
    assert_eq!(segments, expected);
    assert!(endpoint.was_reset(handle));
}

#[test]
fn busy_interface_defers_syn_ack() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));
    let handle = endpoint.listen(SERVER_PORT).unwrap();

    endpoint.device_mut().set_link(false);
    receive(&mut endpoint, at(0), peer_repr(SERVER_PORT, TcpFlags::SYN, PEER_ISN, None), &[]);
    assert_eq!(endpoint.connection(handle).state(), State::SynReceived);
    endpoint.tick(at(10));
    assert!(sent(&mut endpoint).is_empty());

    endpoint.device_mut().set_link(true);
    endpoint.tick(at(20));
    let (syn_ack, _) = single(&mut endpoint);
    assert_eq!(syn_ack.flags, TcpFlags::SYN | TcpFlags::ACK);
    assert_eq!(syn_ack.ack_number, Some(TcpSeqNumber(PEER_ISN + 1)));
    assert_eq!(endpoint.connection(handle).send_next(), syn_ack.seq_number + 1);

    // Never acknowledged, the handshake is retried and then abandoned.
    for &time in [1020, 3020].iter() {
        endpoint.tick(at(time));
        let (again, _) = single(&mut endpoint);
        assert_eq!(again.flags, TcpFlags::SYN | TcpFlags::ACK);
        assert_eq!(again.seq_number, syn_ack.seq_number);
    }

    endpoint.tick(at(7020));
    let (rst, _) = single(&mut endpoint);
    assert_eq!(rst.flags, TcpFlags::RST | TcpFlags::ACK);
    assert_eq!(endpoint.connection(handle).state(), State::Listen);
}

#[test]
fn busy_interface_defers_syn() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local), socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    endpoint.device_mut().set_link(false);
    let handle = endpoint.connect(PEER, SERVER_PORT).unwrap();
    endpoint.tick(at(1000));
    assert!(sent(&mut endpoint).is_empty());
    assert_eq!(endpoint.connection(handle).state(), State::SynSent);

    endpoint.device_mut().set_link(true);
    endpoint.tick(at(1500));
    let (syn, _) = single(&mut endpoint);
    assert_eq!(syn.flags, TcpFlags::SYN);
    assert_eq!(syn.ack_number, None);
    assert_eq!(endpoint.connection(handle).send_next(), syn.seq_number + 1);

    // A link that stays down still exhausts the SYN retries.
    endpoint.device_mut().set_link(false);
    let other = endpoint.connect(PEER, SERVER_PORT + 1).unwrap();
    for &time in [2500, 4500, 8500].iter() {
        endpoint.tick(at(time));
    }
    assert_eq!(endpoint.connection(other).state(), State::Closed);
    assert!(endpoint.was_reset(other));
    assert!(sent(&mut endpoint).is_empty());
}

/// Every byte of a 64 byte ring is either free or in use.
fn check_geometry(endpoint: &TestEndpoint, handle: SocketHandle) {
    assert_eq!(endpoint.is_put_ready(handle) + endpoint.tx_fifo_full(handle), 64);
    assert_eq!(endpoint.is_get_ready(handle) + endpoint.rx_fifo_free(handle), 64);
}

#[test]
fn ring_geometry_holds_across_wraparounds() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Device)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let base = accept(&mut endpoint, handle) + 1;

    let mut buf = [0u8; 64];
    let (mut written, mut transmitted, mut acked, mut received) = (0usize, 0usize, 0usize, 0usize);
    for step in 0..40 {
        let now = at(2 + step);

        let len = (step as usize * 7) % 30 + 1;
        if let Status::Done(count) = endpoint.put_array(handle, &[b'x'; 32][..len]) {
            written += count;
        }
        check_geometry(&endpoint, handle);

        endpoint.flush(handle);
        transmitted += sent(&mut endpoint).iter().map(|(_, payload)| payload.len()).sum::<usize>();
        assert_eq!(transmitted, written);
        check_geometry(&endpoint, handle);

        // The peer acknowledges half of what is outstanding and sends some data itself.
        acked += (transmitted - acked + 1) / 2;
        let count = ((step as usize * 11) % 25 + 1).min(endpoint.rx_fifo_free(handle));
        receive(&mut endpoint, now,
            peer_repr(SERVER_PORT, TcpFlags::PSH | TcpFlags::ACK, PEER_ISN + 1 + received as i32, Some(base + acked)),
            &[b'y'; 32][..count]);
        received += count;
        sent(&mut endpoint);
        assert_eq!(endpoint.tx_fifo_full(handle), written - acked);
        check_geometry(&endpoint, handle);

        let want = (step as usize * 5) % 20 + 1;
        let _ = endpoint.get_array(handle, &mut buf[..want]);
        check_geometry(&endpoint, handle);
    }

    // Enough traffic went through to wrap both rings several times.
    assert!(acked > 3 * 65);
    assert!(received > 3 * 65);
}

#[test]
fn reset_closes_connection() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let isn = accept(&mut endpoint, handle);
    endpoint.was_reset(handle);

    receive(&mut endpoint, at(10),
        peer_repr(SERVER_PORT, TcpFlags::RST, PEER_ISN + 1, None),
        &[]);
    assert_eq!(endpoint.connection(handle).state(), State::Listen);
    assert!(endpoint.was_reset(handle));
    assert!(sent(&mut endpoint).is_empty());

    // A stray ACK towards the listener is answered with a reset.
    receive(&mut endpoint, at(20),
        peer_repr(SERVER_PORT, TcpFlags::ACK, PEER_ISN + 1, Some(isn + 1)),
        &[]);
    let (rst, _) = single(&mut endpoint);
    assert_eq!(rst.flags, TcpFlags::RST);
    assert_eq!(rst.seq_number, isn + 1);
}

#[test]
fn invalid_segments_are_dropped() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));
    let handle = endpoint.listen(SERVER_PORT).unwrap();

    assert_eq!(endpoint.process(at(0)), Status::NeedMoreData);

    let mut bytes = build(PEER_IP, LOCAL_IP, peer_repr(SERVER_PORT, TcpFlags::SYN, PEER_ISN, None), &[]);
    bytes[4] ^= 0x01;
    endpoint.device_mut().deliver(PEER, &bytes).unwrap();
    assert_eq!(endpoint.process(at(1)), Status::Done(()));

    let loopback = NodeInfo { ip: Ipv4Address::LOOPBACK, ..PEER };
    let bytes = build(Ipv4Address::LOOPBACK, LOCAL_IP,
        peer_repr(SERVER_PORT, TcpFlags::SYN, PEER_ISN, None), &[]);
    endpoint.device_mut().deliver(loopback, &bytes).unwrap();
    assert_eq!(endpoint.process(at(2)), Status::Done(()));

    // Nobody listens on other ports.
    receive(&mut endpoint, at(3), peer_repr(81, TcpFlags::SYN, PEER_ISN, None), &[]);

    assert_eq!(endpoint.connection(handle).state(), State::Listen);
    assert!(sent(&mut endpoint).is_empty());
    assert_eq!(endpoint.device().pending(), 0);
}

#[test]
fn listeners_are_claimed_in_order() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local), socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let first = endpoint.listen(SERVER_PORT).unwrap();
    let second = endpoint.listen(SERVER_PORT).unwrap();
    assert_eq!(endpoint.listen(SERVER_PORT).err(), Some(crate::layer::Error::Exhausted));

    receive(&mut endpoint, at(0), peer_repr(SERVER_PORT, TcpFlags::SYN, PEER_ISN, None), &[]);
    let other = TcpRepr { src_port: PEER_PORT + 1, ..peer_repr(SERVER_PORT, TcpFlags::SYN, PEER_ISN, None) };
    receive(&mut endpoint, at(0), other, &[]);
    assert_eq!(sent(&mut endpoint).len(), 2);

    let states: Vec<_> = [first, second].iter()
        .map(|&handle| endpoint.connection(handle).state())
        .collect();
    assert_eq!(states, [State::SynReceived, State::SynReceived]);
    assert_eq!(endpoint.connection(first).remote_port(), PEER_PORT);
    assert_eq!(endpoint.connection(second).remote_port(), PEER_PORT + 1);
}

#[test]
fn loopback_exchange() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Device), socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let server = endpoint.listen(23).unwrap();
    assert_eq!(endpoint.open_loopback(24).err(), Some(crate::layer::Error::Unreachable));
    let handle = endpoint.open_loopback(23).unwrap();
    assert_eq!(handle, server);
    assert!(endpoint.is_loopback(handle));
    assert!(endpoint.is_connected(handle));

    assert_eq!(endpoint.inject(handle, b"ls\r\n"), Ok(4));
    assert_eq!(endpoint.find_array(handle, b"\r\n", 0, 0, false), Some(2));
    let mut buf = [0; 4];
    assert_eq!(endpoint.get_array(handle, &mut buf), Status::Done(4));
    assert_eq!(&buf, b"ls\r\n");

    assert_eq!(endpoint.put_array(handle, b"ok"), Status::Done(2));
    endpoint.flush(handle);
    assert_eq!(endpoint.steal(handle, &mut buf), Ok(2));
    assert_eq!(&buf[..2], b"ok");
    assert_eq!(endpoint.tx_fifo_full(handle), 0);

    endpoint.tick(at(1000));
    assert!(sent(&mut endpoint).is_empty());

    endpoint.inject(handle, b"x").unwrap();
    endpoint.disconnect(handle);
    assert_eq!(endpoint.connection(handle).state(), State::LoopbackClosed);
    assert_eq!(endpoint.is_get_ready(handle), 0);
    assert!(endpoint.close_loopback(handle));
    assert_eq!(endpoint.connection(handle).state(), State::Listen);
    assert!(!endpoint.close_loopback(handle));

    let other = endpoint.connect(PEER, SERVER_PORT).unwrap();
    assert_eq!(endpoint.inject(other, b"x"), Err(crate::layer::Error::Illegal));
}

#[test]
fn fifo_adjustment() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    endpoint.adjust_fifo_size(handle, 16, 16, FifoFlags::GIVE_REST_TO_TX).unwrap();
    assert_eq!(endpoint.connection(handle).tx().capacity(), 112);
    assert_eq!(endpoint.connection(handle).rx().capacity(), 16);
    assert_eq!(endpoint.connection(handle).rx().start(), 113);

    endpoint.adjust_fifo_size(handle, 16, 16, FifoFlags::default()).unwrap();
    assert_eq!(endpoint.connection(handle).tx().capacity(), 64);
    assert_eq!(endpoint.connection(handle).rx().capacity(), 64);

    assert_eq!(
        endpoint.adjust_fifo_size(handle, 100, 100, FifoFlags::default()),
        Err(crate::layer::Error::BadSize));

    // Buffered data survives when preserved, also when it wraps around.
    let handle = endpoint.open_loopback(SERVER_PORT).unwrap();
    let mut buf = [0; 64];
    endpoint.inject(handle, &[0; 60]).unwrap();
    assert_eq!(endpoint.get_array(handle, &mut buf), Status::Done(60));
    endpoint.inject(handle, b"wrapped").unwrap();
    assert_eq!(endpoint.put_array(handle, b"out"), Status::Done(3));

    let keep = FifoFlags::PRESERVE_RX | FifoFlags::PRESERVE_TX;
    assert_eq!(
        endpoint.adjust_fifo_size(handle, 4, 2, keep | FifoFlags::GIVE_REST_TO_TX),
        Err(crate::layer::Error::BadSize));
    endpoint.adjust_fifo_size(handle, 8, 8, keep | FifoFlags::GIVE_REST_TO_RX).unwrap();
    assert_eq!(endpoint.connection(handle).rx().capacity(), 120);

    assert_eq!(endpoint.get_array(handle, &mut buf), Status::Done(7));
    assert_eq!(&buf[..7], b"wrapped");
    assert_eq!(endpoint.steal(handle, &mut buf), Ok(3));
    assert_eq!(&buf[..3], b"out");
}

#[test]
fn put_blocks_when_full() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    assert_eq!(endpoint.is_put_ready(handle), 0);
    assert_eq!(endpoint.put_array(handle, b"early"), Status::WouldBlock);

    accept(&mut endpoint, handle);
    assert_eq!(endpoint.put_array(handle, &[1; 100]), Status::Done(64));
    // Filling the buffer sends right away.
    let (_, payload) = single(&mut endpoint);
    assert_eq!(payload.len(), 64);
    assert_eq!(endpoint.put_array(handle, &[1; 100]), Status::WouldBlock);
    assert!(!endpoint.put(handle, 1));
}

#[test]
fn auto_transmit_sends_queued_data() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    accept(&mut endpoint, handle);
    assert!(endpoint.put(handle, b'a'));
    assert!(endpoint.put(handle, b'b'));

    endpoint.tick(at(20));
    assert!(sent(&mut endpoint).is_empty());
    endpoint.tick(at(41));
    let (data, payload) = single(&mut endpoint);
    assert_eq!(data.flags, TcpFlags::ACK);
    assert_eq!(payload, b"ab");
}

#[test]
fn keep_alive_probe() {
    let mut buffers = Buffers::new();
    let specs = [socket(Medium::Local)];
    let mut endpoint = buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));

    let handle = endpoint.listen(SERVER_PORT).unwrap();
    let isn = accept(&mut endpoint, handle);

    endpoint.tick(at(4000));
    assert!(sent(&mut endpoint).is_empty());
    endpoint.tick(at(5001));
    let (probe, payload) = single(&mut endpoint);
    assert_eq!(probe.seq_number, isn);
    assert_eq!(payload, [0u8]);
    assert_eq!(endpoint.connection(handle).send_next(), isn + 1);

    endpoint.tick(at(5002));
    assert!(sent(&mut endpoint).is_empty());
}

#[test]
fn two_endpoints() {
    const SERVER_IP: Ipv4Address = Ipv4Address::new(10, 0, 0, 3);
    const SERVER: NodeInfo = NodeInfo::new(SERVER_IP, EthernetAddress([2, 0, 0, 0, 0, 3]));

    let specs = [socket(Medium::Device)];
    let mut client_buffers = Buffers::new();
    let mut client = client_buffers.endpoint(LOCAL_IP, &specs, StaticResolver::new(&[], &[]));
    let mut server_buffers = Buffers::new();
    let mut server = server_buffers.endpoint(SERVER_IP, &specs, StaticResolver::new(&[], &[]));

    let listener = server.listen(SERVER_PORT).unwrap();
    let handle = client.connect(SERVER, SERVER_PORT).unwrap();
    pump(&mut client, LOCAL, &mut server, SERVER, at(0));
    assert!(client.is_connected(handle));
    assert!(server.is_connected(listener));

    let before = client.connection(handle).send_next();
    assert_eq!(client.put_array(handle, b"ping"), Status::Done(4));
    client.flush(handle);
    assert_eq!(client.connection(handle).send_next(), before + 4);
    pump(&mut client, LOCAL, &mut server, SERVER, at(1));

    let mut buf = [0; 8];
    assert_eq!(server.get_array(listener, &mut buf), Status::Done(4));
    assert_eq!(&buf[..4], b"ping");
    server.tick(at(2));
    pump(&mut client, LOCAL, &mut server, SERVER, at(2));
    assert_eq!(client.tx_fifo_full(handle), 0);

    client.disconnect(handle);
    pump(&mut client, LOCAL, &mut server, SERVER, at(3));
    assert_eq!(client.connection(handle).state(), State::FinWait2);
    assert_eq!(server.connection(listener).state(), State::CloseWait);

    server.disconnect(listener);
    pump(&mut client, LOCAL, &mut server, SERVER, at(4));
    assert_eq!(client.connection(handle).state(), State::Closed);
    assert_eq!(server.connection(listener).state(), State::Listen);
}
