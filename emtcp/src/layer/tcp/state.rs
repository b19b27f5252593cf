use core::fmt;

/// State enum of the statemachine.
///
/// Besides the states of RFC793 a client socket passes through pre-states that resolve its
/// remote before the SYN is sent, and a socket looped back to a local user has two states of its
/// own. There is no `TimeWait`, a connection closes directly once both FINs are acknowledged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Free for `open`.
    Closed,

    /// A listening server socket.
    ///
    /// Converts in place into the connection of the first peer whose SYN it receives.
    Listen,

    /// Waiting to acquire the DNS module.
    GetDnsModule,

    /// Waiting for the host name to resolve.
    DnsResolve,

    /// About to request the link address of the remote or its gateway.
    GatewaySendArp,

    /// Waiting for the link address.
    GatewayGetArp,

    /// An open connection request.
    SynSent,

    /// Connection request we intend to answer, waiting on ack.
    SynReceived,

    /// An open connection.
    Established,

    /// Closed our side of the connection.
    FinWait1,

    /// Our FIN was acknowledged, waiting for the FIN of the other side.
    FinWait2,

    /// Both sides sent a FIN but ours is not yet acknowledged.
    Closing,

    /// Other side closed its connection.
    CloseWait,

    /// Connection closed after other side closed its already.
    LastAck,

    /// Connected to a local user instead of the network.
    Loopback,

    /// The local user of a loopback connection disconnected.
    LoopbackClosed,
}

impl State {
    /// A client socket still resolving its remote.
    pub fn is_resolving(self) -> bool {
        match self {
            State::GetDnsModule
            | State::DnsResolve
            | State::GatewaySendArp
            | State::GatewayGetArp => true,
            _ => false,
        }
    }

    /// One of the two loopback states.
    pub fn is_loopback(self) -> bool {
        match self {
            State::Loopback | State::LoopbackClosed => true,
            _ => false,
        }
    }

    /// Whether the application may queue data for sending.
    pub fn accepts_data(self) -> bool {
        match self {
            State::Established
            | State::CloseWait
            | State::Loopback
            | State::LoopbackClosed => true,
            _ => false,
        }
    }
}

impl Default for State {
    fn default() -> Self {
        State::Closed
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            State::Closed => "CLOSED",
            State::Listen => "LISTEN",
            State::GetDnsModule => "GET-DNS-MODULE",
            State::DnsResolve => "DNS-RESOLVE",
            State::GatewaySendArp => "GATEWAY-SEND-ARP",
            State::GatewayGetArp => "GATEWAY-GET-ARP",
            State::SynSent => "SYN-SENT",
            State::SynReceived => "SYN-RECEIVED",
            State::Established => "ESTABLISHED",
            State::FinWait1 => "FIN-WAIT-1",
            State::FinWait2 => "FIN-WAIT-2",
            State::Closing => "CLOSING",
            State::CloseWait => "CLOSE-WAIT",
            State::LastAck => "LAST-ACK",
            State::Loopback => "LOOPBACK",
            State::LoopbackClosed => "LOOPBACK-CLOSED",
        };
        f.write_str(name)
    }
}
