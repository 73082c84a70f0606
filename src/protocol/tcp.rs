//! TCP connection setup and release, step by step.
//!
//! Only the segment exchange of the three-way handshake and the four-way
//! teardown is modelled: flags, sequence/acknowledgment numbers and the
//! state each endpoint moves to. Nothing is sent on the wire.

use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    LastAck,
    TimeWait,
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TcpState::Closed => "CLOSED",
            TcpState::Listen => "LISTEN",
            TcpState::SynSent => "SYN-SENT",
            TcpState::SynReceived => "SYN-RECEIVED",
            TcpState::Established => "ESTABLISHED",
            TcpState::FinWait1 => "FIN-WAIT-1",
            TcpState::FinWait2 => "FIN-WAIT-2",
            TcpState::CloseWait => "CLOSE-WAIT",
            TcpState::LastAck => "LAST-ACK",
            TcpState::TimeWait => "TIME-WAIT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    fn peer(self) -> Side {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => f.write_str("client"),
            Side::Server => f.write_str("server"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub flags: Flags,
    pub seq: u32,
    /// Only meaningful when `flags.ack` is set.
    pub ack: u32,
}

impl Segment {
    fn syn(seq: u32) -> Self {
        Self {
            flags: Flags { syn: true, ..Flags::default() },
            seq,
            ack: 0,
        }
    }

    fn syn_ack(seq: u32, ack: u32) -> Self {
        Self {
            flags: Flags { syn: true, ack: true, fin: false },
            seq,
            ack,
        }
    }

    fn ack(seq: u32, ack: u32) -> Self {
        Self {
            flags: Flags { ack: true, ..Flags::default() },
            seq,
            ack,
        }
    }

    fn fin(seq: u32, ack: u32) -> Self {
        Self {
            flags: Flags { fin: true, ack: true, syn: false },
            seq,
            ack,
        }
    }

    /// Flag names joined with '-', e.g. `SYN-ACK`.
    pub fn label(&self) -> String {
        let mut names = Vec::new();
        if self.flags.syn {
            names.push("SYN");
        }
        if self.flags.fin {
            names.push("FIN");
        }
        if self.flags.ack {
            names.push("ACK");
        }
        names.join("-")
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} seq={}", self.label(), self.seq)?;
        if self.flags.ack {
            write!(f, " ack={}", self.ack)?;
        }
        Ok(())
    }
}

/// One segment crossing the link, with both endpoints' states once it is processed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exchange {
    pub sender: Side,
    pub segment: Segment,
    pub client: TcpState,
    pub server: TcpState,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {} (client {}, server {})",
            self.sender,
            self.sender.peer(),
            self.segment,
            self.client,
            self.server
        )
    }
}

/// A client/server pair walking through the connection life cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    client: TcpState,
    server: TcpState,
    /// Next sequence number each side will send.
    client_seq: u32,
    server_seq: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            client: TcpState::Closed,
            server: TcpState::Closed,
            client_seq: 0,
            server_seq: 0,
        }
    }

    /// Opens a connection with the given initial sequence numbers.
    pub fn handshake(client_isn: u32, server_isn: u32) -> (Self, Vec<Exchange>) {
        let mut session = Self::new();
        session.server = TcpState::Listen;
        let mut log = Vec::with_capacity(3);

        session.client = TcpState::SynSent;
        session.server = TcpState::SynReceived;
        session.record(&mut log, Side::Client, Segment::syn(client_isn));

        let client_next = client_isn.wrapping_add(1);
        session.client = TcpState::Established;
        session.record(&mut log, Side::Server, Segment::syn_ack(server_isn, client_next));

        let server_next = server_isn.wrapping_add(1);
        session.server = TcpState::Established;
        session.record(&mut log, Side::Client, Segment::ack(client_next, server_next));

        session.client_seq = client_next;
        session.server_seq = server_next;
        info!("Connection established (client isn {}, server isn {})", client_isn, server_isn);
        (session, log)
    }

    /// Client-initiated close.
    pub fn teardown(&mut self) -> Result<Vec<Exchange>> {
        self.teardown_from(Side::Client)
    }

    /// Four-way close started by `initiator`. Leaves the initiator in
    /// TIME-WAIT and the peer CLOSED.
    pub fn teardown_from(&mut self, initiator: Side) -> Result<Vec<Exchange>> {
        if !self.is_established() {
            return Err(Error::InvalidInput(format!(
                "cannot close a connection that is not established (client {}, server {})",
                self.client, self.server
            )));
        }

        let peer = initiator.peer();
        let mut log = Vec::with_capacity(4);

        let u = self.next_seq(initiator);
        let v = self.next_seq(peer);

        self.set(initiator, TcpState::FinWait1);
        self.set(peer, TcpState::CloseWait);
        self.record(&mut log, initiator, Segment::fin(u, v));

        self.set(initiator, TcpState::FinWait2);
        self.record(&mut log, peer, Segment::ack(v, u.wrapping_add(1)));

        self.set(peer, TcpState::LastAck);
        self.record(&mut log, peer, Segment::fin(v, u.wrapping_add(1)));

        self.set(initiator, TcpState::TimeWait);
        self.set(peer, TcpState::Closed);
        self.record(&mut log, initiator, Segment::ack(u.wrapping_add(1), v.wrapping_add(1)));

        self.set_seq(initiator, u.wrapping_add(1));
        self.set_seq(peer, v.wrapping_add(1));
        info!("Connection closed by the {}", initiator);
        Ok(log)
    }

    pub fn client_state(&self) -> TcpState {
        self.client
    }

    pub fn server_state(&self) -> TcpState {
        self.server
    }

    pub fn is_established(&self) -> bool {
        self.client == TcpState::Established && self.server == TcpState::Established
    }

    fn record(&self, log: &mut Vec<Exchange>, sender: Side, segment: Segment) {
        let exchange = Exchange {
            sender,
            segment,
            client: self.client,
            server: self.server,
        };
        debug!("{}", exchange);
        log.push(exchange);
    }

    fn set(&mut self, side: Side, state: TcpState) {
        match side {
            Side::Client => self.client = state,
            Side::Server => self.server = state,
        }
    }

    fn next_seq(&self, side: Side) -> u32 {
        match side {
            Side::Client => self.client_seq,
            Side::Server => self.server_seq,
        }
    }

    fn set_seq(&mut self, side: Side, seq: u32) {
        match side {
            Side::Client => self.client_seq = seq,
            Side::Server => self.server_seq = seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_sequence() {
        let (session, log) = Session::handshake(100, 300);

        let labels: Vec<String> = log.iter().map(|e| e.segment.label()).collect();
        assert_eq!(labels, vec!["SYN", "SYN-ACK", "ACK"]);
        assert_eq!(log[1].segment.ack, 101);
        assert_eq!(log[2].segment.seq, 101);
        assert_eq!(log[2].segment.ack, 301);

        assert_eq!(log[0].client, TcpState::SynSent);
        assert_eq!(log[0].server, TcpState::SynReceived);
        assert!(session.is_established());
    }

    #[test]
    fn test_teardown_sequence() {
        let (mut session, _) = Session::handshake(100, 300);
        let log = session.teardown().unwrap();

        let labels: Vec<String> = log.iter().map(|e| e.segment.label()).collect();
        assert_eq!(labels, vec!["FIN-ACK", "ACK", "FIN-ACK", "ACK"]);
        assert_eq!(log[0].client, TcpState::FinWait1);
        assert_eq!(log[1].client, TcpState::FinWait2);
        assert_eq!(log[2].server, TcpState::LastAck);
        assert_eq!(log[3].segment.ack, 302);

        assert_eq!(session.client_state(), TcpState::TimeWait);
        assert_eq!(session.server_state(), TcpState::Closed);
    }

    #[test]
    fn test_server_initiated_teardown() {
        let (mut session, _) = Session::handshake(1, 1000);
        let log = session.teardown_from(Side::Server).unwrap();

        assert_eq!(log[0].sender, Side::Server);
        assert_eq!(log[0].segment.seq, 1001);
        assert_eq!(session.server_state(), TcpState::TimeWait);
        assert_eq!(session.client_state(), TcpState::Closed);
    }

    #[test]
    fn test_teardown_requires_connection() {
        let mut session = Session::new();
        assert!(matches!(session.teardown(), Err(Error::InvalidInput(_))));

        let (mut session, _) = Session::handshake(7, 9);
        session.teardown().unwrap();
        assert!(session.teardown().is_err());
    }

    #[test]
    fn test_sequence_wraps() {
        let (_, log) = Session::handshake(u32::MAX, 5);
        assert_eq!(log[1].segment.ack, 0);
    }

    #[test]
    fn test_exchange_display() {
        let (_, log) = Session::handshake(100, 300);
        assert_eq!(
            log[1].to_string(),
            "server -> client: SYN-ACK seq=300 ack=101 (client ESTABLISHED, server SYN-RECEIVED)"
        );
    }
}
