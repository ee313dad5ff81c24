use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::connection::ConnectionState;
use super::protocol::{MAX_PACKET_SIZE, Packet, PacketHeader, PacketType};
use super::stats::{NetworkStats, PacketLossSimulation};

/// The single remote a client-side endpoint talks to.
#[derive(Debug, Clone, Copy)]
struct Peer {
    addr: SocketAddr,
    state: ConnectionState,
    last_heard: Instant,
}

impl Peer {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            state: ConnectionState::Disconnected,
            last_heard: Instant::now(),
        }
    }
}

/// Non-blocking UDP socket speaking the packet protocol.
///
/// A server uses [`send_to`](Self::send_to) with per-client addresses. A
/// client sets a peer with [`set_remote`](Self::set_remote) and tracks the
/// handshake state and silence timeout against it.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    peer: Option<Peer>,
    silence_limit: Duration,
    next_sequence: u32,
    stats: NetworkStats,
    loss: PacketLossSimulation,
    scratch: Vec<u8>,
    running: AtomicBool,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            peer: None,
            silence_limit: Duration::from_secs(10),
            next_sequence: 0,
            stats: NetworkStats::default(),
            loss: PacketLossSimulation::default(),
            scratch: vec![0; MAX_PACKET_SIZE],
            running: AtomicBool::new(true),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        // Bound sockets always report an address; fall back to unspecified.
        self.socket
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)))
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.peer.map(|peer| peer.addr)
    }

    pub fn state(&self) -> ConnectionState {
        self.peer
            .map_or(ConnectionState::Disconnected, |peer| peer.state)
    }

    /// No-op until a peer is set.
    pub fn set_state(&mut self, state: ConnectionState) {
        if let Some(peer) = self.peer.as_mut() {
            peer.state = state;
        }
    }

    pub fn set_remote(&mut self, addr: SocketAddr) {
        self.peer = Some(Peer::new(addr));
    }

    pub fn set_loss_simulation(&mut self, loss: PacketLossSimulation) {
        self.loss = loss;
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    /// Wraps `payload` in a header carrying the next outgoing sequence.
    pub fn create_packet(&mut self, payload: PacketType) -> Packet {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.wrapping_add(1);
        Packet::new(PacketHeader::new(sequence), payload)
    }

    /// Returns the bytes written, or zero when the loss simulation ate it.
    pub fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> io::Result<usize> {
        let bytes = packet
            .serialize()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        if self.loss.should_drop() {
            trace!("simulated loss of {} to {addr}", packet.payload.name());
            self.stats.packets_dropped += 1;
            return Ok(0);
        }

        let written = self.socket.send_to(&bytes, addr)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += written as u64;
        Ok(written)
    }

    pub fn send(&mut self, packet: &Packet) -> io::Result<usize> {
        match self.remote_addr() {
            Some(addr) => self.send_to(packet, addr),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no peer set")),
        }
    }

    /// Drains every queued datagram. Undecodable ones are counted as rejected
    /// and skipped.
    pub fn receive(&mut self) -> io::Result<Vec<(Packet, SocketAddr)>> {
        let mut received = Vec::new();

        loop {
            let (len, from) = match self.socket.recv_from(&mut self.scratch) {
                Ok(datagram) => datagram,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // Windows reports ICMP port unreachable on the next read.
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e),
            };

            let packet = match Packet::deserialize(&self.scratch[..len]) {
                Ok(packet) if packet.header.is_valid() => packet,
                Ok(packet) => {
                    debug!("rejecting packet from {from}: header {:?}", packet.header);
                    self.stats.packets_rejected += 1;
                    continue;
                }
                Err(e) => {
                    debug!("rejecting {len} byte datagram from {from}: {e}");
                    self.stats.packets_rejected += 1;
                    continue;
                }
            };

            self.stats.packets_received += 1;
            self.stats.bytes_received += len as u64;
            if let Some(peer) = self.peer.as_mut().filter(|peer| peer.addr == from) {
                peer.last_heard = Instant::now();
            }
            received.push((packet, from));
        }

        Ok(received)
    }

    /// True when a peer is set and has been silent past the limit.
    pub fn is_timed_out(&self) -> bool {
        self.peer
            .is_some_and(|peer| peer.last_heard.elapsed() > self.silence_limit)
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.silence_limit = timeout;
    }

    /// Forgets the handshake and counters but keeps the peer address.
    pub fn reset(&mut self) {
        if let Some(peer) = self.peer.as_mut() {
            *peer = Peer::new(peer.addr);
        }
        self.stats = NetworkStats::default();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> NetworkEndpoint {
        NetworkEndpoint::bind("127.0.0.1:0").unwrap()
    }

    #[test]
    fn state_needs_a_peer() {
        let mut endpoint = loopback();
        endpoint.set_state(ConnectionState::Connected);
        assert_eq!(endpoint.state(), ConnectionState::Disconnected);

        endpoint.set_remote(SocketAddr::from(([127, 0, 0, 1], 9)));
        endpoint.set_state(ConnectionState::Connecting);
        assert_eq!(endpoint.state(), ConnectionState::Connecting);

        endpoint.reset();
        assert_eq!(endpoint.state(), ConnectionState::Disconnected);
        assert!(endpoint.remote_addr().is_some());
    }

    #[test]
    fn send_without_peer_fails() {
        let mut endpoint = loopback();
        let packet = endpoint.create_packet(PacketType::Ping { timestamp: 0 });
        let err = endpoint.send(&packet).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn sequences_increase() {
        let mut endpoint = loopback();
        let a = endpoint.create_packet(PacketType::Disconnect);
        let b = endpoint.create_packet(PacketType::Disconnect);
        assert_eq!(b.header.sequence, a.header.sequence + 1);
    }

    #[test]
    fn silence_limit_applies_only_with_peer() {
        let mut endpoint = loopback();
        endpoint.set_timeout(Duration::ZERO);
        assert!(!endpoint.is_timed_out());

        endpoint.set_remote(SocketAddr::from(([127, 0, 0, 1], 9)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(endpoint.is_timed_out());
    }
}
