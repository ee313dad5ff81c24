use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::event::EventQueue;

use super::stats::rand_u64;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    ChallengeResponse,
    Connected,
    Disconnecting,
}

/// Server-side record of one remote racer: handshake salts, the entity it
/// drives and its outgoing race event queue.
#[derive(Debug)]
pub struct ClientConnection {
    pub addr: SocketAddr,
    pub client_id: u32,
    pub state: ConnectionState,
    pub client_salt: u64,
    pub server_salt: u64,
    pub entity_id: Option<u32>,
    pub events: EventQueue,
    last_heard: Instant,
    outgoing: u32,
}

impl ClientConnection {
    pub fn new(addr: SocketAddr, client_id: u32, client_salt: u64, server_salt: u64) -> Self {
        Self {
            addr,
            client_id,
            state: ConnectionState::Connecting,
            client_salt,
            server_salt,
            entity_id: None,
            events: EventQueue::default(),
            last_heard: Instant::now(),
            outgoing: 0,
        }
    }

    /// The value both sides must agree on to finish the handshake.
    pub fn combined_salt(&self) -> u64 {
        self.client_salt ^ self.server_salt
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn silence(&self) -> Duration {
        self.last_heard.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_heard = Instant::now();
    }

    /// Sequence for the next packet sent to this client.
    pub fn next_sequence(&mut self) -> u32 {
        let sequence = self.outgoing;
        self.outgoing = sequence.wrapping_add(1);
        sequence
    }
}

/// Server-side table of clients ordered by id, with an address index for
/// routing incoming datagrams.
#[derive(Debug)]
pub struct ConnectionManager {
    by_id: BTreeMap<u32, ClientConnection>,
    by_addr: HashMap<SocketAddr, u32>,
    next_id: u32,
    capacity: usize,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_addr: HashMap::new(),
            next_id: 1,
            capacity: max_clients,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(max_clients: usize, timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            ..Self::new(max_clients)
        }
    }

    /// Returns the record for `addr`, creating a pending one for a new
    /// address. A repeated request keeps the original salts; a pending
    /// client that restarts with a new salt gets a fresh challenge.
    pub fn get_or_create_pending(
        &mut self,
        addr: SocketAddr,
        client_salt: u64,
    ) -> Result<&mut ClientConnection, &'static str> {
        if let Some(&id) = self.by_addr.get(&addr) {
            let client = self.by_id.get_mut(&id).ok_or("unknown client")?;
            if !client.is_connected() && client.client_salt != client_salt {
                client.client_salt = client_salt;
                client.server_salt = rand_u64();
            }
            return Ok(client);
        }
        if self.by_id.len() >= self.capacity {
            return Err("server full");
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.by_addr.insert(addr, id);
        Ok(self
            .by_id
            .entry(id)
            .or_insert_with(|| ClientConnection::new(addr, id, client_salt, rand_u64())))
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&ClientConnection> {
        self.by_id.get(self.by_addr.get(addr)?)
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut ClientConnection> {
        self.by_id.get_mut(self.by_addr.get(addr)?)
    }

    pub fn get(&self, client_id: u32) -> Option<&ClientConnection> {
        self.by_id.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut ClientConnection> {
        self.by_id.get_mut(&client_id)
    }

    pub fn remove(&mut self, client_id: u32) -> Option<ClientConnection> {
        let client = self.by_id.remove(&client_id)?;
        self.by_addr.remove(&client.addr);
        Some(client)
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<ClientConnection> {
        let id = self.by_addr.get(addr).copied()?;
        self.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.by_id.values()
    }

    pub fn connected_mut(&mut self) -> impl Iterator<Item = &mut ClientConnection> {
        self.by_id.values_mut().filter(|c| c.is_connected())
    }

    /// Removes and returns every client silent for longer than the timeout.
    pub fn cleanup_timed_out(&mut self) -> Vec<ClientConnection> {
        let timeout = self.timeout;
        let expired: Vec<u32> = self
            .by_id
            .values()
            .filter(|c| c.silence() > timeout)
            .map(|c| c.client_id)
            .collect();

        expired.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn connected_count(&self) -> usize {
        self.iter().filter(|c| c.is_connected()).count()
    }

    pub fn total_count(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn repeated_requests_reuse_the_pending_entry() {
        let mut connections = ConnectionManager::new(4);
        let first = connections.get_or_create_pending(addr(5000), 1).unwrap();
        let (id, salt) = (first.client_id, first.server_salt);

        let second = connections.get_or_create_pending(addr(5000), 1).unwrap();
        assert_eq!(second.client_id, id);
        assert_eq!(second.server_salt, salt);
        assert_eq!(connections.total_count(), 1);
    }

    #[test]
    fn restarted_handshake_gets_a_new_challenge() {
        let mut connections = ConnectionManager::new(4);
        let first = connections.get_or_create_pending(addr(5000), 1).unwrap();
        let id = first.client_id;

        let restarted = connections.get_or_create_pending(addr(5000), 2).unwrap();
        assert_eq!(restarted.client_id, id);
        assert_eq!(restarted.client_salt, 2);
        assert_eq!(restarted.combined_salt(), 2 ^ restarted.server_salt);

        restarted.state = ConnectionState::Connected;
        let connected = connections.get_or_create_pending(addr(5000), 3).unwrap();
        assert_eq!(connected.client_salt, 2);
    }

    #[test]
    fn full_server_denies() {
        let mut connections = ConnectionManager::new(1);
        connections.get_or_create_pending(addr(5000), 1).unwrap();

        assert_eq!(
            connections.get_or_create_pending(addr(5001), 2).err(),
            Some("server full")
        );
    }

    #[test]
    fn remove_clears_both_indexes() {
        let mut connections = ConnectionManager::new(4);
        let id = connections.get_or_create_pending(addr(5000), 1).unwrap().client_id;

        assert!(connections.remove(id).is_some());
        assert!(connections.get_by_addr(&addr(5000)).is_none());
        assert!(connections.remove_by_addr(&addr(5000)).is_none());
        assert_eq!(connections.total_count(), 0);
    }

    #[test]
    fn only_connected_clients_are_counted() {
        let mut connections = ConnectionManager::new(4);
        connections.get_or_create_pending(addr(5000), 1).unwrap().state =
            ConnectionState::Connected;
        connections.get_or_create_pending(addr(5001), 2).unwrap();

        assert_eq!(connections.connected_count(), 1);
        assert_eq!(connections.connected_mut().count(), 1);
    }

    #[test]
    fn silent_clients_time_out() {
        let mut connections = ConnectionManager::with_timeout(4, 0);
        connections.get_or_create_pending(addr(5000), 1).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let expired = connections.cleanup_timed_out();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].addr, addr(5000));
        assert_eq!(connections.total_count(), 0);
    }

    #[test]
    fn sequences_are_per_client() {
        let mut connections = ConnectionManager::new(4);
        let a = connections.get_or_create_pending(addr(5000), 1).unwrap();
        assert_eq!(a.next_sequence(), 0);
        assert_eq!(a.next_sequence(), 1);

        let b = connections.get_or_create_pending(addr(5001), 2).unwrap();
        assert_eq!(b.next_sequence(), 0);
    }
}
