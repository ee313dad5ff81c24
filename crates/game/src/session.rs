use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::net::{DEFAULT_PORT, DEFAULT_TICK_RATE};
use crate::prediction::AuthorityMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionRole {
    Server,
    Client,
}

/// How a process joined the race, handed to the server and client loops
/// instead of being read from shared global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub role: SessionRole,
    /// Address the server binds, or the address a client connects to.
    pub address: SocketAddr,
    pub tick_rate: u32,
    /// Authority assigned to racers spawned in this session.
    pub authority: AuthorityMode,
}

impl SessionConfig {
    pub fn server(address: SocketAddr, tick_rate: u32, authority: AuthorityMode) -> Self {
        Self {
            role: SessionRole::Server,
            address,
            tick_rate: tick_rate.max(1),
            authority,
        }
    }

    pub fn client(address: SocketAddr, tick_rate: u32, authority: AuthorityMode) -> Self {
        Self {
            role: SessionRole::Client,
            address,
            tick_rate: tick_rate.max(1),
            authority,
        }
    }

    pub fn fixed_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn is_server(&self) -> bool {
        self.role == SessionRole::Server
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::server(
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            DEFAULT_TICK_RATE,
            AuthorityMode::default(),
        )
    }
}

impl fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            SessionRole::Server => "server",
            SessionRole::Client => "client",
        };
        write!(
            f,
            "{role} direct {} @ {} Hz, {}-authoritative",
            self.address, self.tick_rate, self.authority
        )
    }
}
