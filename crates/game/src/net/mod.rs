mod connection;
mod endpoint;
mod protocol;
mod stats;

pub use connection::{ClientConnection, ConnectionManager, ConnectionState};
pub use endpoint::NetworkEndpoint;
pub use protocol::{
    DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_OBSERVERS_PER_PACKET, MAX_PACKET_SIZE, PROTOCOL_MAGIC,
    PROTOCOL_VERSION, Packet, PacketError, PacketHeader, PacketType, sequence_greater_than,
};
pub use stats::{NetworkStats, PacketLossSimulation, rand_u64};
