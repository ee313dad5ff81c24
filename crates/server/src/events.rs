use std::net::SocketAddr;

use hoofbeat::RacePhase;
use log::{error, info, warn};

#[derive(Debug, Clone)]
pub enum ServerEvent {
    ClientConnecting {
        addr: SocketAddr,
    },
    ClientConnected {
        client_id: u32,
        addr: SocketAddr,
        entity_id: u32,
    },
    ClientDisconnected {
        client_id: u32,
        reason: DisconnectReason,
    },
    ConnectionDenied {
        addr: SocketAddr,
        reason: String,
    },
    PhaseChanged {
        phase: RacePhase,
    },
    LapCompleted {
        entity_id: u32,
        lap: u32,
        lap_time: f32,
    },
    RacerFinished {
        entity_id: u32,
        place: u32,
        finish_time: f32,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn log(&self) {
        match self {
            ServerEvent::ClientConnecting { addr } => info!("Connection request from {addr}"),
            ServerEvent::ClientConnected {
                client_id,
                addr,
                entity_id,
            } => info!("Client {client_id} connected from {addr} (entity {entity_id})"),
            ServerEvent::ClientDisconnected { client_id, reason } => {
                info!("Client {client_id} {}", reason.as_str())
            }
            ServerEvent::ConnectionDenied { addr, reason } => {
                warn!("Connection denied to {addr}: {reason}")
            }
            ServerEvent::PhaseChanged { phase } => info!("Race phase: {}", phase.as_str()),
            ServerEvent::LapCompleted {
                entity_id,
                lap,
                lap_time,
            } => info!("Entity {entity_id} completed lap {lap} in {lap_time:.2}s"),
            ServerEvent::RacerFinished {
                entity_id,
                place,
                finish_time,
            } => info!("Entity {entity_id} finished #{place} at {finish_time:.2}s"),
            ServerEvent::Error { message } => error!("{message}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Kicked,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Kicked => "kicked",
        }
    }
}
