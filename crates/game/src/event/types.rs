use rkyv::{Archive, Deserialize, Serialize};

use crate::race::RacePhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityMode {
    /// Sent once, then dropped from the queue after `ttl_ms`.
    UnreliableExpiring { ttl_ms: u64 },
    Reliable,
}

impl ReliabilityMode {
    pub fn is_reliable(&self) -> bool {
        matches!(self, Self::Reliable)
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum RaceEvent {
    CheckpointPassed {
        entity_id: u32,
        checkpoint: u32,
        /// Completed laps at the moment of the crossing.
        lap: u32,
        sector_time: f32,
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
    PhaseChanged {
        phase: RacePhase,
    },
    CountdownTick {
        seconds_left: u32,
    },
}

impl RaceEvent {
    pub fn reliability(&self) -> ReliabilityMode {
        match self {
            Self::CountdownTick { .. } => ReliabilityMode::UnreliableExpiring { ttl_ms: 1_000 },
            Self::CheckpointPassed { .. }
            | Self::LapCompleted { .. }
            | Self::RacerFinished { .. }
            | Self::PhaseChanged { .. } => ReliabilityMode::Reliable,
        }
    }

    pub fn entity_id(&self) -> Option<u32> {
        match self {
            Self::CheckpointPassed { entity_id, .. }
            | Self::LapCompleted { entity_id, .. }
            | Self::RacerFinished { entity_id, .. } => Some(*entity_id),
            Self::PhaseChanged { .. } | Self::CountdownTick { .. } => None,
        }
    }
}
