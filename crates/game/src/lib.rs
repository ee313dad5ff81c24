pub mod event;
pub mod input;
pub mod math;
pub mod motion;
pub mod net;
pub mod prediction;
pub mod race;
pub mod session;
pub mod simulation;
pub mod snapshot;
pub mod validation;

pub use event::{EventQueue, PendingEvent, RaceEvent, ReliabilityMode};
pub use input::{FrameError, INPUT_FRAME_LEN, InputCommand, InputFlags, InputFrame};
pub use motion::{MotionConfig, MotionModel, MotionSnapshot, MotionState, StepResult};
pub use net::{
    ClientConnection, ConnectionManager, ConnectionState, DEFAULT_PORT, DEFAULT_TICK_RATE,
    MAX_OBSERVERS_PER_PACKET, MAX_PACKET_SIZE, NetworkEndpoint, NetworkStats, Packet, PacketError,
    PacketHeader, PacketLossSimulation, PacketType, rand_u64, sequence_greater_than,
};
pub use prediction::{
    AuthoritativeEntity, AuthorityMode, ObserverSnapshot, OwnerMessage, OwnerSnapshot,
    PredictedState, PredictionConfig, PredictionController, ReconcileOutcome, ReconcileStats,
};
pub use race::{
    CheckpointProgress, Crossing, Gate, LoopLayout, PassOutcome, RaceDirector, RacePhase,
    Rejection, TrackDescription,
};
pub use session::{SessionConfig, SessionRole};
pub use simulation::TickClock;
pub use snapshot::{RemoteState, SnapshotBuffer};
pub use validation::{MovementValidator, clamp_state};
