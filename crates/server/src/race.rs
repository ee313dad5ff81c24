use glam::Vec3;
use log::debug;

use hoofbeat::{
    AuthoritativeEntity, AuthorityMode, CheckpointProgress, Crossing, Gate, MotionConfig,
    PassOutcome, TrackDescription,
};

/// Enter-edge proximity trigger over the track's gates. Reports a gate once
/// when a racer moves into its radius; staying inside reports nothing.
#[derive(Debug, Clone)]
pub struct GateTrigger {
    gates: Vec<Gate>,
    radius: f32,
    inside: Option<u32>,
}

impl GateTrigger {
    pub fn new(gates: Vec<Gate>, radius: f32) -> Self {
        Self {
            gates,
            radius: radius.max(0.0),
            inside: None,
        }
    }

    pub fn update(&mut self, position: Vec3) -> Option<u32> {
        let radius_sq = self.radius * self.radius;
        let current = self
            .gates
            .iter()
            .find(|gate| {
                let dx = gate.position.x - position.x;
                let dz = gate.position.z - position.z;
                dx * dx + dz * dz <= radius_sq
            })
            .map(|gate| gate.index);

        let entered = match current {
            Some(index) if self.inside != Some(index) => Some(index),
            _ => None,
        };
        self.inside = current;
        entered
    }

    pub fn reset(&mut self) {
        self.inside = None;
    }
}

/// Fresh progress for a race starting at `start_time`. Gate 0 is the
/// start/finish line, so the first sector ends at gate 1.
pub fn new_progress(track: &TrackDescription, start_time: f32) -> CheckpointProgress {
    let count = track.checkpoint_count.max(1);
    CheckpointProgress::new(count, track.total_laps, start_time, 1 % count)
}

pub struct Racer {
    pub client_id: u32,
    /// Starting grid position, unique among connected racers.
    pub slot: usize,
    pub entity: AuthoritativeEntity,
    pub progress: CheckpointProgress,
    trigger: GateTrigger,
}

impl Racer {
    pub fn new(
        client_id: u32,
        entity_id: u32,
        slot: usize,
        mode: AuthorityMode,
        motion: MotionConfig,
        track: &TrackDescription,
        spawn: (Vec3, f32),
        publish_interval: u32,
    ) -> Self {
        let (position, yaw_deg) = spawn;
        Self {
            client_id,
            slot,
            entity: AuthoritativeEntity::new(
                entity_id,
                mode,
                motion,
                position,
                yaw_deg,
                publish_interval,
            ),
            progress: new_progress(track, 0.0),
            trigger: GateTrigger::new(track.gates(), track.gate_radius),
        }
    }

    pub fn entity_id(&self) -> u32 {
        self.entity.entity_id()
    }

    /// Runs the gate trigger against the current position. Crossings only
    /// count while `racing`; the trigger state is tracked regardless.
    pub fn check_gates(&mut self, racing: bool, race_time: f32) -> Option<Crossing> {
        let gate = self.trigger.update(self.entity.position())?;
        if !racing {
            return None;
        }

        match self.progress.try_pass(gate, race_time) {
            PassOutcome::Accepted(crossing) => Some(crossing),
            PassOutcome::Rejected(reason) => {
                debug!(
                    "entity {} gate {gate} ignored: {reason:?}",
                    self.entity_id()
                );
                None
            }
        }
    }

    pub fn reset_for_race(&mut self, track: &TrackDescription, start_time: f32) {
        self.progress = new_progress(track, start_time);
        self.trigger.reset();
    }

    pub fn place_on_grid(&mut self, spawn: (Vec3, f32)) {
        let (position, yaw_deg) = spawn;
        self.entity.teleport(position, yaw_deg);
        self.trigger.reset();
    }
}
