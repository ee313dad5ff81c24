use glam::Vec3;
use log::{debug, trace};

use crate::input::{InputCommand, InputFrame};
use crate::math::delta_angle;
use crate::motion::{MotionConfig, MotionModel, MotionSnapshot};

use super::{AuthorityMode, PredictionConfig, TickRing};

/// Locally predicted result of one input tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedState {
    pub tick: u32,
    pub position: Vec3,
    pub yaw_deg: f32,
    pub snapshot: MotionSnapshot,
}

/// What the owner hands to the transport after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OwnerMessage {
    Input(InputFrame),
    StatePush {
        tick: u32,
        position: Vec3,
        yaw_deg: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    /// No prediction is buffered for the echoed tick.
    Stale,
    /// The echo carried a non-finite position or yaw.
    Rejected,
    WithinTolerance,
    Corrected {
        position_error: f32,
        yaw_error_deg: f32,
        replayed: usize,
    },
}

impl ReconcileOutcome {
    pub fn is_correction(&self) -> bool {
        matches!(self, ReconcileOutcome::Corrected { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReconcileStats {
    pub confirmations: u64,
    pub stale: u64,
    pub rejected: u64,
    pub corrections: u64,
    pub replayed_ticks: u64,
    pub max_position_error: f32,
}

impl ReconcileStats {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        match *outcome {
            ReconcileOutcome::Stale => self.stale += 1,
            ReconcileOutcome::Rejected => self.rejected += 1,
            ReconcileOutcome::WithinTolerance => self.confirmations += 1,
            ReconcileOutcome::Corrected {
                position_error,
                replayed,
                ..
            } => {
                self.corrections += 1;
                self.replayed_ticks += replayed as u64;
                self.max_position_error = self.max_position_error.max(position_error);
            }
        }
    }
}

/// Owner-side client prediction: runs the motion model ahead of the server
/// and rewinds onto authoritative echoes.
#[derive(Debug, Clone)]
pub struct PredictionController {
    config: PredictionConfig,
    mode: AuthorityMode,
    dt: f32,
    model: MotionModel,
    tick: u32,
    position: Vec3,
    prev_position: Vec3,
    visual_offset: Vec3,
    inputs: TickRing<InputCommand>,
    predicted: TickRing<PredictedState>,
    stats: ReconcileStats,
}

impl PredictionController {
    pub fn new(
        mode: AuthorityMode,
        motion: MotionConfig,
        config: PredictionConfig,
        dt: f32,
        spawn_position: Vec3,
        spawn_yaw_deg: f32,
    ) -> Self {
        let capacity = config.history_capacity;
        Self {
            config,
            mode,
            dt,
            model: MotionModel::new(motion, spawn_yaw_deg),
            tick: 0,
            position: spawn_position,
            prev_position: spawn_position,
            visual_offset: Vec3::ZERO,
            inputs: TickRing::new(capacity),
            predicted: TickRing::new(capacity),
            stats: ReconcileStats::default(),
        }
    }

    pub fn mode(&self) -> AuthorityMode {
        self.mode
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Tick the next sampled input will be stamped with.
    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw_deg(&self) -> f32 {
        self.model.yaw_deg()
    }

    pub fn model(&self) -> &MotionModel {
        &self.model
    }

    pub fn stats(&self) -> &ReconcileStats {
        &self.stats
    }

    pub fn predicted(&self, tick: u32) -> Option<&PredictedState> {
        self.predicted.get(tick)
    }

    pub fn buffered_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Runs one fixed tick with `sample` (its tick is overwritten with the
    /// local tick) and returns the message for the server.
    pub fn predict(&mut self, sample: InputCommand) -> OwnerMessage {
        let frame = InputFrame::pack(&InputCommand {
            tick: self.tick,
            ..sample.sanitized()
        });
        // Simulate what the server will decode, not the raw sample.
        let command = frame.command();
        self.inputs.push(command.tick, command);

        self.prev_position = self.position;
        let result = self.model.step_command(self.dt, &command);
        self.position.x += result.displacement.x;
        self.position.z += result.displacement.y;

        self.predicted.push(
            command.tick,
            PredictedState {
                tick: command.tick,
                position: self.position,
                yaw_deg: result.yaw_deg,
                snapshot: self.model.capture(),
            },
        );
        trace!(
            "predicted tick {} pos=({:.2}, {:.2}) yaw={:.1}",
            command.tick, self.position.x, self.position.z, result.yaw_deg
        );

        self.tick = self.tick.wrapping_add(1);

        match self.mode {
            AuthorityMode::ServerAuthoritative => OwnerMessage::Input(frame),
            AuthorityMode::ClientAuthoritative => OwnerMessage::StatePush {
                tick: command.tick,
                position: self.position,
                yaw_deg: result.yaw_deg,
            },
        }
    }

    /// Compares an authoritative echo with the prediction for `echoed_tick`
    /// and, when it diverges, rewinds and replays every later input.
    pub fn reconcile(
        &mut self,
        server_position: Vec3,
        server_yaw_deg: f32,
        echoed_tick: u32,
    ) -> ReconcileOutcome {
        let outcome = self.reconcile_inner(server_position, server_yaw_deg, echoed_tick);
        self.stats.record(&outcome);
        outcome
    }

    fn reconcile_inner(
        &mut self,
        server_position: Vec3,
        server_yaw_deg: f32,
        echoed_tick: u32,
    ) -> ReconcileOutcome {
        if !server_position.is_finite() || !server_yaw_deg.is_finite() {
            debug!("echo for tick {echoed_tick} is not finite, ignoring");
            return ReconcileOutcome::Rejected;
        }
        let Some(index) = self.predicted.position(echoed_tick) else {
            trace!("echo for tick {echoed_tick} has no prediction, ignoring");
            return ReconcileOutcome::Stale;
        };
        let Some((_, entry)) = self.predicted.at(index) else {
            return ReconcileOutcome::Stale;
        };
        let entry = *entry;

        let position_error = entry.position.distance(server_position);
        let yaw_error_deg = delta_angle(entry.yaw_deg, server_yaw_deg).abs();
        if position_error < self.config.position_tolerance
            && yaw_error_deg < self.config.yaw_tolerance_deg
        {
            return ReconcileOutcome::WithinTolerance;
        }

        let before = self.position;

        self.model.restore(entry.snapshot.with_yaw(server_yaw_deg));
        let mut position = server_position;
        if let Some((_, confirmed)) = self.predicted.at_mut(index) {
            confirmed.position = position;
            confirmed.yaw_deg = server_yaw_deg;
            confirmed.snapshot = self.model.capture();
        }

        let mut replayed = 0;
        for later in index + 1..self.predicted.len() {
            let Some((tick, _)) = self.predicted.at(later) else {
                break;
            };
            let Some(command) = self.inputs.get(tick).copied() else {
                continue;
            };

            let result = self.model.step_command(self.dt, &command);
            position.x += result.displacement.x;
            position.z += result.displacement.y;
            replayed += 1;

            if let Some((_, state)) = self.predicted.at_mut(later) {
                state.position = position;
                state.yaw_deg = result.yaw_deg;
                state.snapshot = self.model.capture();
            }
        }

        self.position = position;
        self.apply_visual_correction(self.position - before);

        debug!(
            "reconciled tick {echoed_tick}: error {position_error:.3}m / {yaw_error_deg:.1}deg, replayed {replayed} ticks"
        );

        ReconcileOutcome::Corrected {
            position_error,
            yaw_error_deg,
            replayed,
        }
    }

    fn apply_visual_correction(&mut self, shift: Vec3) {
        self.prev_position += shift;
        if self.config.smoothing_rate > 0.0 && shift.length() <= self.config.snap_distance {
            self.visual_offset -= shift;
        } else {
            self.visual_offset = Vec3::ZERO;
        }
    }

    /// Decays the render offset left behind by corrections.
    pub fn update_smoothing(&mut self, frame_dt: f32) {
        if self.config.smoothing_rate <= 0.0 {
            self.visual_offset = Vec3::ZERO;
            return;
        }
        let decay = (-self.config.smoothing_rate * frame_dt.max(0.0)).exp();
        self.visual_offset *= decay;
    }

    /// Position to draw, blended between the last two ticks by `alpha`.
    pub fn render_position(&self, alpha: f32) -> Vec3 {
        self.prev_position.lerp(self.position, alpha.clamp(0.0, 1.0)) + self.visual_offset
    }

    /// Drops all history and places the entity at a new spawn.
    pub fn reset(&mut self, position: Vec3, yaw_deg: f32, tick: u32) {
        self.model = MotionModel::new(self.model.config().clone(), yaw_deg);
        self.tick = tick;
        self.position = position;
        self.prev_position = position;
        self.visual_offset = Vec3::ZERO;
        self.inputs.clear();
        self.predicted.clear();
    }
}
