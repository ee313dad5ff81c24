use glam::Vec3;

use hoofbeat::math::delta_angle;
use hoofbeat::{Gate, InputCommand, InputFlags, TrackDescription};

/// Degrees of heading error that map to full steering lock.
const FULL_LOCK_DEG: f32 = 45.0;
const DRIFT_ABOVE_DEG: f32 = 60.0;
const BOOST_BELOW_DEG: f32 = 8.0;

/// Stand-in driver for headless sessions: aims for the next gate in order.
#[derive(Debug, Clone)]
pub struct Autopilot {
    gates: Vec<Gate>,
    arrive_radius: f32,
    target: usize,
}

impl Autopilot {
    pub fn new(track: &TrackDescription) -> Self {
        let gates = track.gates();
        let target = 1 % gates.len().max(1);
        Self {
            gates,
            arrive_radius: track.gate_radius,
            target,
        }
    }

    /// Server confirmed `checkpoint`; aim for the one after it.
    pub fn on_checkpoint(&mut self, checkpoint: u32) {
        if !self.gates.is_empty() {
            self.target = (checkpoint as usize + 1) % self.gates.len();
        }
    }

    pub fn restart(&mut self) {
        self.target = 1 % self.gates.len().max(1);
    }

    pub fn sample(&mut self, position: Vec3, yaw_deg: f32, racing: bool) -> InputCommand {
        let command = InputCommand::default();
        if !racing {
            return command;
        }
        let Some(gate) = self.gates.get(self.target) else {
            return command;
        };

        let to_gate = gate.position - position;
        if to_gate.x * to_gate.x + to_gate.z * to_gate.z <= self.arrive_radius * self.arrive_radius
        {
            self.target = (self.target + 1) % self.gates.len();
        }

        let Some(gate) = self.gates.get(self.target) else {
            return command;
        };
        let to_gate = gate.position - position;
        let desired_yaw = to_gate.x.atan2(to_gate.z).to_degrees();
        let error = delta_angle(yaw_deg, desired_yaw);

        let steer = (error / FULL_LOCK_DEG).clamp(-1.0, 1.0);
        let throttle = if error.abs() < 90.0 { 1.0 } else { 0.4 };

        let mut flags = InputFlags::empty();
        flags.set(InputFlags::DRIFT, error.abs() > DRIFT_ABOVE_DEG);
        flags.set(InputFlags::BOOST, error.abs() < BOOST_BELOW_DEG);

        command.with_axes(throttle, steer).with_flags(flags)
    }
}
