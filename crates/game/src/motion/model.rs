use glam::Vec2;

use crate::input::{InputCommand, InputFlags};
use crate::math::{finite_or_zero, move_towards};

use super::MotionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionState {
    pub yaw_deg: f32,
    /// Planar velocity, `x` is world X and `y` is world Z.
    pub velocity: Vec2,
    pub boost_timer: f32,
    pub cooldown_timer: f32,
}

/// Frozen copy of a [`MotionState`], restored during reconciliation replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSnapshot(MotionState);

impl MotionSnapshot {
    pub fn state(&self) -> &MotionState {
        &self.0
    }

    pub fn yaw_deg(&self) -> f32 {
        self.0.yaw_deg
    }

    /// Same snapshot facing `yaw_deg` instead.
    pub fn with_yaw(self, yaw_deg: f32) -> Self {
        Self(MotionState { yaw_deg, ..self.0 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    /// World-space XZ displacement for this step.
    pub displacement: Vec2,
    pub yaw_deg: f32,
}

impl StepResult {
    fn idle(yaw_deg: f32) -> Self {
        Self {
            displacement: Vec2::ZERO,
            yaw_deg,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotionModel {
    config: MotionConfig,
    state: MotionState,
}

impl Default for MotionModel {
    fn default() -> Self {
        Self::new(MotionConfig::default(), 0.0)
    }
}

impl MotionModel {
    pub fn new(config: MotionConfig, initial_yaw_deg: f32) -> Self {
        Self {
            config,
            state: MotionState {
                yaw_deg: finite_or_zero(initial_yaw_deg),
                ..MotionState::default()
            },
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    pub fn yaw_deg(&self) -> f32 {
        self.state.yaw_deg
    }

    pub fn velocity(&self) -> Vec2 {
        self.state.velocity
    }

    pub fn speed(&self) -> f32 {
        self.state.velocity.length()
    }

    pub fn is_boosting(&self) -> bool {
        self.state.boost_timer > 0.0
    }

    pub fn can_boost(&self) -> bool {
        self.state.boost_timer <= 0.0 && self.state.cooldown_timer <= 0.0
    }

    pub fn capture(&self) -> MotionSnapshot {
        MotionSnapshot(self.state)
    }

    pub fn restore(&mut self, snapshot: MotionSnapshot) {
        self.state = snapshot.0;
    }

    pub fn step_command(&mut self, dt: f32, command: &InputCommand) -> StepResult {
        self.step(
            dt,
            command.throttle,
            command.steer,
            command.flags.contains(InputFlags::BRAKE),
            command.flags.contains(InputFlags::DRIFT),
            command.flags.contains(InputFlags::BOOST),
        )
    }

    pub fn step(
        &mut self,
        dt: f32,
        throttle: f32,
        steer: f32,
        brake: bool,
        drift: bool,
        boost: bool,
    ) -> StepResult {
        if !dt.is_finite() || dt <= 0.0 {
            return StepResult::idle(self.state.yaw_deg);
        }

        let throttle = finite_or_zero(throttle).clamp(-1.0, 1.0);
        let steer = finite_or_zero(steer).clamp(-1.0, 1.0);

        self.tick_timers(dt);
        if boost && self.can_boost() {
            self.state.boost_timer = self.config.boost_duration;
            self.state.cooldown_timer = self.config.boost_cooldown + self.config.boost_duration;
        }

        let turn_rate = if drift {
            self.config.turn_rate_deg * self.config.drift_turn_multiplier
        } else {
            self.config.turn_rate_deg
        };
        self.state.yaw_deg += steer * turn_rate * dt;

        let speed = self.next_speed(dt, throttle, brake);

        let yaw_rad = self.state.yaw_deg.to_radians();
        let forward = Vec2::new(yaw_rad.sin(), yaw_rad.cos());
        self.state.velocity = forward * speed;

        StepResult {
            displacement: self.state.velocity * dt,
            yaw_deg: self.state.yaw_deg,
        }
    }

    fn tick_timers(&mut self, dt: f32) {
        if self.state.boost_timer > 0.0 {
            self.state.boost_timer = (self.state.boost_timer - dt).max(0.0);
        } else if self.state.cooldown_timer > 0.0 {
            self.state.cooldown_timer = (self.state.cooldown_timer - dt).max(0.0);
        }
    }

    fn next_speed(&self, dt: f32, throttle: f32, brake: bool) -> f32 {
        let forward = throttle >= 0.0;
        let mut cap = if forward {
            self.config.max_speed
        } else {
            self.config.reverse_speed
        };
        if self.is_boosting() && forward {
            cap += self.config.boost_speed_add;
        }

        let mut speed = self.speed();
        if brake {
            speed = (speed - self.config.brake_decel * dt).max(0.0);
        } else {
            let target = cap * throttle;
            let direction = if target >= 0.0 { 1.0 } else { -1.0 };
            let signed = move_towards(speed * direction, target, self.config.accel * dt);
            speed = signed.clamp(-cap, cap).abs();
        }

        (speed - speed * self.config.linear_drag * dt).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn drive(model: &mut MotionModel, ticks: usize, throttle: f32, steer: f32) {
        for _ in 0..ticks {
            model.step(DT, throttle, steer, false, false, false);
        }
    }

    #[test]
    fn zero_dt_is_noop() {
        let mut model = MotionModel::new(MotionConfig::default(), 45.0);
        let result = model.step(0.0, 1.0, 1.0, false, false, true);

        assert_eq!(result.displacement, Vec2::ZERO);
        assert_eq!(result.yaw_deg, 45.0);
        assert!(model.can_boost());
    }

    #[test]
    fn accelerates_and_turns() {
        let config = MotionConfig {
            max_speed: 12.0,
            accel: 30.0,
            linear_drag: 0.5,
            turn_rate_deg: 120.0,
            ..MotionConfig::default()
        };
        let mut model = MotionModel::new(config, 0.0);

        drive(&mut model, 60, 1.0, 0.0);
        assert!(model.speed() > 5.0);

        let start_yaw = model.yaw_deg();
        drive(&mut model, 30, 1.0, 1.0);
        assert!(model.yaw_deg() > start_yaw + 10.0);
    }

    #[test]
    fn forward_at_zero_yaw_moves_along_z() {
        let mut model = MotionModel::default();
        let result = model.step(DT, 1.0, 0.0, false, false, false);

        assert!(result.displacement.x.abs() < 1e-6);
        assert!(result.displacement.y > 0.0);
    }

    #[test]
    fn drift_increases_turn_rate() {
        let config = MotionConfig {
            turn_rate_deg: 100.0,
            drift_turn_multiplier: 1.5,
            ..MotionConfig::default()
        };
        let mut plain = MotionModel::new(config.clone(), 0.0);
        let mut drifting = MotionModel::new(config, 0.0);

        for _ in 0..30 {
            plain.step(DT, 0.0, 1.0, false, false, false);
            drifting.step(DT, 0.0, 1.0, false, true, false);
        }

        assert!(drifting.yaw_deg() > plain.yaw_deg() + 5.0);
    }

    #[test]
    fn brake_ignores_throttle() {
        let mut model = MotionModel::default();
        drive(&mut model, 120, 1.0, 0.0);
        let cruising = model.speed();

        model.step(DT, 1.0, 0.0, true, false, false);
        assert!(model.speed() < cruising);

        for _ in 0..120 {
            model.step(DT, 1.0, 0.0, true, false, false);
        }
        assert_eq!(model.speed(), 0.0);
    }

    #[test]
    fn reverse_is_capped_by_reverse_speed() {
        let config = MotionConfig {
            linear_drag: 0.0,
            ..MotionConfig::default()
        };
        let reverse_speed = config.reverse_speed;
        let mut model = MotionModel::new(config, 0.0);

        drive(&mut model, 240, -1.0, 0.0);
        assert!((model.speed() - reverse_speed).abs() < 1e-3);
    }

    #[test]
    fn boost_temporarily_increases_speed() {
        let config = MotionConfig {
            max_speed: 8.0,
            accel: 100.0,
            linear_drag: 0.0,
            boost_speed_add: 4.0,
            boost_duration: 0.3,
            boost_cooldown: 0.1,
            ..MotionConfig::default()
        };
        let mut model = MotionModel::new(config, 0.0);

        drive(&mut model, 60, 1.0, 0.0);
        let base = model.speed();
        assert!((base - 8.0).abs() < 1e-3);

        model.step(DT, 1.0, 0.0, false, false, true);
        assert!(model.is_boosting());
        assert!(model.speed() > base + 1.0);

        drive(&mut model, 5, 1.0, 0.0);
        assert!((model.speed() - (base + 4.0)).abs() < 1e-3);

        drive(&mut model, 40, 1.0, 0.0);
        assert!(!model.is_boosting());
        assert!((model.speed() - base).abs() < 0.5);
    }

    #[test]
    fn boost_cooldown_counts_from_request() {
        let config = MotionConfig {
            boost_duration: 0.5,
            boost_cooldown: 1.0,
            ..MotionConfig::default()
        };
        let mut model = MotionModel::new(config, 0.0);

        model.step(0.125, 1.0, 0.0, false, false, true);
        assert!((model.state().boost_timer - 0.5).abs() < 1e-6);
        assert!((model.state().cooldown_timer - 1.5).abs() < 1e-6);

        // Cooldown only drains once the boost has run out.
        for _ in 0..4 {
            model.step(0.125, 1.0, 0.0, false, false, true);
        }
        assert_eq!(model.state().boost_timer, 0.0);
        assert_eq!(model.state().cooldown_timer, 1.5);
        assert!(!model.can_boost());
    }

    #[test]
    fn non_finite_inputs_are_ignored() {
        let mut model = MotionModel::default();
        model.step(DT, f32::NAN, f32::INFINITY, false, false, false);
        model.step(f32::NAN, 1.0, 1.0, false, false, false);

        assert!(model.yaw_deg().is_finite());
        assert!(model.velocity().is_finite());
        assert_eq!(model.speed(), 0.0);
    }

    #[test]
    fn snapshot_restore_matches_trajectory() {
        let mut direct = MotionModel::default();
        let mut replayed = MotionModel::default();

        for _ in 0..10 {
            direct.step(0.016, 1.0, 0.2, false, false, false);
            replayed.step(0.016, 1.0, 0.2, false, false, false);
        }

        let snapshot = direct.capture();
        let inputs: Vec<(bool, bool)> = (0..20).map(|i| (i % 7 == 0, i == 5)).collect();

        for &(drift, boost) in &inputs {
            direct.step(0.016, 1.0, 0.1, false, drift, boost);
            replayed.step(0.016, 1.0, 0.1, false, drift, boost);
        }

        replayed.restore(snapshot);
        for &(drift, boost) in &inputs {
            replayed.step(0.016, 1.0, 0.1, false, drift, boost);
        }

        assert!((direct.yaw_deg() - replayed.yaw_deg()).abs() <= 0.01);
        assert!((direct.velocity().x - replayed.velocity().x).abs() <= 0.01);
        assert!((direct.velocity().y - replayed.velocity().y).abs() <= 0.01);
        assert_eq!(direct.state(), replayed.state());
    }
}
