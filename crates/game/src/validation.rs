use glam::Vec3;

use crate::math::move_towards_angle;

/// Limits a claimed transform to what `max_speed` and `max_yaw_rate_deg` allow
/// since the previously accepted one. Returns the clamped position and yaw.
#[allow(clippy::too_many_arguments)]
pub fn clamp_state(
    prev_position: Vec3,
    prev_yaw_deg: f32,
    prev_time: f32,
    desired_position: Vec3,
    desired_yaw_deg: f32,
    now: f32,
    max_speed: f32,
    max_yaw_rate_deg: f32,
) -> (Vec3, f32) {
    let dt = (now - prev_time).max(0.0);

    let delta = desired_position - prev_position;
    let max_distance = max_speed * dt;
    let position = if dt <= 0.0 || delta.length_squared() <= max_distance * max_distance {
        desired_position
    } else {
        prev_position + delta.normalize_or_zero() * max_distance
    };

    let yaw = move_towards_angle(prev_yaw_deg, desired_yaw_deg, max_yaw_rate_deg * dt);
    (position, yaw)
}

/// Last accepted transform of a client-driven entity, fed through
/// [`clamp_state`] on every push.
#[derive(Debug, Clone, Copy)]
pub struct MovementValidator {
    position: Vec3,
    yaw_deg: f32,
    time: f32,
    max_speed: f32,
    max_yaw_rate_deg: f32,
}

impl MovementValidator {
    pub fn new(
        position: Vec3,
        yaw_deg: f32,
        time: f32,
        max_speed: f32,
        max_yaw_rate_deg: f32,
    ) -> Self {
        Self {
            position,
            yaw_deg,
            time,
            max_speed,
            max_yaw_rate_deg,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    /// Re-anchors the validator, e.g. after a server-side teleport.
    pub fn reset(&mut self, position: Vec3, yaw_deg: f32, time: f32) {
        self.position = position;
        self.yaw_deg = yaw_deg;
        self.time = time;
    }

    pub fn accept(
        &mut self,
        desired_position: Vec3,
        desired_yaw_deg: f32,
        now: f32,
    ) -> (Vec3, f32) {
        let desired_position = if desired_position.is_finite() {
            desired_position
        } else {
            self.position
        };
        let desired_yaw_deg = if desired_yaw_deg.is_finite() {
            desired_yaw_deg
        } else {
            self.yaw_deg
        };

        let (position, yaw) = clamp_state(
            self.position,
            self.yaw_deg,
            self.time,
            desired_position,
            desired_yaw_deg,
            now,
            self.max_speed,
            self.max_yaw_rate_deg,
        );
        self.position = position;
        self.yaw_deg = yaw;
        self.time = self.time.max(now);
        (position, yaw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_excess_distance() {
        let (position, _) = clamp_state(
            Vec3::ZERO,
            0.0,
            0.0,
            Vec3::new(10.0, 0.0, 0.0),
            0.0,
            0.5,
            3.0,
            90.0,
        );
        assert!((position.length() - 1.5).abs() < 1e-4);
        assert!(position.x > 0.0);
    }

    #[test]
    fn clamps_yaw_rate() {
        let (_, yaw) = clamp_state(Vec3::ZERO, 0.0, 0.0, Vec3::ZERO, 180.0, 0.25, 10.0, 90.0);
        assert!((yaw - 22.5).abs() < 1e-4);
    }

    #[test]
    fn legal_moves_pass_through() {
        let desired = Vec3::new(1.0, 0.0, 1.0);
        let (position, yaw) = clamp_state(Vec3::ZERO, 10.0, 0.0, desired, 20.0, 1.0, 5.0, 90.0);
        assert_eq!(position, desired);
        assert_eq!(yaw, 20.0);
    }

    #[test]
    fn zero_dt_keeps_position_and_yaw() {
        let desired = Vec3::new(50.0, 0.0, 0.0);
        let (position, yaw) = clamp_state(Vec3::ZERO, 30.0, 2.0, desired, 120.0, 1.0, 5.0, 90.0);
        assert_eq!(position, desired);
        assert_eq!(yaw, 30.0);
    }

    #[test]
    fn validator_tracks_accepted_state() {
        let mut validator = MovementValidator::new(Vec3::ZERO, 0.0, 0.0, 2.0, 45.0);

        let (first, _) = validator.accept(Vec3::new(0.0, 0.0, 100.0), 0.0, 1.0);
        assert!((first.z - 2.0).abs() < 1e-4);

        let (second, _) = validator.accept(Vec3::new(0.0, 0.0, 100.0), 0.0, 2.0);
        assert!((second.z - 4.0).abs() < 1e-4);
        assert_eq!(validator.position(), second);
    }

    #[test]
    fn non_finite_claims_hold_position() {
        let mut validator = MovementValidator::new(Vec3::ONE, 15.0, 0.0, 2.0, 45.0);
        let (position, yaw) = validator.accept(Vec3::splat(f32::NAN), f32::NAN, 1.0);

        assert_eq!(position, Vec3::ONE);
        assert_eq!(yaw, 15.0);
    }
}
