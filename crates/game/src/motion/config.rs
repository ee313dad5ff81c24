use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub max_speed: f32,
    pub reverse_speed: f32,
    pub accel: f32,
    pub brake_decel: f32,
    pub linear_drag: f32,

    pub turn_rate_deg: f32,
    pub drift_turn_multiplier: f32,

    pub boost_speed_add: f32,
    pub boost_duration: f32,
    /// Lockout after a boost ends; the cooldown timer is armed with
    /// `boost_cooldown + boost_duration` at the moment of the request.
    pub boost_cooldown: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_speed: 16.0,
            reverse_speed: 8.0,
            accel: 24.0,
            brake_decel: 35.0,
            linear_drag: 1.2,

            turn_rate_deg: 140.0,
            drift_turn_multiplier: 1.35,

            boost_speed_add: 6.0,
            boost_duration: 0.6,
            boost_cooldown: 1.4,
        }
    }
}

impl MotionConfig {
    /// Highest speed the model can ever reach, used to size validation limits.
    pub fn peak_speed(&self) -> f32 {
        self.max_speed.max(self.reverse_speed) + self.boost_speed_add.max(0.0)
    }

    /// Highest yaw rate the model can ever reach, in degrees per second.
    pub fn peak_turn_rate(&self) -> f32 {
        self.turn_rate_deg.abs() * self.drift_turn_multiplier.max(1.0)
    }
}
