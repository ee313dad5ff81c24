use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Hard cap of both the input and the predicted-state rings.
    pub history_capacity: usize,
    /// Position error, in world units, tolerated before a correction.
    pub position_tolerance: f32,
    /// Yaw error, in degrees, tolerated before a correction.
    pub yaw_tolerance_deg: f32,
    /// Rate at which the render offset left by a correction decays.
    /// Zero snaps immediately.
    pub smoothing_rate: f32,
    /// Corrections larger than this always snap the rendered position.
    pub snap_distance: f32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 512,
            position_tolerance: 1.0,
            yaw_tolerance_deg: 5.0,
            smoothing_rate: 10.0,
            snap_distance: 4.0,
        }
    }
}
