use hoofbeat::{MotionConfig, PacketLossSimulation, PredictionConfig};

use super::interpolation::InterpolationConfig;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connection_timeout_secs: u64,
    /// Handshake packets are resent at this interval until answered.
    pub connect_retry_secs: f32,
    pub ping_interval_secs: f32,
    /// Must match the server's tuning or every tick will need correcting.
    pub motion: MotionConfig,
    pub prediction: PredictionConfig,
    pub interpolation: InterpolationConfig,
    pub packet_loss: Option<PacketLossSimulation>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 10,
            connect_retry_secs: 0.5,
            ping_interval_secs: 1.0,
            motion: MotionConfig::default(),
            prediction: PredictionConfig::default(),
            interpolation: InterpolationConfig::default(),
            packet_loss: None,
        }
    }
}
