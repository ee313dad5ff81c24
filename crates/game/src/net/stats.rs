use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::time::Instant;

const RTT_SMOOTHING: f32 = 0.125;

/// Artificial outbound loss, for exercising reconciliation on a clean link.
#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
}

impl PacketLossSimulation {
    pub fn with_loss(loss_percent: f32) -> Self {
        Self {
            enabled: loss_percent > 0.0,
            loss_percent: loss_percent.clamp(0.0, 100.0),
        }
    }

    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rand_percent() * 100.0 < self.loss_percent
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub packets_rejected: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub rtt_ms: f32,
    pub rtt_variance: f32,
}

impl NetworkStats {
    /// Folds a round-trip sample into the smoothed estimate.
    pub fn record_rtt(&mut self, sample_ms: f32) {
        if self.rtt_ms == 0.0 {
            self.rtt_ms = sample_ms;
            self.rtt_variance = sample_ms / 2.0;
            return;
        }
        let error = sample_ms - self.rtt_ms;
        self.rtt_ms += RTT_SMOOTHING * error;
        self.rtt_variance += RTT_SMOOTHING * (error.abs() - self.rtt_variance);
    }
}

pub fn rand_percent() -> f32 {
    (rand_u64() >> 40) as f32 / (1u64 << 24) as f32
}

pub fn rand_u64() -> u64 {
    let mut hasher = RandomState::new().build_hasher();
    Instant::now().hash(&mut hasher);
    hasher.finish()
}
