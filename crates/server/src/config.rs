use hoofbeat::{AuthorityMode, MotionConfig, PacketLossSimulation, TrackDescription};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub max_clients: usize,
    pub authority: AuthorityMode,
    pub motion: MotionConfig,
    pub track: TrackDescription,
    /// Ticks between owner echoes.
    pub publish_interval: u32,
    /// Ticks between observer broadcasts.
    pub observer_interval: u32,
    pub countdown_seconds: f32,
    /// Connected racers needed before the countdown starts on its own.
    /// Zero waits for an explicit start request.
    pub auto_start_racers: usize,
    /// Seconds the results screen stays up before returning to the lobby.
    pub results_seconds: f32,
    pub event_resend_ms: u64,
    pub timeout_secs: u64,
    pub global_packet_loss: Option<PacketLossSimulation>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_clients: 8,
            authority: AuthorityMode::ServerAuthoritative,
            motion: MotionConfig::default(),
            track: TrackDescription::default(),
            publish_interval: 3,
            observer_interval: 3,
            countdown_seconds: 3.0,
            auto_start_racers: 1,
            results_seconds: 10.0,
            event_resend_ms: 200,
            timeout_secs: 10,
            global_packet_loss: None,
        }
    }
}

impl ServerConfig {
    pub fn fixed_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}
