use std::collections::HashMap;

use hoofbeat::{ObserverSnapshot, RemoteState, SnapshotBuffer};

#[derive(Debug, Clone)]
pub struct InterpolationConfig {
    /// How far behind the newest server tick remote racers are drawn.
    pub delay_ticks: f64,
    pub buffer_capacity: usize,
    /// Fraction of the render clock error corrected per update.
    pub time_correction_rate: f64,
    /// Render clock error, in ticks, that triggers a hard resync.
    pub resync_ticks: f64,
    /// Entities with no update for this many ticks are forgotten.
    pub stale_ticks: u32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            delay_ticks: 6.0,
            buffer_capacity: 64,
            time_correction_rate: 0.1,
            resync_ticks: 30.0,
            stale_ticks: 180,
        }
    }
}

/// Per-entity snapshot buffers for every racer this client does not own,
/// sampled on one render clock that trails the server.
#[derive(Debug)]
pub struct RemoteEntities {
    config: InterpolationConfig,
    buffers: HashMap<u32, SnapshotBuffer>,
    latest_tick: Option<u32>,
    render_tick: f64,
}

impl RemoteEntities {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            buffers: HashMap::new(),
            latest_tick: None,
            render_tick: 0.0,
        }
    }

    pub fn push(&mut self, snapshot: &ObserverSnapshot) {
        let capacity = self.config.buffer_capacity;
        self.buffers
            .entry(snapshot.entity_id)
            .or_insert_with(|| SnapshotBuffer::new(capacity))
            .add_snapshot(RemoteState::new(
                snapshot.tick,
                snapshot.position(),
                snapshot.yaw_deg,
            ));

        if self.latest_tick.is_none_or(|latest| snapshot.tick > latest) {
            if self.latest_tick.is_none() {
                self.render_tick = self.target_tick(snapshot.tick);
            }
            self.latest_tick = Some(snapshot.tick);
        }
    }

    fn target_tick(&self, latest: u32) -> f64 {
        latest as f64 - self.config.delay_ticks
    }

    /// Advances the render clock by `frame_dt` seconds at `tick_rate`,
    /// easing it toward the delayed server tick.
    pub fn update(&mut self, frame_dt: f32, tick_rate: u32) {
        let Some(latest) = self.latest_tick else {
            return;
        };

        self.render_tick += frame_dt.max(0.0) as f64 * tick_rate as f64;

        let target = self.target_tick(latest);
        let error = target - self.render_tick;
        if error.abs() > self.config.resync_ticks {
            log::debug!("interpolation clock resync: {error:.1} ticks off");
            self.render_tick = target;
        } else {
            self.render_tick += error * self.config.time_correction_rate;
        }

        let cutoff = latest.saturating_sub(self.config.stale_ticks);
        self.buffers
            .retain(|_, buffer| buffer.latest().is_some_and(|s| s.tick >= cutoff));
    }

    pub fn sample(&self, entity_id: u32) -> Option<RemoteState> {
        self.buffers.get(&entity_id)?.try_interpolate(self.render_tick)
    }

    pub fn sample_all(&self) -> impl Iterator<Item = (u32, RemoteState)> + '_ {
        self.buffers.iter().filter_map(|(&id, buffer)| {
            buffer
                .try_interpolate(self.render_tick)
                .map(|state| (id, state))
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn reset(&mut self) {
        self.buffers.clear();
        self.latest_tick = None;
        self.render_tick = 0.0;
    }
}
