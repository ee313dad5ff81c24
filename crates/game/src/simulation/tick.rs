const MIN_FIXED_DELTA: f32 = 0.0001;
const MAX_FRAME_DELTA: f32 = 0.25;
const TICK_EPSILON: f32 = 1e-6;

/// Fixed-step accumulator turning frame deltas into whole simulation ticks.
#[derive(Debug, Clone)]
pub struct TickClock {
    fixed_delta: f32,
    accumulator: f32,
    current_tick: u32,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}

impl TickClock {
    pub fn new(fixed_delta: f32) -> Self {
        let fixed_delta = if fixed_delta.is_finite() {
            fixed_delta.max(MIN_FIXED_DELTA)
        } else {
            MIN_FIXED_DELTA
        };
        Self {
            fixed_delta,
            accumulator: 0.0,
            current_tick: 0,
        }
    }

    pub fn from_tick_rate(tick_rate: u32) -> Self {
        Self::new(1.0 / tick_rate.max(1) as f32)
    }

    pub fn fixed_delta(&self) -> f32 {
        self.fixed_delta
    }

    pub fn tick_rate(&self) -> f32 {
        1.0 / self.fixed_delta
    }

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Accumulates `frame_delta` and returns the number of ticks it completed.
    pub fn advance(&mut self, frame_delta: f32) -> u32 {
        let delta = if frame_delta.is_finite() {
            frame_delta.clamp(0.0, MAX_FRAME_DELTA)
        } else {
            0.0
        };
        self.accumulator += delta;

        let mut advanced = 0;
        while self.accumulator + TICK_EPSILON >= self.fixed_delta {
            self.accumulator = (self.accumulator - self.fixed_delta).max(0.0);
            self.current_tick = self.current_tick.wrapping_add(1);
            advanced += 1;
        }
        advanced
    }

    /// Fraction of the next tick already accumulated, for render blending.
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.fixed_delta).clamp(0.0, 1.0)
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.current_tick = 0;
    }
}
