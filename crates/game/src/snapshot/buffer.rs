use glam::Vec3;

use crate::math::lerp_angle;

pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 64;

/// Authoritative transform of a remote entity at a server tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteState {
    pub tick: u32,
    pub position: Vec3,
    pub yaw_deg: f32,
}

impl RemoteState {
    pub fn new(tick: u32, position: Vec3, yaw_deg: f32) -> Self {
        Self {
            tick,
            position,
            yaw_deg,
        }
    }
}

/// Tick-ordered history of remote states. Snapshots may arrive out of order,
/// so insertion is sorted rather than appended.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snapshots: Vec<RemoteState>,
    capacity: usize,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn add_snapshot(&mut self, state: RemoteState) {
        match self.snapshots.binary_search_by_key(&state.tick, |s| s.tick) {
            Ok(index) => self.snapshots[index] = state,
            Err(index) => self.snapshots.insert(index, state),
        }

        if self.snapshots.len() > self.capacity {
            self.snapshots.remove(0);
        }
    }

    /// State at `render_tick`, clamped to the buffered range. `None` only
    /// when nothing has been buffered yet.
    pub fn try_interpolate(&self, render_tick: f64) -> Option<RemoteState> {
        let first = *self.snapshots.first()?;
        let last = *self.snapshots.last()?;

        if render_tick <= first.tick as f64 {
            return Some(first);
        }
        if render_tick >= last.tick as f64 {
            return Some(last);
        }

        let upper = self
            .snapshots
            .partition_point(|s| (s.tick as f64) < render_tick);
        let a = self.snapshots[upper - 1];
        let b = self.snapshots[upper];

        let span = (b.tick - a.tick) as f64;
        let t = ((render_tick - a.tick as f64) / span) as f32;

        Some(RemoteState {
            tick: render_tick.floor() as u32,
            position: a.position.lerp(b.position, t),
            yaw_deg: lerp_angle(a.yaw_deg, b.yaw_deg, t),
        })
    }

    pub fn earliest(&self) -> Option<&RemoteState> {
        self.snapshots.first()
    }

    pub fn latest(&self) -> Option<&RemoteState> {
        self.snapshots.last()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tick: u32, x: f32, yaw: f32) -> RemoteState {
        RemoteState::new(tick, Vec3::new(x, 0.0, 0.0), yaw)
    }

    #[test]
    fn empty_buffer_has_no_state() {
        let buffer = SnapshotBuffer::default();
        assert!(buffer.try_interpolate(10.0).is_none());
    }

    #[test]
    fn interpolates_and_clamps() {
        let mut buffer = SnapshotBuffer::default();
        buffer.add_snapshot(state(100, 0.0, 0.0));
        buffer.add_snapshot(state(110, 10.0, 0.0));

        let mid = buffer.try_interpolate(105.0).unwrap();
        assert!((mid.position.x - 5.0).abs() < 1e-4);
        assert_eq!(mid.tick, 105);

        assert_eq!(buffer.try_interpolate(90.0), Some(state(100, 0.0, 0.0)));
        assert_eq!(buffer.try_interpolate(999.0), Some(state(110, 10.0, 0.0)));
    }

    #[test]
    fn out_of_order_arrivals_are_sorted() {
        let mut buffer = SnapshotBuffer::default();
        buffer.add_snapshot(state(30, 3.0, 0.0));
        buffer.add_snapshot(state(10, 1.0, 0.0));
        buffer.add_snapshot(state(20, 2.0, 0.0));

        assert_eq!(buffer.earliest().map(|s| s.tick), Some(10));
        assert_eq!(buffer.latest().map(|s| s.tick), Some(30));

        let at = buffer.try_interpolate(15.0).unwrap();
        assert!((at.position.x - 1.5).abs() < 1e-4);
    }

    #[test]
    fn duplicate_tick_replaces_entry() {
        let mut buffer = SnapshotBuffer::default();
        buffer.add_snapshot(state(5, 1.0, 0.0));
        buffer.add_snapshot(state(5, 2.0, 0.0));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.latest().map(|s| s.position.x), Some(2.0));
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut buffer = SnapshotBuffer::new(4);
        for tick in 0..6 {
            buffer.add_snapshot(state(tick, tick as f32, 0.0));
        }

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.earliest().map(|s| s.tick), Some(2));
    }

    #[test]
    fn yaw_takes_shortest_path() {
        let mut buffer = SnapshotBuffer::default();
        buffer.add_snapshot(state(0, 0.0, 350.0));
        buffer.add_snapshot(state(10, 0.0, 10.0));

        let mid = buffer.try_interpolate(5.0).unwrap();
        assert!((mid.yaw_deg - 360.0).abs() < 1e-3);
    }
}
