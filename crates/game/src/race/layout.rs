use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use rkyv::{Archive, Deserialize, Serialize};

/// A checkpoint gate: its centre and the heading a racer should cross it at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gate {
    pub index: u32,
    pub position: Vec3,
    pub yaw_deg: f32,
}

impl Gate {
    pub fn forward(&self) -> Vec2 {
        let yaw = self.yaw_deg.to_radians();
        Vec2::new(yaw.sin(), yaw.cos())
    }
}

pub struct LoopLayout;

impl LoopLayout {
    /// Places `count` gates evenly (by angle) around an ellipse in the XZ
    /// plane, each facing along the circular tangent in travel order.
    pub fn ellipse(count: u32, radius_x: f32, radius_z: f32, start_angle_deg: f32) -> Vec<Gate> {
        let count = count.max(1);
        (0..count)
            .map(|index| {
                let t = (index as f32 / count as f32) * TAU + start_angle_deg.to_radians();
                let x = t.cos() * radius_x;
                let z = t.sin() * radius_z;

                let mut radial = Vec2::new(x, z);
                if radial.length_squared() < 1e-6 {
                    radial = Vec2::X;
                }
                let radial = radial.normalize();
                let tangent = Vec2::new(-radial.y, radial.x);

                Gate {
                    index,
                    position: Vec3::new(x, 0.0, z),
                    yaw_deg: tangent.x.atan2(tangent.y).to_degrees(),
                }
            })
            .collect()
    }
}

/// Everything a client needs to rebuild the server's track.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct TrackDescription {
    pub checkpoint_count: u32,
    pub total_laps: u32,
    pub radius_x: f32,
    pub radius_z: f32,
    pub start_angle_deg: f32,
    pub gate_radius: f32,
}

impl Default for TrackDescription {
    fn default() -> Self {
        Self {
            checkpoint_count: 8,
            total_laps: 3,
            radius_x: 60.0,
            radius_z: 35.0,
            start_angle_deg: 0.0,
            gate_radius: 6.0,
        }
    }
}

impl TrackDescription {
    const SPAWN_ROW_SPACING: f32 = 4.0;
    const SPAWN_LANE_WIDTH: f32 = 3.0;

    pub fn gates(&self) -> Vec<Gate> {
        LoopLayout::ellipse(
            self.checkpoint_count,
            self.radius_x,
            self.radius_z,
            self.start_angle_deg,
        )
    }

    /// Grid slot behind the first gate, two racers per row. Slots past the
    /// end of `max_slots` reuse the last one.
    pub fn spawn_point(&self, slot: usize, max_slots: usize) -> (Vec3, f32) {
        let slot = slot.min(max_slots.max(1) - 1);
        let first = LoopLayout::ellipse(1, self.radius_x, self.radius_z, self.start_angle_deg)[0];

        let forward = first.forward();
        let right = Vec2::new(forward.y, -forward.x);
        let row = (slot / 2) as f32 + 1.0;
        let side = if slot % 2 == 0 { -0.5 } else { 0.5 };

        let offset =
            -forward * Self::SPAWN_ROW_SPACING * row + right * Self::SPAWN_LANE_WIDTH * side;
        let position = first.position + Vec3::new(offset.x, 0.0, offset.y);
        (position, first.yaw_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_count_and_radii() {
        let gates = LoopLayout::ellipse(8, 10.0, 5.0, 0.0);

        assert_eq!(gates.len(), 8);
        assert!((gates[0].position.x - 10.0).abs() < 0.01);
        assert!(gates[0].position.z.abs() < 0.01);
        assert!((gates[2].position.z - 5.0).abs() < 0.01);
    }

    #[test]
    fn gates_face_along_tangent() {
        let gates = LoopLayout::ellipse(16, 10.0, 5.0, 0.0);

        for gate in &gates {
            let radial = Vec2::new(gate.position.x, gate.position.z).normalize();
            let dot = gate.forward().dot(radial).abs();
            assert!(dot < 0.5, "gate {} not tangential", gate.index);
        }
    }

    #[test]
    fn gates_face_travel_direction() {
        let gates = LoopLayout::ellipse(8, 10.0, 10.0, 0.0);
        let to_next = gates[1].position - gates[0].position;
        let forward = gates[0].forward();

        assert!(forward.dot(Vec2::new(to_next.x, to_next.z)) > 0.0);
    }

    #[test]
    fn zero_count_yields_one_gate() {
        assert_eq!(LoopLayout::ellipse(0, 10.0, 10.0, 0.0).len(), 1);
    }

    #[test]
    fn spawn_points_sit_behind_first_gate() {
        let track = TrackDescription::default();
        let first = track.gates()[0];

        for slot in 0..4 {
            let (position, yaw) = track.spawn_point(slot, 8);
            let offset = position - first.position;
            assert!(first.forward().dot(Vec2::new(offset.x, offset.z)) < 0.0);
            assert_eq!(yaw, first.yaw_deg);
        }

        let (a, _) = track.spawn_point(0, 8);
        let (b, _) = track.spawn_point(1, 8);
        assert!((a - b).length() > 1.0);
        assert_eq!(track.spawn_point(20, 2), track.spawn_point(1, 2));
    }
}
