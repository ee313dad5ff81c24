//! Scalar and angle helpers shared by the motion, validation and
//! interpolation code. Angles are in degrees.

/// Wraps `value` into `[0, length)`.
#[inline]
pub fn repeat(value: f32, length: f32) -> f32 {
    (value - (value / length).floor() * length).clamp(0.0, length)
}

/// Shortest signed difference from `current` to `target`, in `(-180, 180]`.
#[inline]
pub fn delta_angle(current: f32, target: f32) -> f32 {
    let mut delta = repeat(target - current, 360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    delta
}

/// Steps `current` toward `target` by at most `max_delta` without overshoot.
#[inline]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Like [`move_towards`] but along the shortest arc between two headings.
#[inline]
pub fn move_towards_angle(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = delta_angle(current, target);
    if -max_delta < delta && delta < max_delta {
        return target;
    }
    move_towards(current, current + delta, max_delta)
}

/// Interpolates between two headings along the shortest arc.
#[inline]
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    from + delta_angle(from, to) * t
}

/// Replaces non-finite values with zero.
#[inline]
pub(crate) fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_angle_takes_shortest_arc() {
        assert!((delta_angle(350.0, 10.0) - 20.0).abs() < 1e-4);
        assert!((delta_angle(10.0, 350.0) + 20.0).abs() < 1e-4);
        assert!((delta_angle(0.0, 180.0) - 180.0).abs() < 1e-4);
        assert!((delta_angle(-720.0, 90.0) - 90.0).abs() < 1e-4);
    }

    #[test]
    fn move_towards_does_not_overshoot() {
        assert_eq!(move_towards(0.0, 1.0, 5.0), 1.0);
        assert_eq!(move_towards(0.0, 10.0, 2.5), 2.5);
        assert_eq!(move_towards(0.0, -10.0, 2.5), -2.5);
    }

    #[test]
    fn move_towards_angle_wraps() {
        let yaw = move_towards_angle(170.0, -170.0, 5.0);
        assert!((yaw - 175.0).abs() < 1e-4);

        let yaw = move_towards_angle(170.0, -170.0, 45.0);
        assert!((yaw + 170.0).abs() < 1e-4);
    }

    #[test]
    fn lerp_angle_crosses_wrap_point() {
        let yaw = lerp_angle(350.0, 10.0, 0.5);
        assert!((yaw - 360.0).abs() < 1e-4);
    }
}
