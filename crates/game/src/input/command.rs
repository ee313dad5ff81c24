use bitflags::bitflags;

use crate::math::finite_or_zero;

bitflags! {
    /// Digital controls. Bit positions match the flag byte of the wire frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputFlags: u8 {
        const BRAKE = 1 << 0;
        const DRIFT = 1 << 1;
        const BOOST = 1 << 2;
        const ITEM_USE = 1 << 3;
    }
}

/// One tick of player input, produced by the owning client.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputCommand {
    pub tick: u32,
    pub throttle: f32,
    pub steer: f32,
    pub flags: InputFlags,
}

impl InputCommand {
    pub fn new(tick: u32) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn with_axes(mut self, throttle: f32, steer: f32) -> Self {
        self.throttle = throttle;
        self.steer = steer;
        self
    }

    pub fn with_flags(mut self, flags: InputFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub fn has_flag(&self, flag: InputFlags) -> bool {
        self.flags.contains(flag)
    }

    #[inline]
    pub fn set_flag(&mut self, flag: InputFlags, value: bool) {
        self.flags.set(flag, value);
    }

    /// Copy with analog axes forced finite and into `[-1, 1]`.
    pub fn sanitized(&self) -> Self {
        Self {
            throttle: finite_or_zero(self.throttle).clamp(-1.0, 1.0),
            steer: finite_or_zero(self.steer).clamp(-1.0, 1.0),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let mut cmd = InputCommand::new(7)
            .with_axes(0.5, -0.25)
            .with_flags(InputFlags::DRIFT | InputFlags::BOOST);
        cmd.set_flag(InputFlags::BRAKE, true);
        cmd.set_flag(InputFlags::BOOST, false);

        assert_eq!(cmd.tick, 7);
        assert!(cmd.has_flag(InputFlags::BRAKE));
        assert!(cmd.has_flag(InputFlags::DRIFT));
        assert!(!cmd.has_flag(InputFlags::BOOST));
    }

    #[test]
    fn sanitized_clamps_axes() {
        let cmd = InputCommand::new(1).with_axes(f32::NAN, -4.0).sanitized();
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.steer, -1.0);
    }
}
