use super::command::{InputCommand, InputFlags};

pub const INPUT_FRAME_LEN: usize = 7;

const QUANT_SCALE: f32 = 127.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("input frame needs 7 bytes, got {len}")]
    TooShort { len: usize },
}

/// Fixed-size wire form of an [`InputCommand`]:
/// 4 bytes little-endian tick, signed throttle, signed steer, flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFrame(pub [u8; INPUT_FRAME_LEN]);

impl InputFrame {
    pub fn pack(command: &InputCommand) -> Self {
        let mut data = [0u8; INPUT_FRAME_LEN];
        data[..4].copy_from_slice(&command.tick.to_le_bytes());
        data[4] = quantize(command.throttle) as u8;
        data[5] = quantize(command.steer) as u8;
        data[6] = command.flags.bits();
        Self(data)
    }

    pub fn unpack(data: &[u8]) -> Result<InputCommand, FrameError> {
        Self::try_from(data).map(|frame| frame.command())
    }

    pub fn command(&self) -> InputCommand {
        let data = &self.0;
        InputCommand {
            tick: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            throttle: dequantize(data[4] as i8),
            steer: dequantize(data[5] as i8),
            flags: InputFlags::from_bits_truncate(data[6]),
        }
    }

    pub fn as_bytes(&self) -> &[u8; INPUT_FRAME_LEN] {
        &self.0
    }
}

impl From<&InputCommand> for InputFrame {
    fn from(command: &InputCommand) -> Self {
        Self::pack(command)
    }
}

impl TryFrom<&[u8]> for InputFrame {
    type Error = FrameError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < INPUT_FRAME_LEN {
            return Err(FrameError::TooShort { len: data.len() });
        }
        let mut bytes = [0u8; INPUT_FRAME_LEN];
        bytes.copy_from_slice(&data[..INPUT_FRAME_LEN]);
        Ok(Self(bytes))
    }
}

/// NaN saturates to zero through the float-to-int cast.
fn quantize(value: f32) -> i8 {
    ((value * QUANT_SCALE).round() as i32).clamp(-127, 127) as i8
}

fn dequantize(value: i8) -> f32 {
    (value as f32 / QUANT_SCALE).clamp(-1.0, 1.0)
}
