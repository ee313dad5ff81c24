mod command;
mod frame;

pub use command::{InputCommand, InputFlags};
pub use frame::{FrameError, INPUT_FRAME_LEN, InputFrame};
