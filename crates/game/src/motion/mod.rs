mod config;
mod model;

pub use config::MotionConfig;
pub use model::{MotionModel, MotionSnapshot, MotionState, StepResult};
