mod director;
mod layout;
mod progress;

pub use director::{RaceDirector, RacePhase};
pub use layout::{Gate, LoopLayout, TrackDescription};
pub use progress::{CheckpointProgress, Crossing, PassOutcome, Rejection};
