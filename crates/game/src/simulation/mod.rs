mod tick;

pub use tick::TickClock;
