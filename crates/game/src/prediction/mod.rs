mod authority;
mod config;
mod controller;
mod history;

pub use authority::{AuthorityMode, AuthoritativeEntity, ObserverSnapshot, OwnerSnapshot};
pub use config::PredictionConfig;
pub use controller::{
    OwnerMessage, PredictedState, PredictionController, ReconcileOutcome, ReconcileStats,
};
pub use history::TickRing;
