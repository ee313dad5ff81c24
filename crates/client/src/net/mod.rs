pub mod client;
pub mod config;
pub mod interpolation;

pub use client::NetworkClient;
pub use config::ClientConfig;
pub use interpolation::{InterpolationConfig, RemoteEntities};
