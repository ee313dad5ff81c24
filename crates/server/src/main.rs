mod config;
mod events;
mod race;
mod server;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use config::ServerConfig;
use hoofbeat::{AuthorityMode, PacketLossSimulation, SessionConfig, TrackDescription};
use server::GameServer;

#[derive(Parser)]
#[command(name = "hoofbeat-server")]
#[command(about = "Authoritative race server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    #[arg(short, long, default_value_t = hoofbeat::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = hoofbeat::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 8)]
    max_clients: usize,

    #[arg(short, long, default_value = "server", help = "server | client")]
    authority: AuthorityMode,

    #[arg(long, default_value_t = 3)]
    laps: u32,

    #[arg(long, default_value_t = 8)]
    checkpoints: u32,

    #[arg(long, default_value_t = 3, help = "Ticks between owner state echoes")]
    publish_interval: u32,

    #[arg(long, default_value_t = 3.0, help = "Countdown length in seconds")]
    countdown: f32,

    #[arg(
        long,
        default_value_t = 1,
        help = "Racers needed to start the countdown automatically (0 = wait for a start request)"
    )]
    auto_start: usize,

    #[arg(long, default_value_t = 0.0, help = "Outgoing packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0.0, help = "Stop after this many seconds (0 = no limit)")]
    duration: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let session = SessionConfig::server(
        SocketAddr::new(args.bind, args.port),
        args.tick_rate,
        args.authority,
    );

    let global_packet_loss =
        (args.loss_percent > 0.0).then(|| PacketLossSimulation::with_loss(args.loss_percent));

    let config = ServerConfig {
        tick_rate: session.tick_rate,
        max_clients: args.max_clients.max(1),
        authority: session.authority,
        track: TrackDescription {
            checkpoint_count: args.checkpoints.max(1),
            total_laps: args.laps.max(1),
            ..TrackDescription::default()
        },
        publish_interval: args.publish_interval.max(1),
        countdown_seconds: args.countdown,
        auto_start_racers: args.auto_start,
        global_packet_loss,
        ..Default::default()
    };

    let mut server = GameServer::new(session.address, config)
        .with_context(|| format!("failed to bind {}", session.address))?;

    log::info!("{session}");
    log::info!("Server started on {}", server.local_addr());
    let limit = (args.duration > 0.0).then(|| Duration::from_secs_f32(args.duration));
    server.run(limit);
    log::info!("Server shutting down");

    Ok(())
}
