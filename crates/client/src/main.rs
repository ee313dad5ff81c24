mod autopilot;
mod net;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use autopilot::Autopilot;
use hoofbeat::{
    AuthorityMode, ConnectionState, PacketLossSimulation, RaceEvent, RacePhase, SessionConfig,
};
use net::{ClientConfig, InterpolationConfig, NetworkClient};

const STATUS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "Headless race client driven by an autopilot")]
struct Args {
    #[arg(
        short,
        long,
        default_value = "127.0.0.1:27315",
        help = "Server address to connect to"
    )]
    server: SocketAddr,

    #[arg(
        long,
        default_value_t = hoofbeat::DEFAULT_TICK_RATE,
        help = "Tick rate expected from the server"
    )]
    tick_rate: u32,

    #[arg(long, default_value = "server", help = "Expected authority: server | client")]
    authority: AuthorityMode,

    #[arg(long, help = "Ask the server to start the countdown once connected")]
    start: bool,

    #[arg(long, help = "Exit after finishing one race")]
    once: bool,

    #[arg(long, default_value_t = 0.0, help = "Stop after this many seconds (0 = no limit)")]
    duration: f32,

    #[arg(long, default_value_t = 6.0, help = "Remote racer interpolation delay in ticks")]
    interp_delay: f64,

    #[arg(long, default_value_t = 0.0, help = "Outgoing packet loss percentage (0-100)")]
    loss_percent: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let session = SessionConfig::client(args.server, args.tick_rate, args.authority);
    let config = ClientConfig {
        interpolation: InterpolationConfig {
            delay_ticks: args.interp_delay.max(0.0),
            ..InterpolationConfig::default()
        },
        packet_loss: (args.loss_percent > 0.0)
            .then(|| PacketLossSimulation::with_loss(args.loss_percent)),
        ..ClientConfig::default()
    };

    info!("{session}");
    let mut client =
        NetworkClient::new(session, config).context("failed to open client socket")?;
    client
        .connect()
        .with_context(|| format!("failed to reach {}", args.server))?;

    let started = Instant::now();
    let mut last_frame = Instant::now();
    let mut last_status = Instant::now();
    let mut pilot: Option<Autopilot> = None;
    let mut start_requested = false;
    let mut finished = false;

    while client.is_running() {
        let now = Instant::now();
        let frame_dt = (now - last_frame).as_secs_f32();
        last_frame = now;

        client.update(frame_dt, |prediction, phase| match pilot.as_mut() {
            Some(pilot) => pilot.sample(
                prediction.position(),
                prediction.yaw_deg(),
                phase == RacePhase::Race,
            ),
            None => hoofbeat::InputCommand::default(),
        })?;
        if client.state() == ConnectionState::Disconnected {
            info!("Server closed the connection");
            break;
        }

        if let Some(session) = client.session().copied() {
            if pilot.is_none() {
                pilot = Some(Autopilot::new(&session.track));
            }
            if args.start && !start_requested {
                start_requested = true;
                client.request_start()?;
            }

            let events: Vec<RaceEvent> = client.drain_race_events().collect();
            for event in events {
                let own = event.entity_id() == Some(session.entity_id);
                match event {
                    RaceEvent::PhaseChanged { phase } => {
                        info!("Race phase: {}", phase.as_str());
                        if phase == RacePhase::Race {
                            if let Some(pilot) = pilot.as_mut() {
                                pilot.restart();
                            }
                        }
                        if phase == RacePhase::Lobby && finished && args.once {
                            client.shutdown();
                        }
                    }
                    RaceEvent::CountdownTick { seconds_left } => info!("{seconds_left}..."),
                    RaceEvent::CheckpointPassed { checkpoint, .. } if own => {
                        if let Some(pilot) = pilot.as_mut() {
                            pilot.on_checkpoint(checkpoint);
                        }
                    }
                    RaceEvent::LapCompleted { lap, lap_time, .. } if own => {
                        info!("Lap {lap} in {lap_time:.2}s");
                    }
                    RaceEvent::RacerFinished {
                        entity_id,
                        place,
                        finish_time,
                    } => {
                        info!("Entity {entity_id} finished #{place} at {finish_time:.2}s");
                        finished |= own;
                    }
                    _ => {}
                }
            }
        }

        if last_status.elapsed() >= STATUS_INTERVAL {
            last_status = Instant::now();
            log_status(&client);
        }

        if args.duration > 0.0 && started.elapsed().as_secs_f32() >= args.duration {
            client.shutdown();
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    log_status(&client);
    info!("Client shutting down");
    Ok(())
}

fn log_status(client: &NetworkClient) {
    let stats = client.stats();
    let Some(position) = client.render_position() else {
        info!("{:?} | sent {} recv {}", client.state(), stats.packets_sent, stats.packets_received);
        return;
    };

    let remote = client.remote_count();
    let nearest = client
        .remote_entities()
        .map(|(_, state)| state.position.distance(position))
        .reduce(f32::min)
        .unwrap_or(0.0);
    let (corrections, confirmations, max_error) = client
        .reconcile_stats()
        .map(|s| (s.corrections, s.confirmations, s.max_position_error))
        .unwrap_or_default();

    info!(
        "{} | pos ({:.1}, {:.1}) | corrections {corrections}/{} max {max_error:.2}m | remote {remote} nearest {nearest:.1}m | rtt {:.0}ms",
        client.phase().as_str(),
        position.x,
        position.z,
        corrections + confirmations,
        stats.rtt_ms,
    );
}
