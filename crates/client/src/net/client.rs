use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use glam::Vec3;
use log::{debug, info, trace, warn};

use hoofbeat::{
    AuthorityMode, ConnectionState, InputCommand, NetworkEndpoint, NetworkStats, OwnerMessage,
    OwnerSnapshot, PacketType, PredictionController, RaceEvent, RacePhase, ReconcileOutcome,
    ReconcileStats, RemoteState, SessionConfig, TickClock, TrackDescription, rand_u64,
    sequence_greater_than,
};

use super::config::ClientConfig;
use super::interpolation::RemoteEntities;

/// Sequences remembered to drop resent race events.
const SEEN_EVENT_WINDOW: usize = 256;

/// Everything the server handed over when it accepted us.
#[derive(Debug, Clone, Copy)]
pub struct SessionInfo {
    pub client_id: u32,
    pub entity_id: u32,
    pub mode: AuthorityMode,
    pub tick_rate: u32,
    pub track: TrackDescription,
}

struct Session {
    info: SessionInfo,
    prediction: PredictionController,
    clock: TickClock,
    last_echo: Option<u32>,
}

pub struct NetworkClient {
    endpoint: NetworkEndpoint,
    requested: SessionConfig,
    config: ClientConfig,
    client_salt: u64,
    /// Answer to the server's challenge, resent until accepted.
    challenge_answer: Option<u64>,
    session: Option<Session>,
    remote: RemoteEntities,
    phase: RacePhase,
    seen_events: VecDeque<u32>,
    race_events: VecDeque<RaceEvent>,
    epoch: Instant,
    last_handshake: Instant,
    connection_start_time: Option<Instant>,
    last_ping_time: Instant,
}

impl NetworkClient {
    pub fn new(requested: SessionConfig, config: ClientConfig) -> io::Result<Self> {
        if requested.is_server() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "client needs a client session",
            ));
        }

        let mut endpoint = NetworkEndpoint::bind("0.0.0.0:0")?;
        endpoint.set_timeout(Duration::from_secs(config.connection_timeout_secs));
        if let Some(loss) = &config.packet_loss {
            endpoint.set_loss_simulation(loss.clone());
        }

        Ok(Self {
            endpoint,
            client_salt: rand_u64(),
            challenge_answer: None,
            session: None,
            remote: RemoteEntities::new(config.interpolation.clone()),
            phase: RacePhase::Lobby,
            seen_events: VecDeque::with_capacity(SEEN_EVENT_WINDOW),
            race_events: VecDeque::new(),
            epoch: Instant::now(),
            last_handshake: Instant::now(),
            connection_start_time: None,
            last_ping_time: Instant::now(),
            requested,
            config,
        })
    }

    /// Starts the handshake with the session's server address.
    pub fn connect(&mut self) -> io::Result<()> {
        let server_addr = self.requested.address;
        info!("Connecting to {server_addr}");

        self.endpoint.set_remote(server_addr);
        self.endpoint.set_state(ConnectionState::Connecting);
        self.connection_start_time = Some(Instant::now());

        self.send_connection_request()
    }

    pub fn disconnect(&mut self) -> io::Result<()> {
        if self.is_connected() {
            let packet = self.endpoint.create_packet(PacketType::Disconnect);
            let _ = self.endpoint.send(&packet);
        }

        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.endpoint.reset();
        self.client_salt = rand_u64();
        self.challenge_answer = None;
        self.session = None;
        self.remote.reset();
        self.phase = RacePhase::Lobby;
        self.seen_events.clear();
        self.race_events.clear();
        self.connection_start_time = None;
    }

    fn reconnect(&mut self) -> io::Result<()> {
        self.reset();
        self.connect()
    }

    fn send_connection_request(&mut self) -> io::Result<()> {
        self.last_handshake = Instant::now();
        let packet = self.endpoint.create_packet(PacketType::ConnectionRequest {
            client_salt: self.client_salt,
        });
        self.endpoint.send(&packet)?;
        Ok(())
    }

    /// Pumps the socket and runs every fixed tick that `frame_dt` makes due.
    /// `driver` samples the owner's input for each tick.
    pub fn update<F>(&mut self, frame_dt: f32, mut driver: F) -> io::Result<()>
    where
        F: FnMut(&PredictionController, RacePhase) -> InputCommand,
    {
        self.process_network()?;

        match self.endpoint.state() {
            state @ (ConnectionState::Connecting | ConnectionState::ChallengeResponse) => {
                let timeout = Duration::from_secs(self.config.connection_timeout_secs);
                let retry_due =
                    self.last_handshake.elapsed().as_secs_f32() >= self.config.connect_retry_secs;
                if self.connection_start_time.is_some_and(|t| t.elapsed() > timeout) {
                    warn!("Connection timeout, starting over");
                    self.reconnect()?;
                } else if retry_due && state == ConnectionState::Connecting {
                    self.send_connection_request()?;
                } else if retry_due {
                    self.send_challenge_answer()?;
                }
            }
            ConnectionState::Connected => {
                self.run_ticks(frame_dt, &mut driver)?;
                if let Some(session) = &self.session {
                    self.remote.update(frame_dt, session.info.tick_rate);
                }

                if self.last_ping_time.elapsed().as_secs_f32() >= self.config.ping_interval_secs {
                    self.last_ping_time = Instant::now();
                    let packet = self.endpoint.create_packet(PacketType::Ping {
                        timestamp: self.now_ms(),
                    });
                    self.endpoint.send(&packet)?;
                }

                if self.endpoint.is_timed_out() {
                    warn!("Server connection lost, reconnecting");
                    self.reconnect()?;
                }
            }
            ConnectionState::Disconnected | ConnectionState::Disconnecting => {}
        }

        Ok(())
    }

    fn run_ticks<F>(&mut self, frame_dt: f32, driver: &mut F) -> io::Result<()>
    where
        F: FnMut(&PredictionController, RacePhase) -> InputCommand,
    {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let ticks = session.clock.advance(frame_dt);
        for _ in 0..ticks {
            let sample = driver(&session.prediction, self.phase);
            let payload = match session.prediction.predict(sample) {
                OwnerMessage::Input(frame) => PacketType::input(frame),
                OwnerMessage::StatePush {
                    tick,
                    position,
                    yaw_deg,
                } => PacketType::StatePush {
                    tick,
                    position: position.to_array(),
                    yaw_deg,
                },
            };
            let packet = self.endpoint.create_packet(payload);
            self.endpoint.send(&packet)?;
        }
        session.prediction.update_smoothing(frame_dt);

        Ok(())
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn process_network(&mut self) -> io::Result<()> {
        let packets = self.endpoint.receive()?;
        let server = self.endpoint.remote_addr();

        for (packet, addr) in packets {
            if Some(addr) != server {
                debug!("ignoring {} from unknown peer {addr}", packet.payload.name());
                continue;
            }
            self.handle_payload(packet.payload)?;
        }

        Ok(())
    }

    fn handle_payload(&mut self, payload: PacketType) -> io::Result<()> {
        match payload {
            PacketType::ConnectionChallenge {
                server_salt,
                challenge,
            } => self.handle_challenge(server_salt, challenge)?,
            PacketType::ConnectionAccepted {
                client_id,
                entity_id,
                mode,
                tick_rate,
                server_tick,
                spawn_position,
                spawn_yaw_deg,
                track,
            } => {
                let info = SessionInfo {
                    client_id,
                    entity_id,
                    mode,
                    tick_rate,
                    track,
                };
                self.handle_connection_accepted(
                    info,
                    server_tick,
                    Vec3::from_array(spawn_position),
                    spawn_yaw_deg,
                );
            }
            PacketType::ConnectionDenied { reason } => {
                warn!("Connection denied: {reason}");
                self.reset();
            }
            PacketType::OwnerState(snapshot) => self.handle_owner_state(&snapshot),
            PacketType::Observers { entities, .. } => {
                let own = self.entity_id();
                for snapshot in entities.iter().filter(|s| Some(s.entity_id) != own) {
                    self.remote.push(snapshot);
                }
            }
            PacketType::RaceEvent { sequence, event } => {
                let packet = self.endpoint.create_packet(PacketType::EventAck { sequence });
                self.endpoint.send(&packet)?;
                self.handle_race_event(sequence, event);
            }
            PacketType::Pong { timestamp } => {
                let rtt = self.now_ms().saturating_sub(timestamp);
                self.endpoint.stats_mut().record_rtt(rtt as f32);
                trace!("ping rtt {rtt} ms");
            }
            PacketType::Disconnect => {
                info!("Disconnected by server");
                self.reset();
            }
            other => debug!("unexpected {} from server", other.name()),
        }

        Ok(())
    }

    fn handle_challenge(&mut self, server_salt: u64, challenge: u64) -> io::Result<()> {
        debug!("Received challenge from server");

        let combined_salt = self.client_salt ^ server_salt;
        if challenge != combined_salt {
            warn!("Challenge mismatch");
            return Ok(());
        }

        self.endpoint.set_state(ConnectionState::ChallengeResponse);
        self.challenge_answer = Some(combined_salt);
        self.send_challenge_answer()
    }

    fn send_challenge_answer(&mut self) -> io::Result<()> {
        let Some(combined_salt) = self.challenge_answer else {
            return Ok(());
        };
        self.last_handshake = Instant::now();
        let packet = self
            .endpoint
            .create_packet(PacketType::ChallengeResponse { combined_salt });
        self.endpoint.send(&packet)?;
        Ok(())
    }

    fn handle_connection_accepted(
        &mut self,
        info: SessionInfo,
        server_tick: u32,
        spawn_position: Vec3,
        spawn_yaw_deg: f32,
    ) {
        if self.session.as_ref().is_some_and(|s| s.info.entity_id == info.entity_id) {
            return;
        }
        if info.mode != self.requested.authority || info.tick_rate != self.requested.tick_rate {
            warn!(
                "Server runs {}-authoritative at {} Hz, not {}; following the server",
                info.mode, info.tick_rate, self.requested
            );
        }

        info!(
            "Connected as client {} driving entity {} ({}-authoritative, {} Hz, server tick {server_tick})",
            info.client_id,
            info.entity_id,
            info.mode,
            info.tick_rate,
        );

        let clock = TickClock::from_tick_rate(info.tick_rate);
        let prediction = PredictionController::new(
            info.mode,
            self.config.motion.clone(),
            self.config.prediction.clone(),
            clock.fixed_delta(),
            spawn_position,
            spawn_yaw_deg,
        );

        self.session = Some(Session {
            info,
            prediction,
            clock,
            last_echo: None,
        });
        self.challenge_answer = None;
        self.endpoint.set_state(ConnectionState::Connected);
    }

    fn handle_owner_state(&mut self, snapshot: &OwnerSnapshot) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if snapshot.entity_id != session.info.entity_id {
            return;
        }
        let tick = snapshot.echoed_input_tick;
        if session.last_echo.is_some_and(|last| !sequence_greater_than(tick, last)) {
            trace!("echo for tick {tick} arrived out of order");
            return;
        }
        session.last_echo = Some(tick);

        let outcome = session.prediction.reconcile(
            snapshot.position(),
            snapshot.yaw_deg,
            snapshot.echoed_input_tick,
        );
        if let ReconcileOutcome::Stale = outcome {
            trace!("echo for tick {} no longer buffered", snapshot.echoed_input_tick);
        }
    }

    fn handle_race_event(&mut self, sequence: u32, event: RaceEvent) {
        if self.seen_events.contains(&sequence) {
            return;
        }
        if self.seen_events.len() >= SEEN_EVENT_WINDOW {
            self.seen_events.pop_front();
        }
        self.seen_events.push_back(sequence);

        if let RaceEvent::PhaseChanged { phase } = event {
            self.phase = phase;
        }
        self.race_events.push_back(event);
    }

    pub fn drain_race_events(&mut self) -> impl Iterator<Item = RaceEvent> + '_ {
        self.race_events.drain(..)
    }

    pub fn state(&self) -> ConnectionState {
        self.endpoint.state()
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint.state() == ConnectionState::Connected
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref().map(|s| &s.info)
    }

    pub fn entity_id(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.info.entity_id)
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    /// Owner's render position: the predicted state blended by the tick
    /// accumulator plus any correction still being smoothed out.
    pub fn render_position(&self) -> Option<Vec3> {
        let session = self.session.as_ref()?;
        Some(session.prediction.render_position(session.clock.alpha()))
    }

    pub fn reconcile_stats(&self) -> Option<&ReconcileStats> {
        self.session.as_ref().map(|s| s.prediction.stats())
    }

    pub fn remote_count(&self) -> usize {
        self.remote.len()
    }

    pub fn remote_entities(&self) -> impl Iterator<Item = (u32, RemoteState)> + '_ {
        self.remote.sample_all()
    }

    /// Asks the server to begin the countdown.
    pub fn request_start(&mut self) -> io::Result<()> {
        let packet = self.endpoint.create_packet(PacketType::RaceStart);
        self.endpoint.send(&packet)?;
        Ok(())
    }

    pub fn stats(&self) -> &NetworkStats {
        self.endpoint.stats()
    }

    pub fn is_running(&self) -> bool {
        self.endpoint.is_running()
    }

    pub fn shutdown(&mut self) {
        self.endpoint.shutdown();
        let _ = self.disconnect();
    }
}
