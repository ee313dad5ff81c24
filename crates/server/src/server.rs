use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use hoofbeat::{
    ClientConnection, ConnectionManager, ConnectionState, InputFrame, NetworkEndpoint,
    NetworkStats, ObserverSnapshot, Packet, PacketHeader, PacketType, RaceDirector, RaceEvent,
    RacePhase, TickClock,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::race::Racer;

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

pub struct GameServer {
    endpoint: NetworkEndpoint,
    connections: ConnectionManager,
    config: ServerConfig,
    director: RaceDirector,
    racers: BTreeMap<u32, Racer>,
    clock: TickClock,
    tick: u32,
    next_entity_id: u32,
    finished_count: u32,
    results_timer: f32,
    last_countdown_second: Option<u32>,
    last_update: Instant,
    start_time: Instant,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(bind_addr: SocketAddr, config: ServerConfig) -> io::Result<Self> {
        let mut endpoint = NetworkEndpoint::bind(bind_addr)?;
        if let Some(loss) = &config.global_packet_loss {
            endpoint.set_loss_simulation(loss.clone());
        }

        Ok(Self {
            endpoint,
            connections: ConnectionManager::with_timeout(config.max_clients, config.timeout_secs),
            director: RaceDirector::new(config.countdown_seconds),
            racers: BTreeMap::new(),
            clock: TickClock::new(config.fixed_delta()),
            tick: 0,
            next_entity_id: 1,
            finished_count: 0,
            results_timer: 0.0,
            last_countdown_second: None,
            last_update: Instant::now(),
            start_time: Instant::now(),
            pending_events: VecDeque::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// Serves until `limit` has elapsed, or forever when it is `None`.
    pub fn run(&mut self, limit: Option<Duration>) {
        let started = Instant::now();
        let mut last_status = Instant::now();
        while limit.is_none_or(|limit| started.elapsed() < limit) {
            self.tick_once();
            for event in self.drain_events() {
                event.log();
            }

            if last_status.elapsed() >= STATUS_INTERVAL {
                last_status = Instant::now();
                self.stats().log();
            }

            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
    }

    pub fn shutdown_connections(&mut self) {
        let client_ids: Vec<u32> = self.connections.iter().map(|c| c.client_id).collect();
        for client_id in client_ids {
            self.kick_client(client_id);
        }
    }

    pub fn kick_client(&mut self, client_id: u32) {
        if let Some(client) = self.connections.get_mut(client_id) {
            let _ = send_to_client(&mut self.endpoint, client, PacketType::Disconnect);
        }

        if let Some(client) = self.connections.remove(client_id) {
            self.drop_racer(&client);
            self.pending_events
                .push_back(ServerEvent::ClientDisconnected {
                    client_id,
                    reason: DisconnectReason::Kicked,
                });
        }
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_update;
        self.last_update = now;

        if let Err(e) = self.process_network() {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("Network error: {e}"),
            });
        }

        let ticks = self.clock.advance(delta.as_secs_f32());
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn tick(&mut self) {
        let dt = self.clock.fixed_delta();
        self.tick = self.tick.wrapping_add(1);

        self.update_phase(dt);
        self.step_racers(dt);

        if self.director.is_racing()
            && !self.racers.is_empty()
            && self.racers.values().all(|r| r.progress.is_finished())
            && self.director.show_results()
        {
            self.on_phase_changed(RacePhase::Results);
        }

        if self.tick % self.config.observer_interval.max(1) == 0 {
            self.broadcast_observers();
        }

        self.flush_race_events();

        for client in self.connections.cleanup_timed_out() {
            self.drop_racer(&client);
            self.pending_events
                .push_back(ServerEvent::ClientDisconnected {
                    client_id: client.client_id,
                    reason: DisconnectReason::Timeout,
                });
        }
    }

    fn update_phase(&mut self, dt: f32) {
        match self.director.phase() {
            RacePhase::Lobby => {
                let wanted = self.config.auto_start_racers;
                if wanted > 0 && self.racers.len() >= wanted {
                    self.begin_countdown();
                }
            }
            RacePhase::Countdown => {
                let seconds_left = self.director.countdown_remaining().ceil() as u32;
                if self.last_countdown_second != Some(seconds_left) && seconds_left > 0 {
                    self.last_countdown_second = Some(seconds_left);
                    self.broadcast_event(RaceEvent::CountdownTick { seconds_left });
                }
            }
            RacePhase::Results => {
                self.results_timer -= dt;
                if self.results_timer <= 0.0 {
                    self.director.abort_to_lobby();
                    self.on_phase_changed(RacePhase::Lobby);
                }
            }
            RacePhase::Race => {}
        }

        if let Some(phase) = self.director.update(dt) {
            self.on_phase_changed(phase);
        }
    }

    fn begin_countdown(&mut self) {
        if !self.director.request_countdown() {
            return;
        }

        let slots = self.config.max_clients;
        for racer in self.racers.values_mut() {
            racer.place_on_grid(self.config.track.spawn_point(racer.slot, slots));
        }
        self.last_countdown_second = None;
        self.on_phase_changed(RacePhase::Countdown);
    }

    fn on_phase_changed(&mut self, phase: RacePhase) {
        match phase {
            RacePhase::Race => {
                let start = self.director.race_time();
                for racer in self.racers.values_mut() {
                    racer.reset_for_race(&self.config.track, start);
                }
                self.finished_count = 0;
            }
            RacePhase::Results => {
                self.results_timer = self.config.results_seconds;
            }
            RacePhase::Lobby | RacePhase::Countdown => {}
        }

        self.pending_events
            .push_back(ServerEvent::PhaseChanged { phase });
        self.broadcast_event(RaceEvent::PhaseChanged { phase });
    }

    fn step_racers(&mut self, dt: f32) {
        let racing = self.director.is_racing();
        let race_time = self.director.race_time();
        let mut echoes = Vec::new();
        let mut crossings = Vec::new();

        for racer in self.racers.values_mut() {
            if let Some(echo) = racer.entity.step(self.tick, dt) {
                echoes.push((racer.client_id, echo));
            }
            if let Some(crossing) = racer.check_gates(racing, race_time) {
                let lap = racer.progress.current_lap();
                let lap_time = racer.progress.lap_times().last().copied();
                let finish_time = racer.progress.finish_time();
                crossings.push((racer.entity_id(), crossing, lap, lap_time, finish_time));
            }
        }

        for (client_id, echo) in echoes {
            if let Some(client) = self.connections.get_mut(client_id) {
                let payload = PacketType::OwnerState(echo);
                if let Err(e) = send_to_client(&mut self.endpoint, client, payload) {
                    debug!("failed to send owner state to client {client_id}: {e}");
                }
            }
        }

        for (entity_id, crossing, lap, lap_time, finish_time) in crossings {
            self.broadcast_event(RaceEvent::CheckpointPassed {
                entity_id,
                checkpoint: crossing.checkpoint,
                lap,
                sector_time: crossing.sector_time,
            });

            if crossing.lap_completed {
                let lap_time = lap_time.unwrap_or(crossing.sector_time);
                self.pending_events.push_back(ServerEvent::LapCompleted {
                    entity_id,
                    lap,
                    lap_time,
                });
                self.broadcast_event(RaceEvent::LapCompleted {
                    entity_id,
                    lap,
                    lap_time,
                });
            }

            if crossing.race_completed {
                self.finished_count += 1;
                let place = self.finished_count;
                let finish_time = finish_time.unwrap_or(race_time);
                self.pending_events.push_back(ServerEvent::RacerFinished {
                    entity_id,
                    place,
                    finish_time,
                });
                self.broadcast_event(RaceEvent::RacerFinished {
                    entity_id,
                    place,
                    finish_time,
                });
            }
        }
    }

    fn broadcast_observers(&mut self) {
        let snapshots: Vec<ObserverSnapshot> = self
            .racers
            .values()
            .map(|racer| racer.entity.observer_snapshot(self.tick))
            .collect();
        if snapshots.is_empty() {
            return;
        }

        let tick = self.tick;
        for client in self.connections.connected_mut() {
            let own = client.entity_id;
            let entities: Vec<ObserverSnapshot> = snapshots
                .iter()
                .filter(|s| Some(s.entity_id) != own)
                .copied()
                .collect();

            for payload in PacketType::observer_batches(tick, &entities) {
                if let Err(e) = send_to_client(&mut self.endpoint, client, payload) {
                    warn!("failed to send observers to {}: {e}", client.addr);
                }
            }
        }
    }

    fn broadcast_event(&mut self, event: RaceEvent) {
        let now_ms = self.now_ms();
        for client in self.connections.connected_mut() {
            client.events.push(now_ms, event.clone());
        }
    }

    fn flush_race_events(&mut self) {
        let now_ms = self.now_ms();
        let resend_ms = self.config.event_resend_ms;

        for client in self.connections.connected_mut() {
            for (sequence, event) in client.events.collect_due(now_ms, resend_ms) {
                if let Err(e) = send_to_client(
                    &mut self.endpoint,
                    client,
                    PacketType::RaceEvent { sequence, event },
                ) {
                    debug!("failed to send race event to {}: {e}", client.addr);
                }
            }
            client.events.cleanup(now_ms);
        }
    }

    fn drop_racer(&mut self, client: &ClientConnection) {
        if let Some(entity_id) = client.entity_id {
            self.racers.remove(&entity_id);
        }
        if self.racers.is_empty() && self.director.phase() != RacePhase::Lobby {
            self.director.abort_to_lobby();
            self.on_phase_changed(RacePhase::Lobby);
        }
    }

    fn process_network(&mut self) -> io::Result<()> {
        let packets = self.endpoint.receive()?;

        for (packet, addr) in packets {
            if let Err(e) = self.handle_packet(packet, addr) {
                warn!("failed to answer {addr}: {e}");
            }
        }

        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) -> io::Result<()> {
        trace!("{} from {addr}", packet.payload.name());

        match packet.payload {
            PacketType::ConnectionRequest { client_salt } => {
                self.handle_connection_request(addr, client_salt)?;
            }
            PacketType::ChallengeResponse { combined_salt } => {
                self.handle_challenge_response(addr, combined_salt)?;
            }
            PacketType::Input { frame } => self.handle_input(addr, &frame),
            PacketType::StatePush {
                tick,
                position,
                yaw_deg,
            } => self.handle_state_push(addr, tick, position, yaw_deg),
            PacketType::EventAck { sequence } => {
                if let Some(client) = self.connections.get_by_addr_mut(&addr) {
                    client.events.ack(sequence);
                }
            }
            PacketType::RaceStart => {
                if self.is_connected(&addr) && self.director.phase() == RacePhase::Lobby {
                    self.begin_countdown();
                }
            }
            PacketType::Ping { timestamp } => {
                let packet = self.endpoint.create_packet(PacketType::Pong { timestamp });
                self.endpoint.send_to(&packet, addr)?;
            }
            PacketType::Disconnect => {
                self.handle_disconnect(addr);
            }
            other => {
                warn!("unexpected {} from {addr}", other.name());
            }
        }

        if let Some(client) = self.connections.get_by_addr_mut(&addr) {
            client.touch();
        }

        Ok(())
    }

    fn is_connected(&self, addr: &SocketAddr) -> bool {
        self.connections
            .get_by_addr(addr)
            .is_some_and(|c| c.is_connected())
    }

    fn owned_racer(&mut self, addr: &SocketAddr) -> Option<&mut Racer> {
        let client = self.connections.get_by_addr(addr)?;
        if !client.is_connected() {
            return None;
        }
        let entity_id = client.entity_id?;
        self.racers.get_mut(&entity_id)
    }

    fn handle_connection_request(&mut self, addr: SocketAddr, client_salt: u64) -> io::Result<()> {
        self.pending_events
            .push_back(ServerEvent::ClientConnecting { addr });

        let client = match self.connections.get_or_create_pending(addr, client_salt) {
            Ok(c) => c,
            Err(reason) => {
                let packet = self.endpoint.create_packet(PacketType::ConnectionDenied {
                    reason: reason.to_string(),
                });
                self.endpoint.send_to(&packet, addr)?;
                self.pending_events
                    .push_back(ServerEvent::ConnectionDenied {
                        addr,
                        reason: reason.to_string(),
                    });
                return Ok(());
            }
        };

        let server_salt = client.server_salt;
        let challenge = client.combined_salt();
        send_to_client(
            &mut self.endpoint,
            client,
            PacketType::ConnectionChallenge {
                server_salt,
                challenge,
            },
        )?;

        Ok(())
    }

    fn handle_challenge_response(
        &mut self,
        addr: SocketAddr,
        combined_salt: u64,
    ) -> io::Result<()> {
        let Some(client) = self.connections.get_by_addr_mut(&addr) else {
            return Ok(());
        };

        if combined_salt != client.combined_salt() {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("Invalid challenge response from {addr}"),
            });
            return Ok(());
        }

        let client_id = client.client_id;
        let entity_id = match client.entity_id {
            Some(entity_id) => entity_id,
            None => {
                let entity_id = self.next_entity_id;
                self.next_entity_id += 1;
                client.entity_id = Some(entity_id);
                client.state = ConnectionState::Connected;

                let slot = free_grid_slot(&self.racers);
                let spawn = self.config.track.spawn_point(slot, self.config.max_clients);
                self.racers.insert(
                    entity_id,
                    Racer::new(
                        client_id,
                        entity_id,
                        slot,
                        self.config.authority,
                        self.config.motion.clone(),
                        &self.config.track,
                        spawn,
                        self.config.publish_interval,
                    ),
                );

                self.pending_events.push_back(ServerEvent::ClientConnected {
                    client_id,
                    addr,
                    entity_id,
                });
                entity_id
            }
        };

        let Some(racer) = self.racers.get(&entity_id) else {
            return Ok(());
        };
        let accepted = PacketType::ConnectionAccepted {
            client_id,
            entity_id,
            mode: racer.entity.mode(),
            tick_rate: self.config.tick_rate,
            server_tick: self.tick,
            spawn_position: racer.entity.position().to_array(),
            spawn_yaw_deg: racer.entity.yaw_deg(),
            track: self.config.track,
        };

        let now_ms = self.now_ms();
        let phase = self.director.phase();
        if let Some(client) = self.connections.get_mut(client_id) {
            send_to_client(&mut self.endpoint, client, accepted)?;
            if client.events.is_empty() {
                client.events.push(now_ms, RaceEvent::PhaseChanged { phase });
            }
        }

        Ok(())
    }

    fn handle_input(&mut self, addr: SocketAddr, frame: &[u8]) {
        let command = match InputFrame::unpack(frame) {
            Ok(command) => command,
            Err(e) => {
                debug!("dropping input from {addr}: {e}");
                return;
            }
        };

        if let Some(racer) = self.owned_racer(&addr) {
            if !racer.entity.receive_input(command) {
                debug!("entity {} does not take inputs", racer.entity_id());
            }
        }
    }

    fn handle_state_push(
        &mut self,
        addr: SocketAddr,
        tick: u32,
        position: [f32; 3],
        yaw_deg: f32,
    ) {
        if let Some(racer) = self.owned_racer(&addr) {
            let position = glam::Vec3::from_array(position);
            if !racer.entity.receive_state_push(tick, position, yaw_deg) {
                debug!("entity {} does not take state pushes", racer.entity_id());
            }
        }
    }

    fn handle_disconnect(&mut self, addr: SocketAddr) {
        if let Some(client) = self.connections.remove_by_addr(&addr) {
            self.drop_racer(&client);
            self.pending_events
                .push_back(ServerEvent::ClientDisconnected {
                    client_id: client.client_id,
                    reason: DisconnectReason::Graceful,
                });
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.tick,
            phase: self.director.phase(),
            race_time: self.director.race_time(),
            client_count: self.connections.connected_count(),
            max_clients: self.config.max_clients,
            racer_count: self.racers.len(),
            network_stats: self.endpoint.stats().clone(),
        }
    }
}

/// Lowest grid slot no current racer occupies.
fn free_grid_slot(racers: &BTreeMap<u32, Racer>) -> usize {
    let mut taken: Vec<usize> = racers.values().map(|r| r.slot).collect();
    taken.sort_unstable();
    taken
        .iter()
        .enumerate()
        .find(|&(index, &slot)| index != slot)
        .map_or(taken.len(), |(index, _)| index)
}

fn send_to_client(
    endpoint: &mut NetworkEndpoint,
    client: &mut ClientConnection,
    payload: PacketType,
) -> io::Result<usize> {
    let packet = Packet::new(PacketHeader::new(client.next_sequence()), payload);
    endpoint.send_to(&packet, client.addr)
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u32,
    pub phase: RacePhase,
    pub race_time: f32,
    pub client_count: usize,
    pub max_clients: usize,
    pub racer_count: usize,
    pub network_stats: NetworkStats,
}

impl ServerStats {
    pub fn log(&self) {
        log::info!(
            "tick {} | {} {:.1}s | clients {}/{} | racers {} | sent {} recv {} rejected {}",
            self.tick,
            self.phase.as_str(),
            self.race_time,
            self.client_count,
            self.max_clients,
            self.racer_count,
            self.network_stats.packets_sent,
            self.network_stats.packets_received,
            self.network_stats.packets_rejected,
        );
    }
}
