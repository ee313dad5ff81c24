use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use rkyv::{Archive, Deserialize, Serialize};

use crate::input::InputCommand;
use crate::motion::{MotionConfig, MotionModel};
use crate::validation::MovementValidator;

/// Headroom over the motion model's peak rates before a client push is clamped.
const VALIDATION_SLACK: f32 = 1.1;

/// Which side integrates an entity's motion. Fixed for the entity's lifetime.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[rkyv(compare(PartialEq), derive(Debug))]
#[serde(rename_all = "snake_case")]
pub enum AuthorityMode {
    /// The owner sends inputs and the server simulates.
    #[default]
    ServerAuthoritative,
    /// The owner simulates and pushes its transform; the server validates it.
    ClientAuthoritative,
}

impl AuthorityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityMode::ServerAuthoritative => "server",
            AuthorityMode::ClientAuthoritative => "client",
        }
    }
}

impl fmt::Display for AuthorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" | "server-authoritative" => Ok(AuthorityMode::ServerAuthoritative),
            "client" | "client-authoritative" => Ok(AuthorityMode::ClientAuthoritative),
            other => Err(format!("unknown authority mode '{other}' (expected server or client)")),
        }
    }
}

/// Authoritative echo sent to the owning client.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct OwnerSnapshot {
    pub entity_id: u32,
    pub tick: u32,
    pub position: [f32; 3],
    pub yaw_deg: f32,
    /// Client tick of the input (or state push) the server last consumed.
    pub echoed_input_tick: u32,
}

impl OwnerSnapshot {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// Transform broadcast to everyone who does not own the entity.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ObserverSnapshot {
    pub entity_id: u32,
    pub tick: u32,
    pub position: [f32; 3],
    pub yaw_deg: f32,
}

impl ObserverSnapshot {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

#[derive(Debug, Clone)]
enum Drive {
    Simulated {
        model: MotionModel,
        latest: Option<InputCommand>,
    },
    Validated {
        validator: MovementValidator,
        pending: Option<(u32, Vec3, f32)>,
    },
}

/// Server-side owner of one racer's transform.
#[derive(Debug, Clone)]
pub struct AuthoritativeEntity {
    entity_id: u32,
    mode: AuthorityMode,
    drive: Drive,
    position: Vec3,
    yaw_deg: f32,
    sim_time: f32,
    echoed_input_tick: Option<u32>,
    publish_interval: u32,
    ticks_since_publish: u32,
}

impl AuthoritativeEntity {
    pub fn new(
        entity_id: u32,
        mode: AuthorityMode,
        motion: MotionConfig,
        position: Vec3,
        yaw_deg: f32,
        publish_interval: u32,
    ) -> Self {
        let drive = match mode {
            AuthorityMode::ServerAuthoritative => Drive::Simulated {
                model: MotionModel::new(motion, yaw_deg),
                latest: None,
            },
            AuthorityMode::ClientAuthoritative => Drive::Validated {
                validator: MovementValidator::new(
                    position,
                    yaw_deg,
                    0.0,
                    motion.peak_speed() * VALIDATION_SLACK,
                    motion.peak_turn_rate() * VALIDATION_SLACK,
                ),
                pending: None,
            },
        };

        Self {
            entity_id,
            mode,
            drive,
            position,
            yaw_deg,
            sim_time: 0.0,
            echoed_input_tick: None,
            publish_interval: publish_interval.max(1),
            ticks_since_publish: 0,
        }
    }

    pub fn entity_id(&self) -> u32 {
        self.entity_id
    }

    pub fn mode(&self) -> AuthorityMode {
        self.mode
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    pub fn echoed_input_tick(&self) -> Option<u32> {
        self.echoed_input_tick
    }

    pub fn model(&self) -> Option<&MotionModel> {
        match &self.drive {
            Drive::Simulated { model, .. } => Some(model),
            Drive::Validated { .. } => None,
        }
    }

    /// Moves the entity without validation and forgets any held input, e.g.
    /// when racers are put back on the grid.
    pub fn teleport(&mut self, position: Vec3, yaw_deg: f32) {
        self.position = position;
        self.yaw_deg = yaw_deg;
        match &mut self.drive {
            Drive::Simulated { model, latest } => {
                *model = MotionModel::new(model.config().clone(), yaw_deg);
                *latest = None;
            }
            Drive::Validated { validator, pending } => {
                validator.reset(position, yaw_deg, self.sim_time);
                *pending = None;
            }
        }
    }

    /// Replaces the held command. The most recently received command wins
    /// even if it carries an older tick. Returns `false` for entities whose
    /// owner is not supposed to send inputs.
    pub fn receive_input(&mut self, command: InputCommand) -> bool {
        match &mut self.drive {
            Drive::Simulated { latest, .. } => {
                *latest = Some(command.sanitized());
                true
            }
            Drive::Validated { .. } => false,
        }
    }

    /// Holds a client-claimed transform until the next tick validates it.
    pub fn receive_state_push(&mut self, tick: u32, position: Vec3, yaw_deg: f32) -> bool {
        match &mut self.drive {
            Drive::Validated { pending, .. } => {
                *pending = Some((tick, position, yaw_deg));
                true
            }
            Drive::Simulated { .. } => false,
        }
    }

    /// Advances one fixed tick and returns the owner echo when the publish
    /// interval elapses.
    pub fn step(&mut self, server_tick: u32, dt: f32) -> Option<OwnerSnapshot> {
        self.sim_time += dt.max(0.0);

        match &mut self.drive {
            Drive::Simulated { model, latest } => {
                let command = latest.unwrap_or_default();
                let result = model.step_command(dt, &command);
                self.position.x += result.displacement.x;
                self.position.z += result.displacement.y;
                self.yaw_deg = result.yaw_deg;
                if let Some(command) = latest {
                    self.echoed_input_tick = Some(command.tick);
                }
            }
            Drive::Validated { validator, pending } => {
                if let Some((tick, position, yaw)) = pending.take() {
                    let (position, yaw) = validator.accept(position, yaw, self.sim_time);
                    self.position = position;
                    self.yaw_deg = yaw;
                    self.echoed_input_tick = Some(tick);
                }
            }
        }

        self.ticks_since_publish += 1;
        if self.ticks_since_publish < self.publish_interval {
            return None;
        }
        self.ticks_since_publish = 0;

        let echoed_input_tick = self.echoed_input_tick?;
        Some(OwnerSnapshot {
            entity_id: self.entity_id,
            tick: server_tick,
            position: self.position.to_array(),
            yaw_deg: self.yaw_deg,
            echoed_input_tick,
        })
    }

    pub fn observer_snapshot(&self, server_tick: u32) -> ObserverSnapshot {
        ObserverSnapshot {
            entity_id: self.entity_id,
            tick: server_tick,
            position: self.position.to_array(),
            yaw_deg: self.yaw_deg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputFlags;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn parses_authority_mode() {
        assert_eq!(
            "server".parse::<AuthorityMode>().ok(),
            Some(AuthorityMode::ServerAuthoritative)
        );
        assert_eq!(
            "Client".parse::<AuthorityMode>().ok(),
            Some(AuthorityMode::ClientAuthoritative)
        );
        assert!("peer".parse::<AuthorityMode>().is_err());
    }

    #[test]
    fn holds_last_received_input() {
        let mut entity = AuthoritativeEntity::new(
            1,
            AuthorityMode::ServerAuthoritative,
            MotionConfig::default(),
            Vec3::ZERO,
            0.0,
            1,
        );

        entity.receive_input(InputCommand::new(5).with_axes(1.0, 0.0));
        let first = entity.step(100, DT).unwrap();
        assert_eq!(first.echoed_input_tick, 5);

        // No new input arrives; the held command keeps driving.
        let second = entity.step(101, DT).unwrap();
        assert_eq!(second.echoed_input_tick, 5);
        assert!(second.position[2] > first.position[2]);

        // An older tick received later still replaces the held command.
        entity.receive_input(InputCommand::new(3).with_flags(InputFlags::BRAKE));
        let third = entity.step(102, DT).unwrap();
        assert_eq!(third.echoed_input_tick, 3);
    }

    #[test]
    fn publishes_on_interval() {
        let mut entity = AuthoritativeEntity::new(
            1,
            AuthorityMode::ServerAuthoritative,
            MotionConfig::default(),
            Vec3::ZERO,
            0.0,
            3,
        );
        entity.receive_input(InputCommand::new(0).with_axes(1.0, 0.0));

        let published: Vec<u32> = (0..9)
            .filter_map(|tick| entity.step(tick, DT))
            .map(|snapshot| snapshot.tick)
            .collect();
        assert_eq!(published, vec![2, 5, 8]);
    }

    #[test]
    fn nothing_to_echo_before_first_input() {
        let mut entity = AuthoritativeEntity::new(
            1,
            AuthorityMode::ServerAuthoritative,
            MotionConfig::default(),
            Vec3::ZERO,
            0.0,
            1,
        );

        assert!(entity.step(0, DT).is_none());
        assert_eq!(entity.position(), Vec3::ZERO);
    }

    #[test]
    fn client_pushes_are_clamped() {
        let motion = MotionConfig::default();
        let limit = motion.peak_speed() * VALIDATION_SLACK * DT;
        let mut entity = AuthoritativeEntity::new(
            2,
            AuthorityMode::ClientAuthoritative,
            motion,
            Vec3::ZERO,
            0.0,
            1,
        );

        assert!(!entity.receive_input(InputCommand::new(0)));
        assert!(entity.receive_state_push(7, Vec3::new(0.0, 0.0, 50.0), 0.0));

        let echo = entity.step(1, DT).unwrap();
        assert_eq!(echo.echoed_input_tick, 7);
        assert!((echo.position().z - limit).abs() < 1e-3);
    }

    #[test]
    fn teleport_resets_motion() {
        let mut entity = AuthoritativeEntity::new(
            3,
            AuthorityMode::ServerAuthoritative,
            MotionConfig::default(),
            Vec3::ZERO,
            0.0,
            1,
        );
        entity.receive_input(InputCommand::new(1).with_axes(1.0, 0.0));
        for tick in 0..30 {
            entity.step(tick, DT);
        }

        entity.teleport(Vec3::new(5.0, 0.0, 5.0), 180.0);
        assert_eq!(entity.model().map(|m| m.speed()), Some(0.0));

        entity.step(30, DT);
        assert_eq!(entity.position(), Vec3::new(5.0, 0.0, 5.0));
        assert_eq!(entity.yaw_deg(), 180.0);
    }

    #[test]
    fn observer_snapshot_mirrors_state() {
        let entity = AuthoritativeEntity::new(
            4,
            AuthorityMode::ServerAuthoritative,
            MotionConfig::default(),
            Vec3::new(1.0, 2.0, 3.0),
            90.0,
            1,
        );
        let snapshot = entity.observer_snapshot(12);

        assert_eq!(snapshot.entity_id, 4);
        assert_eq!(snapshot.tick, 12);
        assert_eq!(snapshot.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(snapshot.yaw_deg, 90.0);
    }
}
