use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::event::RaceEvent;
use crate::input::{INPUT_FRAME_LEN, InputFrame};
use crate::prediction::{AuthorityMode, ObserverSnapshot, OwnerSnapshot};
use crate::race::TrackDescription;

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x484F_4F46;
pub const DEFAULT_PORT: u16 = 27315;
pub const DEFAULT_TICK_RATE: u32 = 60;
/// Entities per `Observers` packet. 32 entries serialize to about 850 bytes.
pub const MAX_OBSERVERS_PER_PACKET: usize = 32;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    ConnectionRequest {
        client_salt: u64,
    },
    ConnectionChallenge {
        server_salt: u64,
        challenge: u64,
    },
    ChallengeResponse {
        combined_salt: u64,
    },
    ConnectionAccepted {
        client_id: u32,
        entity_id: u32,
        mode: AuthorityMode,
        tick_rate: u32,
        server_tick: u32,
        spawn_position: [f32; 3],
        spawn_yaw_deg: f32,
        track: TrackDescription,
    },
    ConnectionDenied {
        reason: String,
    },
    /// Packed [`InputFrame`] of the owner's input for one tick.
    Input {
        frame: [u8; INPUT_FRAME_LEN],
    },
    StatePush {
        tick: u32,
        position: [f32; 3],
        yaw_deg: f32,
    },
    OwnerState(OwnerSnapshot),
    Observers {
        tick: u32,
        entities: Vec<ObserverSnapshot>,
    },
    RaceEvent {
        sequence: u32,
        event: RaceEvent,
    },
    EventAck {
        sequence: u32,
    },
    RaceStart,
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
    Disconnect,
}

impl PacketType {
    pub fn input(frame: InputFrame) -> Self {
        PacketType::Input { frame: frame.0 }
    }

    /// Splits one observer broadcast into packets that each fit the size
    /// limit. Empty input yields no packets.
    pub fn observer_batches(tick: u32, entities: &[ObserverSnapshot]) -> Vec<Self> {
        entities
            .chunks(MAX_OBSERVERS_PER_PACKET)
            .map(|chunk| PacketType::Observers {
                tick,
                entities: chunk.to_vec(),
            })
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            PacketType::ConnectionRequest { .. } => "ConnectionRequest",
            PacketType::ConnectionChallenge { .. } => "ConnectionChallenge",
            PacketType::ChallengeResponse { .. } => "ChallengeResponse",
            PacketType::ConnectionAccepted { .. } => "ConnectionAccepted",
            PacketType::ConnectionDenied { .. } => "ConnectionDenied",
            PacketType::Input { .. } => "Input",
            PacketType::StatePush { .. } => "StatePush",
            PacketType::OwnerState(_) => "OwnerState",
            PacketType::Observers { .. } => "Observers",
            PacketType::RaceEvent { .. } => "RaceEvent",
            PacketType::EventAck { .. } => "EventAck",
            PacketType::RaceStart => "RaceStart",
            PacketType::Ping { .. } => "Ping",
            PacketType::Pong { .. } => "Pong",
            PacketType::Disconnect => "Disconnect",
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("packet of {size} bytes exceeds the 1200 byte limit")]
    TooLarge { size: usize },
}

impl Packet {
    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let data = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)?;

        if data.len() > MAX_PACKET_SIZE {
            return Err(PacketError::TooLarge { size: data.len() });
        }
        Ok(data)
    }

    /// Decodes a datagram. The bytes are copied into an aligned buffer first
    /// since socket buffers carry no alignment guarantee.
    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(PacketError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputCommand, InputFlags};
    use crate::race::RacePhase;

    #[test]
    fn sequence_comparison_wraps() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    fn observer(entity_id: u32) -> ObserverSnapshot {
        ObserverSnapshot {
            entity_id,
            tick: u32::MAX,
            position: [f32::MAX, -1.0, f32::MIN],
            yaw_deg: 359.0,
        }
    }

    #[test]
    fn full_observer_batch_fits_one_datagram() {
        let entities: Vec<ObserverSnapshot> =
            (0..MAX_OBSERVERS_PER_PACKET as u32).map(observer).collect();
        let packet = Packet::new(
            PacketHeader::new(u32::MAX),
            PacketType::Observers {
                tick: u32::MAX,
                entities,
            },
        );

        let data = packet.serialize().unwrap();
        assert!(data.len() <= MAX_PACKET_SIZE);
    }

    #[test]
    fn large_lobbies_are_split_across_packets() {
        let entities: Vec<ObserverSnapshot> = (0..63).map(observer).collect();

        let oversized = Packet::new(
            PacketHeader::new(0),
            PacketType::Observers {
                tick: 5,
                entities: entities.clone(),
            },
        );
        assert!(matches!(
            oversized.serialize(),
            Err(PacketError::TooLarge { .. })
        ));

        let batches = PacketType::observer_batches(5, &entities);
        assert_eq!(batches.len(), 2);

        let mut seen = Vec::new();
        for payload in batches {
            let data = Packet::new(PacketHeader::new(0), payload).serialize().unwrap();
            match Packet::deserialize(&data).unwrap().payload {
                PacketType::Observers { tick, entities } => {
                    assert_eq!(tick, 5);
                    seen.extend(entities.iter().map(|e| e.entity_id));
                }
                other => panic!("unexpected payload {}", other.name()),
            }
        }
        assert_eq!(seen, (0..63).collect::<Vec<u32>>());

        assert!(PacketType::observer_batches(5, &[]).is_empty());
    }

    #[test]
    fn input_packet_round_trip() {
        let command = InputCommand::new(812)
            .with_axes(0.5, -1.0)
            .with_flags(InputFlags::DRIFT);
        let packet = Packet::new(
            PacketHeader::new(3),
            PacketType::input(InputFrame::pack(&command)),
        );

        let data = packet.serialize().unwrap();
        let decoded = Packet::deserialize(&data).unwrap();

        assert_eq!(decoded.header, packet.header);
        match decoded.payload {
            PacketType::Input { frame } => {
                let decoded = InputFrame::unpack(&frame).unwrap();
                assert_eq!(decoded.tick, 812);
                assert_eq!(decoded.flags, InputFlags::DRIFT);
            }
            other => panic!("unexpected payload {}", other.name()),
        }
    }

    #[test]
    fn accepted_packet_carries_track() {
        let track = TrackDescription::default();
        let packet = Packet::new(
            PacketHeader::new(0),
            PacketType::ConnectionAccepted {
                client_id: 1,
                entity_id: 7,
                mode: AuthorityMode::ClientAuthoritative,
                tick_rate: 60,
                server_tick: 1234,
                spawn_position: [1.0, 0.0, -2.0],
                spawn_yaw_deg: 90.0,
                track,
            },
        );

        let decoded = Packet::deserialize(&packet.serialize().unwrap()).unwrap();
        match decoded.payload {
            PacketType::ConnectionAccepted {
                entity_id,
                mode,
                track: received,
                ..
            } => {
                assert_eq!(entity_id, 7);
                assert_eq!(mode, AuthorityMode::ClientAuthoritative);
                assert_eq!(received, track);
            }
            other => panic!("unexpected payload {}", other.name()),
        }
    }

    #[test]
    fn race_event_round_trip() {
        let packet = Packet::new(
            PacketHeader::new(9),
            PacketType::RaceEvent {
                sequence: 4,
                event: RaceEvent::PhaseChanged {
                    phase: RacePhase::Countdown,
                },
            },
        );

        let decoded = Packet::deserialize(&packet.serialize().unwrap()).unwrap();
        assert!(matches!(
            decoded.payload,
            PacketType::RaceEvent {
                sequence: 4,
                event: RaceEvent::PhaseChanged {
                    phase: RacePhase::Countdown
                }
            }
        ));
    }

    #[test]
    fn oversized_packets_are_rejected() {
        let entities = (0..200)
            .map(|id| ObserverSnapshot {
                entity_id: id,
                tick: 0,
                position: [0.0; 3],
                yaw_deg: 0.0,
            })
            .collect();
        let packet = Packet::new(
            PacketHeader::new(0),
            PacketType::Observers { tick: 0, entities },
        );

        assert!(matches!(
            packet.serialize(),
            Err(PacketError::TooLarge { .. })
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(Packet::deserialize(&[0xFF; 5]).is_err());
    }
}
