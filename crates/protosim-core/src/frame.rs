use serde::{Deserialize, Serialize};

use crate::packet::Packet;

/// Kind of link-layer frame. `Nak` is part of the type for data-model
/// completeness and to keep `match`es on `FrameKind` exhaustive, but
/// none of the six reference protocols ever construct one: they all
/// recover purely from timers, never from negative acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Data,
    Ack,
    Nak,
}

impl FrameKind {
    pub fn name(self) -> &'static str {
        match self {
            FrameKind::Data => "DATA",
            FrameKind::Ack => "ACK",
            FrameKind::Nak => "NAK",
        }
    }
}

/// Which logical flow a frame belongs to in a bidirectional protocol.
///
/// The reference protocols smuggle this through a payload-string
/// prefix ("A>"/"B>"); that convention is kept on `Packet::data` for
/// anyone inspecting a snapshot, but protocol logic should always
/// branch on this field, never on the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    AtoB,
    BtoA,
}

impl Direction {
    pub fn tag(self) -> &'static str {
        match self {
            Direction::AtoB => "A",
            Direction::BtoA => "B",
        }
    }

    pub fn flip(self) -> Direction {
        match self {
            Direction::AtoB => Direction::BtoA,
            Direction::BtoA => Direction::AtoB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub seq: u32,
    pub ack: u32,
    pub info: Packet,
    pub direction: Direction,
}

impl Frame {
    pub fn data(seq: u32, ack: u32, info: Packet, direction: Direction) -> Self {
        Self {
            kind: FrameKind::Data,
            seq,
            ack,
            info,
            direction,
        }
    }

    pub fn ack(ack: u32, info: Packet, direction: Direction) -> Self {
        Self {
            kind: FrameKind::Ack,
            seq: 0,
            ack,
            info,
            direction,
        }
    }
}
