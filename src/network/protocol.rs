//! Protocol Messages
//!
//! Two wire formats live here:
//!
//! - The **state delta**: a bit-packed player update whose header declares
//!   which fields follow. Sent peer to peer as an opaque payload.
//! - The **relay frame**: bincode envelope exchanged with the WebSocket
//!   relay, carrying those payloads between peers.
//!
//! ## State Delta Layout
//!
//! ```text
//! u8   header            bit0 direction, bit1 position, bit2 facing
//! u8   direction_flags   iff bit0
//! u32  packed_position   iff bit1, little-endian, binary16 x low, y high
//! u8   facing            iff bit2
//! ```
//!
//! There is no sequence number. Deltas must arrive in order, exactly once.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::half::{pack_half2, unpack_half2};
use crate::core::vec2::Vec2;
use crate::game::direction::{DirectionFlags, Facing};
use crate::game::player::{PeerId, PlayerEntity};

// =============================================================================
// HEADER
// =============================================================================

/// Field-presence mask of a state delta.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StateChangeHeader(u8);

impl StateChangeHeader {
    /// Direction flags follow.
    pub const DIRECTION_CHANGED: u8 = 0x01;
    /// Packed position follows.
    pub const POSITION_UPDATED: u8 = 0x02;
    /// Facing byte follows.
    pub const FACING_UPDATED: u8 = 0x04;

    const KNOWN: u8 = Self::DIRECTION_CHANGED | Self::POSITION_UPDATED | Self::FACING_UPDATED;

    /// Parse a header byte, rejecting unknown bits.
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        if byte & !Self::KNOWN != 0 {
            return Err(DecodeError::UnknownHeaderBits(byte));
        }
        Ok(Self(byte))
    }

    /// Raw header byte.
    #[inline]
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Check if a field bit is set.
    #[inline]
    pub fn has(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    fn set(&mut self, bit: u8) {
        self.0 |= bit;
    }
}

impl fmt::Debug for StateChangeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateChangeHeader({:#05b})", self.0)
    }
}

/// State delta decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// No bytes at all.
    #[error("Empty message")]
    Empty,

    /// Header declares a field whose bytes are missing.
    #[error("Truncated {field}: need {needed} bytes, {available} available")]
    Truncated {
        /// Field being read
        field: &'static str,
        /// Bytes the field needs
        needed: usize,
        /// Bytes left in the message
        available: usize,
    },

    /// Header has bits outside the known field mask.
    #[error("Unknown header bits in {0:#04x}")]
    UnknownHeaderBits(u8),

    /// Facing byte is not a known facing.
    #[error("Invalid facing byte {0}")]
    InvalidFacing(u8),

    /// Position decoded to infinity or NaN.
    #[error("Non-finite position {0:#010x}")]
    NonFinitePosition(u32),

    /// Bytes left over after the declared fields.
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

// =============================================================================
// STATE DELTA
// =============================================================================

/// A partial player update. `None` fields are absent from the message and
/// left untouched by [`apply`](Self::apply).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StateDelta {
    /// Direction flags
    pub direction: Option<DirectionFlags>,
    /// Position (half precision on the wire)
    pub position: Option<Vec2>,
    /// Facing
    pub facing: Option<Facing>,
}

impl StateDelta {
    /// Delta carrying every field of an entity.
    pub fn full(entity: &PlayerEntity) -> Self {
        Self {
            direction: Some(entity.state.direction()),
            position: Some(entity.position()),
            facing: Some(entity.facing()),
        }
    }

    /// Header describing the fields present.
    pub fn header(&self) -> StateChangeHeader {
        let mut header = StateChangeHeader::default();
        if self.direction.is_some() {
            header.set(StateChangeHeader::DIRECTION_CHANGED);
        }
        if self.position.is_some() {
            header.set(StateChangeHeader::POSITION_UPDATED);
        }
        if self.facing.is_some() {
            header.set(StateChangeHeader::FACING_UPDATED);
        }
        header
    }

    /// Check if no field is present.
    pub fn is_empty(&self) -> bool {
        self.direction.is_none() && self.position.is_none() && self.facing.is_none()
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        1 + self.direction.map_or(0, |_| 1) + self.position.map_or(0, |_| 4) + self.facing.map_or(0, |_| 1)
    }

    /// Append the encoded delta to a buffer.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.encoded_len());
        buf.push(self.header().bits());
        if let Some(direction) = self.direction {
            buf.push(direction.bits());
        }
        if let Some(position) = self.position {
            buf.extend_from_slice(&pack_half2(position).to_le_bytes());
        }
        if let Some(facing) = self.facing {
            buf.push(facing.to_byte());
        }
    }

    /// Encode to a new buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode a delta, reading only the fields the header declares.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&first, mut rest) = bytes.split_first().ok_or(DecodeError::Empty)?;
        let header = StateChangeHeader::from_byte(first)?;
        let mut delta = Self::default();

        if header.has(StateChangeHeader::DIRECTION_CHANGED) {
            let [byte] = take::<1>(&mut rest, "direction")?;
            delta.direction = Some(DirectionFlags::from_bits(byte));
        }
        if header.has(StateChangeHeader::POSITION_UPDATED) {
            let packed = u32::from_le_bytes(take::<4>(&mut rest, "position")?);
            let position = unpack_half2(packed);
            if !position.x.is_finite() || !position.y.is_finite() {
                return Err(DecodeError::NonFinitePosition(packed));
            }
            delta.position = Some(position);
        }
        if header.has(StateChangeHeader::FACING_UPDATED) {
            let [byte] = take::<1>(&mut rest, "facing")?;
            delta.facing = Some(Facing::from_byte(byte).ok_or(DecodeError::InvalidFacing(byte))?);
        }

        if !rest.is_empty() {
            return Err(DecodeError::TrailingBytes(rest.len()));
        }
        Ok(delta)
    }

    /// Write the present fields into an entity and activate it.
    ///
    /// Order is direction (a nonzero mask recomputes facing), position, then
    /// the explicit facing.
    pub fn apply(&self, target: &mut PlayerEntity) {
        if let Some(direction) = self.direction {
            target.state.set_direction(direction);
        }
        if let Some(position) = self.position {
            target.set_position(position);
        }
        if let Some(facing) = self.facing {
            target.state.set_facing(facing);
        }
        target.state.set_active(true);
    }
}

fn take<const N: usize>(rest: &mut &[u8], field: &'static str) -> Result<[u8; N], DecodeError> {
    if rest.len() < N {
        return Err(DecodeError::Truncated {
            field,
            needed: N,
            available: rest.len(),
        });
    }
    let (head, tail) = rest.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    *rest = tail;
    Ok(out)
}

// =============================================================================
// SYNC POLICY
// =============================================================================

/// Which fields each outgoing update carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Every field, every tick.
    #[default]
    FullState,
    /// Only fields that changed since the last update sent to that peer.
    ChangedOnly,
}

/// Remembers what was last sent to one peer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeltaTracker {
    last: Option<(DirectionFlags, u32, Facing)>,
}

impl DeltaTracker {
    /// Create a tracker that has sent nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the next outgoing delta, or `None` when there is nothing to send.
    ///
    /// Positions are compared in their packed wire form.
    pub fn next_delta(&mut self, policy: SyncPolicy, entity: &PlayerEntity) -> Option<StateDelta> {
        let full = StateDelta::full(entity);
        let current = (
            entity.state.direction(),
            pack_half2(entity.position()),
            entity.facing(),
        );
        let previous = self.last.replace(current);

        let (direction, packed, facing) = match (policy, previous) {
            (SyncPolicy::FullState, _) | (_, None) => return Some(full),
            (SyncPolicy::ChangedOnly, Some(previous)) => previous,
        };

        let mut delta = StateDelta::default();
        if direction != current.0 {
            delta.direction = full.direction;
        }
        if packed != current.1 {
            delta.position = full.position;
        }
        // A direction update recomputes facing on the receiver
        if facing != current.2 || delta.direction.is_some() {
            delta.facing = full.facing;
        }

        (!delta.is_empty()).then_some(delta)
    }

    /// Forget the last sent state so the next delta is full.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

// =============================================================================
// RELAY FRAMES
// =============================================================================

/// Envelope exchanged between a client and the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayFrame {
    /// Relay assigned this connection an id.
    Welcome {
        /// Assigned id
        id: PeerId,
    },
    /// Another peer connected.
    PeerJoined {
        /// Joining peer
        id: PeerId,
    },
    /// Another peer disconnected.
    PeerLeft {
        /// Leaving peer
        id: PeerId,
    },
    /// Opaque payload. `peer` is the destination on the way in and the
    /// source on the way out.
    Data {
        /// Destination or source peer
        peer: PeerId,
        /// Payload bytes
        payload: Vec<u8>,
    },
}

impl RelayFrame {
    /// Serialize to binary (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

// =============================================================================
// TESTS
// =============================================================================
