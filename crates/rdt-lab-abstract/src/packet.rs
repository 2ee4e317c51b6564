use serde::{Deserialize, Serialize};

/// Number of payload bytes carried by every packet and DATA frame.
pub const PAYLOAD_LEN: usize = 20;

/// Value written into a sequence-bearing header field when the channel mangles it.
pub const CORRUPTED_FIELD: u32 = 999_999;

/// Byte written over the first payload byte when the channel mangles the payload.
pub const CORRUPTED_BYTE: u8 = b'Z';

pub type Payload = [u8; PAYLOAD_LEN];

/// Unit handed down from the application layer to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub data: Payload,
}

impl Packet {
    pub fn new(data: Payload) -> Self {
        Self { data }
    }

    /// Build a packet from arbitrary bytes, truncating or NUL-padding to [`PAYLOAD_LEN`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = [0u8; PAYLOAD_LEN];
        let len = bytes.len().min(PAYLOAD_LEN);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// A packet filled with one repeated byte and NUL-terminated.
    pub fn filled(byte: u8) -> Self {
        let mut data = [byte; PAYLOAD_LEN];
        data[PAYLOAD_LEN - 1] = 0;
        Self { data }
    }
}

/// Sum of both header numbers and every payload byte.
///
/// This is intentionally weak: compensating changes (e.g. +1 on one byte and
/// -1 on another) go unnoticed. The protocol must live with that.
pub fn checksum(seqnum: u32, acknum: u32, payload: &[u8]) -> u32 {
    payload
        .iter()
        .fold(seqnum.wrapping_add(acknum), |sum, &b| sum.wrapping_add(b as u32))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFrame {
    pub seqnum: u32,
    pub checksum: u32,
    pub payload: Payload,
}

impl DataFrame {
    /// Build a DATA frame with a freshly computed checksum.
    pub fn new(seqnum: u32, payload: Payload) -> Self {
        Self {
            seqnum,
            checksum: checksum(seqnum, 0, &payload),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckFrame {
    pub acknum: u32,
    pub checksum: u32,
}

impl AckFrame {
    pub fn new(acknum: u32) -> Self {
        Self {
            acknum,
            checksum: checksum(0, acknum, &[]),
        }
    }
}

/// Unit exchanged over the channel.
///
/// Frames are `Copy`: whoever hands a frame to someone else hands over a copy,
/// so no component ever observes a buffer another component can still mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Data(DataFrame),
    Ack(AckFrame),
}

/// Header field the channel picks to mangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corruption {
    Payload,
    SeqNum,
    AckNum,
}

impl Frame {
    pub fn is_data(&self) -> bool {
        matches!(self, Frame::Data(_))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Frame::Ack(_))
    }

    pub fn seqnum(&self) -> Option<u32> {
        match self {
            Frame::Data(data) => Some(data.seqnum),
            Frame::Ack(_) => None,
        }
    }

    pub fn acknum(&self) -> Option<u32> {
        match self {
            Frame::Data(_) => None,
            Frame::Ack(ack) => Some(ack.acknum),
        }
    }

    /// Checksum carried in the header.
    pub fn checksum(&self) -> u32 {
        match self {
            Frame::Data(data) => data.checksum,
            Frame::Ack(ack) => ack.checksum,
        }
    }

    /// Checksum recomputed from the current header and payload contents.
    pub fn compute_checksum(&self) -> u32 {
        match self {
            Frame::Data(data) => checksum(data.seqnum, 0, &data.payload),
            Frame::Ack(ack) => checksum(0, ack.acknum, &[]),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        self.checksum() != self.compute_checksum()
    }

    /// Mangle one field in place, leaving the stored checksum untouched.
    ///
    /// A target the variant does not carry falls back to the variant's own
    /// sequence-bearing field.
    pub fn corrupt(&mut self, target: Corruption) {
        match (self, target) {
            (Frame::Data(data), Corruption::Payload) => data.payload[0] = CORRUPTED_BYTE,
            (Frame::Data(data), Corruption::SeqNum | Corruption::AckNum) => {
                data.seqnum = CORRUPTED_FIELD
            }
            (Frame::Ack(ack), _) => ack.acknum = CORRUPTED_FIELD,
        }
    }
}

impl From<DataFrame> for Frame {
    fn from(frame: DataFrame) -> Self {
        Frame::Data(frame)
    }
}

impl From<AckFrame> for Frame {
    fn from(frame: AckFrame) -> Self {
        Frame::Ack(frame)
    }
}
