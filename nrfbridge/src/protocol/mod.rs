/// Start byte for packets with a one-byte length.
pub const START_SHORT: u8 = 0x02;
/// Start byte for packets with a big-endian two-byte length.
pub const START_LONG: u8 = 0x03;
/// End byte for all packets.
pub const END: u8 = 0x03;

/// Largest payload a packet decoder buffers, and the largest we send.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// Ticks without a byte before a half-received packet is discarded.
pub const RX_TIMEOUT_TICKS: u8 = 2;

/// Largest single transmission on the packet radio (ESB payload).
pub const RADIO_MAX_FRAME_LEN: usize = 32;

/// Largest radio payload we can wrap, leaving room for the checksum.
pub const RADIO_MAX_PAYLOAD_LEN: usize = RADIO_MAX_FRAME_LEN - 2;

/// Suppression window armed by firmware-update traffic, in ticks.
pub const SUPPRESSION_TICKS: u16 = 5000;

/// Suppression and packet timeout tick period.
pub const TICK_PERIOD_MS: u32 = 1;

/// Heartbeat period.
pub const HEARTBEAT_PERIOD_MS: u32 = 1000;

/// Largest print packet, including the opcode.
pub const PRINT_MAX_LEN: usize = 255;

/// Serial line rate to the motor controller.
pub const BAUD_RATE: u32 = 115200;

pub mod crc;
pub use crc::{CrcConstant, CrcStyle, CrcXModem};

mod command;
pub use command::*;

pub mod parse;
pub use parse::{Decoded, PacketDecoder};

pub mod serialize;
pub use serialize::{serialize_packet, PacketError, Serializer};

mod radio;
pub use radio::*;
