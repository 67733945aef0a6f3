//! Wire format encoding and decoding.
//!
//! Every frame starts with a 5-byte header:
//! ```text
//! ┌────────┬──────────┐
//! │ Opcode │ Length   │
//! │ 1 byte │ 4 bytes  │
//! │        │ uint32 LE│
//! └────────┴──────────┘
//! ```
//!
//! All multi-byte integers, in the header and in payloads, are little endian.

use crate::error::{BridgeError, Result};

/// Header size in bytes (fixed, exactly 5).
pub const HEADER_SIZE: usize = 5;

/// Default maximum payload size, matching the remote runtime's network buffer.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 20_000;

/// Opcode constants.
///
/// Inbound (remote to host) and outbound (host to remote) opcodes are
/// disjoint sets.
pub mod opcodes {
    /// Request a pong.
    pub const PING: u8 = 0x01;
    /// Print text through the host log.
    pub const PRINT: u8 = 0x02;
    /// Response to a public call.
    pub const RESPONSE: u8 = 0x03;
    /// The remote is about to reconnect.
    pub const RECONNECT: u8 = 0x04;
    /// Register interest in a callback.
    pub const REGISTER_CALL: u8 = 0x05;
    /// Look up a native handle.
    pub const FIND_NATIVE: u8 = 0x06;
    /// Invoke a native.
    pub const INVOKE_NATIVE: u8 = 0x07;
    /// The remote finished booting.
    pub const START: u8 = 0x08;
    /// The remote is about to disconnect.
    pub const DISCONNECT: u8 = 0x09;
    /// Sign of life.
    pub const ALIVE: u8 = 0x10;

    /// Host heartbeat.
    pub const TICK: u8 = 0x11;
    /// Ping reply.
    pub const PONG: u8 = 0x12;
    /// Deliver a host callback.
    pub const PUBLIC_CALL: u8 = 0x13;
    /// Reply to a native lookup or invocation.
    pub const REPLY: u8 = 0x14;
    /// Announce protocol and build version.
    pub const ANNOUNCE: u8 = 0x15;

    /// Check whether an opcode travels from the host to the remote.
    #[inline]
    pub fn is_outbound(opcode: u8) -> bool {
        (TICK..=ANNOUNCE).contains(&opcode)
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command opcode (see [`opcodes`]).
    pub opcode: u8,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(opcode: u8, payload_length: u32) -> Self {
        Self {
            opcode,
            payload_length,
        }
    }

    /// Encode header to bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use scriptwire_host::protocol::{opcodes, Header};
    ///
    /// let bytes = Header::new(opcodes::TICK, 0).encode();
    /// assert_eq!(bytes, [0x11, 0, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.opcode;
        buf[1..5].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            opcode: buf[0],
            payload_length: u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]),
        })
    }

    /// Check the declared payload length against a limit.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(BridgeError::PayloadTooLarge {
                len: self.payload_length as usize,
                max: max_payload_size as usize,
            });
        }
        Ok(())
    }
}
