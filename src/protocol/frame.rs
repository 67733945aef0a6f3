//! Frame struct with typed accessors.
//!
//! A frame owns its payload as `bytes::Bytes`, so a reply captured by the
//! session can outlive the receive call without copying.
//!
//! # Example
//!
//! ```
//! use scriptwire_host::protocol::{opcodes, Frame};
//!
//! let frame = Frame::from_parts(opcodes::PRINT, b"hello");
//! assert_eq!(frame.opcode(), opcodes::PRINT);
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command opcode.
    pub opcode: u8,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from an opcode and payload.
    pub fn new(opcode: u8, payload: Bytes) -> Self {
        Self { opcode, payload }
    }

    /// Create a frame from raw bytes (copies data).
    pub fn from_parts(opcode: u8, payload: &[u8]) -> Self {
        Self {
            opcode,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Create a frame with an empty payload.
    pub fn empty(opcode: u8) -> Self {
        Self {
            opcode,
            payload: Bytes::new(),
        }
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Header describing this frame.
    pub fn header(&self) -> Header {
        Header::new(self.opcode, self.payload.len() as u32)
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use scriptwire_host::protocol::{build_frame, opcodes};
///
/// let bytes = build_frame(opcodes::PRINT, b"hi");
/// assert_eq!(bytes, [0x02, 2, 0, 0, 0, b'h', b'i']);
/// ```
pub fn build_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&Header::new(opcode, payload.len() as u32).encode());
    buf.extend_from_slice(payload);
    buf
}
