//! Frame buffer for accumulating partial reads.
//!
//! The pipe delivers bytes in arbitrary chunks; this buffer turns them back
//! into whole frames. Parsing is a two-state machine:
//! - `AwaitingHeader`: need at least 5 bytes
//! - `AwaitingPayload`: header parsed, need N more payload bytes

use bytes::BytesMut;

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
enum State {
    AwaitingHeader,
    AwaitingPayload(Header),
}

/// Accumulates incoming bytes and extracts complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a frame buffer with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a frame buffer with a custom payload limit.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(HEADER_SIZE + max_payload_size as usize),
            state: State::AwaitingHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error if a header declares a payload above the limit. The
    /// stream cannot be resynchronized after that; callers drop the connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                State::AwaitingHeader => {
                    let Some(header) = Header::decode(&self.buffer) else {
                        return Ok(None);
                    };
                    header.validate(self.max_payload_size)?;
                    let _ = self.buffer.split_to(HEADER_SIZE);
                    self.state = State::AwaitingPayload(header);
                }
                State::AwaitingPayload(header) => {
                    let len = header.payload_length as usize;
                    if self.buffer.len() < len {
                        return Ok(None);
                    }
                    let payload = self.buffer.split_to(len).freeze();
                    self.state = State::AwaitingHeader;
                    return Ok(Some(Frame::new(header.opcode, payload)));
                }
            }
        }
    }

    /// Number of buffered bytes not yet part of a returned frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop buffered bytes and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::AwaitingHeader;
    }

    #[cfg(test)]
    fn awaiting_payload(&self) -> bool {
        matches!(self.state, State::AwaitingPayload(_))
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
