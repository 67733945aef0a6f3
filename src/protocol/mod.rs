//! Protocol module - wire format, framing, and command records.
//!
//! - 5-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct and typed command records

mod frame;
mod frame_buffer;
pub mod messages;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use messages::{Announce, CallReply, Command, NativeHandleReply, StartMode};
pub use wire_format::{opcodes, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
