//! Typed command records.
//!
//! [`Command::decode`] is the opcode table: every mapped inbound opcode turns
//! into one typed record, anything else (the RESPONSE opcode in particular)
//! yields `None` and is treated by the session as the reply to an
//! outstanding call.
//!
//! Outbound payloads with a fixed layout ([`Announce`], [`NativeHandleReply`])
//! are encoded here too; public-call payloads depend on the registered
//! callback signature and live in [`crate::handler::callbacks`].

use bytes::Bytes;

use super::opcodes;
use super::Frame;
use crate::codec::{CellReader, CellWriter};
use crate::error::Result;

/// How the remote wants the host to finish the start handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Nothing to do; the remote waits for the host's own init.
    None,
    /// Run the host's init command (restarting the script) once.
    Restart,
    /// Deliver the init callback synchronously, faking a restart.
    FakeInit,
    /// Any other byte.
    Unknown(u8),
}

impl From<u8> for StartMode {
    fn from(value: u8) -> Self {
        match value {
            0 => StartMode::None,
            1 => StartMode::Restart,
            2 => StartMode::FakeInit,
            other => StartMode::Unknown(other),
        }
    }
}

/// A decoded inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Print(String),
    Reconnect,
    /// Raw registration record (name plus parameter descriptors).
    RegisterCall(Bytes),
    FindNative { caller: u16, name: String },
    /// `request` is the handle followed by the opaque argument bytes.
    InvokeNative { caller: u16, request: Bytes },
    Start(StartMode),
    Disconnect,
    Alive,
}

impl Command {
    /// Decode a frame through the opcode table.
    ///
    /// Returns `Ok(None)` for unmapped opcodes.
    ///
    /// # Errors
    ///
    /// Returns an error when a mapped command's payload is too short for its
    /// fixed fields.
    pub fn decode(frame: &Frame) -> Result<Option<Command>> {
        let payload = &frame.payload;
        let command = match frame.opcode {
            opcodes::PING => Command::Ping,
            opcodes::PRINT => Command::Print(decode_text(payload)),
            opcodes::RECONNECT => Command::Reconnect,
            opcodes::REGISTER_CALL => Command::RegisterCall(payload.clone()),
            opcodes::FIND_NATIVE => {
                let mut reader = CellReader::new(payload);
                let caller = reader.read_u16()?;
                let name = reader.read_cstr()?.to_string();
                Command::FindNative { caller, name }
            }
            opcodes::INVOKE_NATIVE => {
                let mut reader = CellReader::new(payload);
                let caller = reader.read_u16()?;
                Command::InvokeNative {
                    caller,
                    request: payload.slice(2..),
                }
            }
            opcodes::START => {
                Command::Start(payload.first().copied().map_or(StartMode::None, StartMode::from))
            }
            opcodes::DISCONNECT => Command::Disconnect,
            opcodes::ALIVE => Command::Alive,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

/// PRINT text may or may not carry a terminator; invalid UTF-8 is replaced.
fn decode_text(payload: &[u8]) -> String {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}

/// Longest working directory sent in an announcement.
pub const MAX_ANNOUNCE_PATH: usize = 260;

/// The announcement sent once per successful connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announce {
    pub protocol_version: u32,
    pub build_version: u32,
    pub working_dir: String,
}

impl Announce {
    /// Encode as `[protocol u32][build u32][cwd bytes]`.
    ///
    /// The path is cut at [`MAX_ANNOUNCE_PATH`] bytes on a character boundary.
    pub fn encode(&self) -> Result<Bytes> {
        let mut cut = self.working_dir.len().min(MAX_ANNOUNCE_PATH);
        while !self.working_dir.is_char_boundary(cut) {
            cut -= 1;
        }
        let mut writer = CellWriter::new(8 + MAX_ANNOUNCE_PATH);
        writer.put_u32(self.protocol_version)?;
        writer.put_u32(self.build_version)?;
        writer.put_slice(&self.working_dir.as_bytes()[..cut])?;
        Ok(writer.freeze())
    }

    /// Decode an announcement (the remote side's view).
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = CellReader::new(payload);
        let protocol_version = reader.read_u32()?;
        let build_version = reader.read_u32()?;
        let working_dir = String::from_utf8_lossy(reader.rest()).into_owned();
        Ok(Self {
            protocol_version,
            build_version,
            working_dir,
        })
    }
}

/// Handle sent back for a missing native.
pub const INVALID_NATIVE_HANDLE: i32 = -1;

/// Reply to FIND_NATIVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeHandleReply {
    pub caller: u16,
    pub handle: Option<i32>,
}

impl NativeHandleReply {
    pub fn encode(&self) -> Result<Bytes> {
        let mut writer = CellWriter::new(6);
        writer.put_u16(self.caller)?;
        writer.put_i32(self.handle.unwrap_or(INVALID_NATIVE_HANDLE))?;
        Ok(writer.freeze())
    }
}

/// The remote's answer to a public call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallReply {
    /// Value returned by the remote handler, if it produced one.
    pub value: Option<i32>,
}

impl CallReply {
    /// Decode `[success u8][value i32]`.
    ///
    /// A reply shorter than five bytes or with a zero success flag carries no
    /// value. An empty reply is not a reply at all and yields `None`.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let mut reader = CellReader::new(payload);
        let success = reader.read_u8().ok()?;
        let value = match reader.read_i32() {
            Ok(value) if success != 0 => Some(value),
            _ => None,
        };
        Some(Self { value })
    }
}
