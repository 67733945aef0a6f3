//! Transport module - the communication channel boundary.
//!
//! The session never touches sockets directly; it drives a [`Channel`].
//! [`PipeChannel`] is the production implementation:
//! - Unix Domain Sockets (Linux/macOS)
//! - Named Pipes (Windows)
//!
//! The trait is blocking by design: the host calls into the session from its
//! own thread and expects an answer before the call returns.

mod pipe;

pub use pipe::PipeChannel;

use crate::error::Result;
use crate::protocol::Frame;

/// Outcome of a single receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete frame arrived.
    Frame(Frame),
    /// Nothing available right now.
    NoCommand,
    /// The connection is gone.
    Dead,
}

/// A framed, single-peer, blocking communication channel.
pub trait Channel {
    /// Prepare the channel so a peer can connect (bind, create the pipe).
    fn setup(&mut self) -> Result<()>;

    /// Whether `setup` succeeded and has not been undone.
    fn is_ready(&self) -> bool;

    /// Try to establish the connection.
    ///
    /// Returns `Ok(false)` when no peer showed up in time.
    fn connect(&mut self) -> Result<bool>;

    fn is_connected(&self) -> bool;

    /// Send one frame.
    fn send(&mut self, opcode: u8, payload: &[u8]) -> Result<()>;

    /// Receive at most one frame.
    fn receive(&mut self) -> Received;

    /// Close the connection and release the listening endpoint.
    fn disconnect(&mut self);
}
