//! # scriptwire-host
//!
//! Host-side bridge that forwards a game server's script callbacks to an
//! out-of-process script runtime and serves its native calls.
//!
//! The host owns the listening pipe and drives everything from its own
//! thread; the remote runtime connects, registers the callbacks it wants and
//! resolves natives by name.
//!
//! ## Architecture
//!
//! - **Transport**: framed local pipe (Unix socket / named pipe) behind the
//!   [`transport::Channel`] trait
//! - **Protocol**: 5-byte header (opcode, payload length) and typed commands
//! - **Session**: connection status, command dispatch, heartbeat and
//!   blocking public calls
//!
//! ## Example
//!
//! ```ignore
//! use scriptwire_host::config::PipeConfig;
//! use scriptwire_host::{CallbackParam, PipeChannel, SessionBuilder};
//!
//! let channel = PipeChannel::new(PipeConfig::default())?;
//! let mut session = SessionBuilder::new().build(channel, host);
//!
//! // every server tick
//! session.tick();
//!
//! // every host callback
//! let ret = session.public_call(0, "OnPlayerConnect", &[CallbackParam::Int(playerid)]);
//! ```

pub mod codec;
pub mod config;
pub mod control;
pub mod debug;
pub mod error;
pub mod handler;
pub mod host;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use error::{BridgeError, Result};
pub use handler::CallbackParam;
pub use host::{Host, Native};
pub use session::{Session, SessionBuilder, SessionState, SharedSession};
pub use transport::{Channel, PipeChannel, Received};
