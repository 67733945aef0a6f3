//! The session state machine.
//!
//! A [`Session`] owns the channel, the host, both registries and the pause
//! detector. The host drives it from one thread:
//!
//! - [`Session::tick`] once per server tick: heartbeat, then drain and
//!   dispatch everything the remote sent.
//! - [`Session::public_call`] for every host callback: forward it and block
//!   until the remote answers, servicing its native calls meanwhile.
//!
//! # Example
//!
//! ```ignore
//! use scriptwire_host::{PipeChannel, SessionBuilder, SessionConfig};
//! use scriptwire_host::config::PipeConfig;
//!
//! let channel = PipeChannel::new(PipeConfig::default())?;
//! let mut session = SessionBuilder::new()
//!     .config(SessionConfig::default())
//!     .build(channel, host);
//!
//! loop {
//!     session.tick();
//!     // ...
//! }
//! ```

mod dispatch;
mod shared;
mod status;

pub use dispatch::CommandStatus;
pub use shared::SharedSession;
pub use status::{DisconnectCause, Intent, Link, Operation, SessionState, SessionStatus};

use bytes::Bytes;

use crate::codec::CellWriter;
use crate::config::SessionConfig;
use crate::control::{build_announce, Intermission, LifecycleReporter};
use crate::debug::{Clock, DebugDetector, SystemClock};
use crate::error::Result;
use crate::handler::{CallbackParam, CallbackRegistry, NativeRegistry};
use crate::host::Host;
use crate::protocol::{opcodes, CallReply};
use crate::transport::{Channel, Received};

/// Builder for a [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
    reporter: Option<Box<dyn LifecycleReporter>>,
    clock: Box<dyn Clock>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            reporter: None,
            clock: Box::new(SystemClock),
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Observe lifecycle transitions.
    pub fn reporter<R: LifecycleReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Replace the time source used by the pause detector.
    pub fn clock<K: Clock + 'static>(mut self, clock: K) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Build the session and prepare the channel for a peer.
    pub fn build<C: Channel, H: Host>(self, channel: C, host: H) -> Session<C, H> {
        let intermission = match self.reporter {
            Some(reporter) => Intermission::with_reporter(reporter),
            None => Intermission::new(),
        };
        let mut session = Session {
            debug: DebugDetector::new(self.config.debug.clone()),
            config: self.config,
            channel,
            host,
            status: SessionStatus::new(),
            natives: NativeRegistry::new(),
            callbacks: CallbackRegistry::new(),
            clock: self.clock,
            intermission,
            in_handshake: false,
        };

        session.intermission.signal_starting();
        if let Err(e) = session.channel.setup() {
            tracing::warn!("Channel setup failed, retrying on connect: {}", e);
        }
        session
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-side session with one remote runtime.
pub struct Session<C: Channel, H: Host> {
    config: SessionConfig,
    channel: C,
    host: H,
    status: SessionStatus,
    natives: NativeRegistry,
    callbacks: CallbackRegistry,
    debug: DebugDetector,
    clock: Box<dyn Clock>,
    intermission: Intermission,
    /// Set while the fake init round trip waits for its reply.
    in_handshake: bool,
}

impl<C: Channel, H: Host> Session<C, H> {
    /// Let a peer connect.
    ///
    /// Returns `true` right away when already connected. On a new connection
    /// the announcement is sent.
    pub fn connect(&mut self) -> bool {
        if self.channel.is_connected() {
            return true;
        }

        if !self.channel.is_ready() {
            if let Err(e) = self.channel.setup() {
                tracing::warn!("Channel setup failed: {}", e);
                return false;
            }
        }

        match self.channel.connect() {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                tracing::warn!("Connect failed: {}", e);
                return false;
            }
        }

        self.intermission.signal_connected();
        if self.status.on_connected() {
            tracing::info!("Client reconnected");
        } else {
            tracing::info!("Connected to client");
        }

        self.send_announce();
        true
    }

    fn send_announce(&mut self) {
        let announce = build_announce(&self.config);
        match announce.encode() {
            Ok(payload) => {
                self.send(opcodes::ANNOUNCE, &payload);
                tracing::info!("Server announcement sent");
                tracing::debug!("Hi from {}", announce.working_dir);
            }
            Err(e) => tracing::error!("Cannot encode announcement: {}", e),
        }
    }

    /// Drop the peer. No-op while the link is down.
    ///
    /// `expected` disconnects keep the registries; otherwise they are
    /// cleared, and unless the remote announced its departure the disconnect
    /// is reported as an error with `context`.
    pub fn disconnect(&mut self, context: Option<&str>, expected: bool) {
        if !self.status.is_link_up() {
            return;
        }

        let cause = self.status.disconnect_cause(expected);
        match cause {
            DisconnectCause::Expected | DisconnectCause::Declared => {
                tracing::info!("Client disconnected");
                self.intermission.signal_disconnect();
            }
            DisconnectCause::Unexpected => {
                tracing::error!("Unexpected disconnect of client. {}", context.unwrap_or(""));
                self.intermission.signal_error();
            }
        }
        if cause.clears_registries() {
            self.natives.clear();
            self.callbacks.clear();
        }

        self.channel.disconnect();
        if let Err(e) = self.channel.setup() {
            tracing::warn!("Channel setup failed after disconnect: {}", e);
        }

        self.status.on_disconnected(cause);
    }

    /// Unexpected disconnect.
    pub fn terminate(&mut self, context: &str) {
        self.disconnect(Some(context), false);
    }

    /// Per-tick heartbeat and inbound drain.
    pub fn tick(&mut self) {
        if self.is_client_connected() && self.status.permits(Operation::Heartbeat) {
            self.intermission.set_on(false);

            let now = self.clock.now();
            if !self.debug.is_suspended(now, true) {
                self.debug.record_heartbeat(now);
                self.send(opcodes::TICK, &[]);
            }
        }

        loop {
            match self.receive_one() {
                CommandStatus::Handled => {}
                CommandStatus::Unhandled(reply) => {
                    tracing::error!("Unhandled response in tick ({} bytes)", reply.len());
                }
                CommandStatus::NoCommand | CommandStatus::ConnectionDead => break,
            }
        }
    }

    /// Forward a host callback and wait for the remote's return value.
    ///
    /// Returns `None` when the call was not forwarded or produced no value.
    pub fn public_call(
        &mut self,
        caller: u16,
        name: &str,
        params: &[CallbackParam],
    ) -> Option<i32> {
        let is_init = name == self.config.init_callback;
        if is_init {
            self.status.on_host_init();
        } else if name == self.config.exit_callback {
            self.status.on_host_exit();
        }

        if !self.is_client_connected() || !self.status.permits(Operation::PublicCall) {
            return None;
        }

        self.intermission.set_on(false);

        if is_init {
            self.status.on_client_init();
        } else if !self.status.has_client_init() {
            return None;
        }

        if self.debug.is_suspended(self.clock.now(), false) {
            return None;
        }

        let payload = match self.fill_call(caller, name, params) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cannot forward callback {}: {}", name, e);
                return None;
            }
        };

        self.send(opcodes::PUBLIC_CALL, &payload);

        let reply = match self.receive_unhandled() {
            Some(reply) if !reply.is_empty() => reply,
            _ => {
                tracing::error!("Received no response to callback {}", name);
                return None;
            }
        };

        CallReply::decode(&reply).and_then(|reply| reply.value)
    }

    /// Marshal a registered callback; `None` when the remote did not ask for it.
    fn fill_call(
        &self,
        caller: u16,
        name: &str,
        params: &[CallbackParam],
    ) -> Result<Option<Bytes>> {
        let mut out = CellWriter::new(self.config.max_payload_size as usize);
        if !self
            .callbacks
            .fill_call_buffer(caller, name, params, &mut out, true)?
        {
            return Ok(None);
        }
        Ok(Some(out.freeze()))
    }

    /// Send a frame; failures are logged and surface on the next receive.
    fn send(&mut self, opcode: u8, payload: &[u8]) {
        if let Err(e) = self.channel.send(opcode, payload) {
            tracing::warn!("Failed to send opcode 0x{:02X}: {}", opcode, e);
        }
    }

    /// Receive and dispatch at most one frame.
    fn receive_one(&mut self) -> CommandStatus {
        if self.status.is_link_up() && !self.channel.is_connected() {
            self.disconnect(Some("connection lost"), false);
            return CommandStatus::ConnectionDead;
        }
        if !self.connect() {
            return CommandStatus::ConnectionDead;
        }

        let frame = match self.channel.receive() {
            Received::Frame(frame) => frame,
            Received::NoCommand => return CommandStatus::NoCommand,
            Received::Dead => {
                self.disconnect(Some("connection lost"), false);
                return CommandStatus::ConnectionDead;
            }
        };

        self.debug.record_interaction(self.clock.now());
        self.process(frame)
    }

    /// Receive until a frame the command table does not know arrives.
    fn receive_unhandled(&mut self) -> Option<Bytes> {
        loop {
            match self.receive_one() {
                CommandStatus::Handled | CommandStatus::NoCommand => {}
                CommandStatus::Unhandled(reply) => return Some(reply),
                CommandStatus::ConnectionDead => return None,
            }
        }
    }

    /// Link up and the channel agrees.
    pub fn is_client_connected(&self) -> bool {
        self.status.is_link_up() && self.channel.is_connected()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn intermission(&self) -> &Intermission {
        &self.intermission
    }

    pub fn debug_detector(&self) -> &DebugDetector {
        &self.debug
    }
}

impl<C: Channel, H: Host> Drop for Session<C, H> {
    fn drop(&mut self) {
        self.channel.disconnect();
    }
}
