//! Inbound command handlers.

use bytes::Bytes;

use super::Session;
use crate::codec::CellWriter;
use crate::host::Host;
use crate::protocol::{opcodes, Command, Frame, NativeHandleReply, StartMode};
use crate::transport::Channel;

/// Outcome of one receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    /// A command arrived and was dispatched.
    Handled,
    /// A frame the command table does not know; its payload is the reply.
    Unhandled(Bytes),
    NoCommand,
    ConnectionDead,
}

impl<C: Channel, H: Host> Session<C, H> {
    /// Run a received frame through the command table.
    pub(super) fn process(&mut self, frame: Frame) -> CommandStatus {
        match Command::decode(&frame) {
            Ok(Some(command)) => {
                self.dispatch(command);
                CommandStatus::Handled
            }
            Ok(None) => CommandStatus::Unhandled(frame.payload),
            Err(e) => {
                tracing::warn!("Dropping malformed command 0x{:02X}: {}", frame.opcode, e);
                CommandStatus::Handled
            }
        }
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::Ping => self.send(opcodes::PONG, &[]),
            Command::Print(text) => tracing::info!(target: "remote", "{}", text),
            Command::Alive => {}
            Command::RegisterCall(record) => self.on_register_call(&record),
            Command::FindNative { caller, name } => self.on_find_native(caller, &name),
            Command::InvokeNative { caller, request } => self.on_invoke_native(caller, &request),
            Command::Reconnect => {
                tracing::info!("The remote is reconnecting");
                self.status.on_reconnect_requested();
                self.disconnect(None, true);
            }
            Command::Disconnect => {
                tracing::info!("The remote is disconnecting");
                self.status.on_disconnect_requested();
            }
            Command::Start(mode) => self.on_start(mode),
        }
    }

    fn on_register_call(&mut self, record: &[u8]) {
        match self.callbacks.register_buffer(record) {
            Ok(name) => tracing::debug!("Register call {}", name),
            Err(e) => tracing::warn!("Rejected callback registration: {}", e),
        }
    }

    fn on_find_native(&mut self, caller: u16, name: &str) {
        let handle = self.natives.get_handle(&self.host, name);
        tracing::debug!("Find native {} -> {:?}", name, handle);

        match (NativeHandleReply { caller, handle }).encode() {
            Ok(reply) => self.send(opcodes::REPLY, &reply),
            Err(e) => tracing::error!("Cannot encode native handle reply: {}", e),
        }
    }

    /// Reply with the caller id followed by the result; on failure with the
    /// caller id alone.
    fn on_invoke_native(&mut self, caller: u16, request: &[u8]) {
        let mut reply = CellWriter::new(self.config.max_payload_size as usize);
        if let Err(e) = reply.put_u16(caller) {
            tracing::error!("Cannot encode native reply: {}", e);
            return;
        }

        match self.natives.invoke(request, &mut reply) {
            Ok(written) => tracing::debug!(
                "Native invoked with {} bytes, response has {} bytes",
                request.len(),
                written
            ),
            Err(e) => tracing::warn!("Native invocation failed: {}", e),
        }

        let reply = reply.freeze();
        self.send(opcodes::REPLY, &reply);
    }

    fn on_start(&mut self, mode: StartMode) {
        tracing::info!("The remote has started");
        self.status.on_start();

        match mode {
            StartMode::None => tracing::debug!("Using 'none' start method"),
            StartMode::Restart => {
                tracing::debug!("Using restart start method");
                if self.status.has_host_init() {
                    tracing::debug!("Running {} to attach the remote", self.config.init_command);
                    self.host.exec_command(&self.config.init_command);
                }
            }
            StartMode::FakeInit => {
                tracing::debug!("Using fake init start method");
                if self.status.has_host_init() {
                    self.fake_init();
                }
            }
            StartMode::Unknown(mode) => tracing::error!("Invalid start mode {}", mode),
        }
    }

    /// Deliver the init callback as if the host had just started.
    fn fake_init(&mut self) {
        if self.in_handshake {
            tracing::warn!("Init handshake already in progress, ignoring nested start");
            return;
        }
        self.status.on_client_init();

        let init = self.config.init_callback.clone();
        let payload = match self.fill_call(0, &init, &[]) {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Cannot forward callback {}: {}", init, e);
                return;
            }
        };

        self.in_handshake = true;
        self.send(opcodes::PUBLIC_CALL, &payload);
        let reply = self.receive_unhandled();
        self.in_handshake = false;

        if reply.map_or(true, |reply| reply.is_empty()) {
            tracing::error!("Received no response to callback {}", init);
        }
    }
}
