//! Platform-specific pipe/socket channel.
//!
//! - Unix: Unix Domain Socket
//! - Windows: Named Pipe
//!
//! The host is the listening side; the remote script runtime connects to it.
//! The host drives everything from its own thread, so the channel owns a
//! private current-thread tokio runtime and blocks on it for bounded waits:
//! `connect` waits up to `connect_timeout`, `receive` up to `poll_interval`.
//! Both I/O futures are cancel-safe, and partial reads stay in the
//! [`FrameBuffer`] across calls.
//!
//! # Example
//!
//! ```ignore
//! use scriptwire_host::config::PipeConfig;
//! use scriptwire_host::transport::{Channel, PipeChannel};
//!
//! let mut channel = PipeChannel::new(PipeConfig::default())?;
//! channel.setup()?;
//! while !channel.connect()? {}
//! ```

use std::collections::VecDeque;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::{Builder, Runtime};
use tokio::time::timeout;

use super::{Channel, Received};
use crate::config::PipeConfig;
use crate::error::{BridgeError, Result};
use crate::protocol::{build_frame, Frame, FrameBuffer};

/// Read chunk size.
const READ_CHUNK: usize = 64 * 1024;

// ============================================================================
// Unix Implementation
// ============================================================================

#[cfg(unix)]
mod unix_impl {
    use std::path::Path;

    use tokio::net::{UnixListener, UnixStream};

    use crate::error::Result;

    pub type PipeStream = UnixStream;

    /// Unix Domain Socket listener that removes its socket file on drop.
    pub struct PipeListener {
        listener: UnixListener,
        path: String,
    }

    impl PipeListener {
        /// Bind to a socket path, replacing a stale socket file.
        ///
        /// Must run inside the channel's runtime context.
        pub fn bind(path: &str) -> Result<Self> {
            if Path::new(path).exists() {
                std::fs::remove_file(path)?;
            }
            let listener = UnixListener::bind(path)?;
            Ok(Self {
                listener,
                path: path.to_string(),
            })
        }

        pub async fn accept(&mut self) -> Result<PipeStream> {
            let (stream, _addr) = self.listener.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for PipeListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};

    use crate::error::{BridgeError, Result};

    pub type PipeStream = NamedPipeServer;

    /// Named pipe "listener": keeps one unconnected server instance ready.
    pub struct PipeListener {
        path: String,
        waiting: Option<NamedPipeServer>,
    }

    impl PipeListener {
        pub fn bind(path: &str) -> Result<Self> {
            let server = ServerOptions::new()
                .first_pipe_instance(true)
                .create(path)?;
            Ok(Self {
                path: path.to_string(),
                waiting: Some(server),
            })
        }

        /// Wait for a client on the ready instance.
        ///
        /// The instance is only handed out once connected, so a timed-out
        /// accept leaves it in place for the next attempt.
        pub async fn accept(&mut self) -> Result<PipeStream> {
            if self.waiting.is_none() {
                self.waiting = Some(ServerOptions::new().create(&self.path)?);
            }
            if let Some(server) = &self.waiting {
                server.connect().await?;
            }
            self.waiting.take().ok_or(BridgeError::ConnectionClosed)
        }
    }
}

#[cfg(unix)]
use unix_impl::{PipeListener, PipeStream};

#[cfg(windows)]
use windows_impl::{PipeListener, PipeStream};

/// Listening local pipe implementing [`Channel`].
pub struct PipeChannel {
    config: PipeConfig,
    path: String,
    runtime: Runtime,
    listener: Option<PipeListener>,
    stream: Option<PipeStream>,
    frames: FrameBuffer,
    pending: VecDeque<Frame>,
    read_buf: Vec<u8>,
}

impl PipeChannel {
    /// Create an unbound channel; call [`Channel::setup`] to start listening.
    pub fn new(config: PipeConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;
        Ok(Self {
            path: config.resolved_path(),
            frames: FrameBuffer::with_max_payload(config.max_payload_size),
            config,
            runtime,
            listener: None,
            stream: None,
            pending: VecDeque::new(),
            read_buf: vec![0u8; READ_CHUNK],
        })
    }

    /// The socket/pipe path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn close_stream(&mut self) {
        self.stream = None;
        self.frames.clear();
        self.pending.clear();
    }
}

impl Channel for PipeChannel {
    fn setup(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }
        let _guard = self.runtime.enter();
        self.listener = Some(PipeListener::bind(&self.path)?);
        tracing::debug!("Listening on {}", self.path);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.listener.is_some()
    }

    fn connect(&mut self) -> Result<bool> {
        if self.stream.is_some() {
            return Ok(true);
        }
        let listener = self.listener.as_mut().ok_or(BridgeError::ConnectionClosed)?;
        let wait = self.config.connect_timeout();

        match self
            .runtime
            .block_on(async { timeout(wait, listener.accept()).await })
        {
            Ok(Ok(stream)) => {
                self.stream = Some(stream);
                Ok(true)
            }
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Ok(false),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn send(&mut self, opcode: u8, payload: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(BridgeError::ConnectionClosed)?;
        let bytes = build_frame(opcode, payload);

        let written = self.runtime.block_on(async {
            stream.write_all(&bytes).await?;
            stream.flush().await
        });

        if let Err(e) = written {
            self.close_stream();
            return Err(e.into());
        }
        Ok(())
    }

    fn receive(&mut self) -> Received {
        if let Some(frame) = self.pending.pop_front() {
            return Received::Frame(frame);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Received::Dead;
        };
        let wait = self.config.poll_interval();
        let buf = &mut self.read_buf;

        let n = match self
            .runtime
            .block_on(async { timeout(wait, stream.read(buf)).await })
        {
            Err(_elapsed) => return Received::NoCommand,
            Ok(Ok(0)) => {
                tracing::debug!("Peer closed the pipe");
                self.close_stream();
                return Received::Dead;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::warn!("Pipe read failed: {}", e);
                self.close_stream();
                return Received::Dead;
            }
        };

        match self.frames.push(&self.read_buf[..n]) {
            Ok(frames) => self.pending.extend(frames),
            Err(e) => {
                tracing::warn!("Dropping connection: {}", e);
                self.close_stream();
                return Received::Dead;
            }
        }

        self.pending
            .pop_front()
            .map_or(Received::NoCommand, Received::Frame)
    }

    fn disconnect(&mut self) {
        self.close_stream();
        self.listener = None;
    }
}
