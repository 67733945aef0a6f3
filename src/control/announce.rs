//! Server announcement sent on every successful connect.
//!
//! Tells the remote runtime which protocol revision it is talking to, which
//! build of the bridge is loaded and where the host process runs from, so it
//! can resolve host-relative paths.

use std::path::Path;

use crate::config::SessionConfig;
use crate::protocol::Announce;

/// Protocol revision spoken by this bridge.
pub const PROTOCOL_VERSION: u32 = 1;

/// Crate version packed as `major << 16 | minor << 8 | patch`.
pub fn build_version() -> u32 {
    let part = |value: &str| value.parse::<u32>().unwrap_or(0) & 0xFF;
    part(env!("CARGO_PKG_VERSION_MAJOR")) << 16
        | part(env!("CARGO_PKG_VERSION_MINOR")) << 8
        | part(env!("CARGO_PKG_VERSION_PATCH"))
}

/// Build the announcement for a session configuration.
///
/// Falls back to an empty directory when the cwd cannot be read.
pub fn build_announce(config: &SessionConfig) -> Announce {
    let working_dir = match &config.working_dir {
        Some(dir) => display_path(dir),
        None => match std::env::current_dir() {
            Ok(dir) => display_path(&dir),
            Err(e) => {
                tracing::warn!("Cannot read working directory: {}", e);
                String::new()
            }
        },
    };

    Announce {
        protocol_version: config.protocol_version,
        build_version: config.build_version,
        working_dir,
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
