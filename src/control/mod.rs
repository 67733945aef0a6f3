//! Control module - connection announcement and lifecycle reporting.
//!
//! # Workflow
//!
//! 1. The session is created; the intermission reports `Starting`
//! 2. A remote runtime connects to the pipe
//! 3. The host sends the announcement (protocol, build, working directory)
//! 4. The intermission reports `Connected` and lowers the holding state
//! 5. On disconnect it reports `Disconnected` or `Error` and raises it again

mod announce;
mod intermission;

pub use announce::{build_announce, build_version, PROTOCOL_VERSION};
pub use intermission::{Intermission, LifecycleEvent, LifecycleReporter};
