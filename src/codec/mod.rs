//! Codec module - payload encoding for command frames.
//!
//! Payloads are flat little-endian records rather than a self-describing
//! format: the remote runtime decodes them by position, so the layout of
//! each command is fixed (see [`crate::protocol::messages`]).
//!
//! - [`CellReader`] - bounds-checked cursor over a received payload
//! - [`CellWriter`] - size-limited builder for outbound payloads

mod cell;

pub use cell::{CellReader, CellWriter};
