//! Handler module - what the remote may call and be called with.
//!
//! Provides:
//! - [`NativeRegistry`] - native name to handle table, invocation by handle
//! - [`CallbackRegistry`] - callbacks the remote registered and how to
//!   marshal them
//!
//! Both tables are cleared whenever the remote goes away for good.

pub mod callbacks;
mod natives;

pub use callbacks::{
    decode_call_buffer, CallbackParam, CallbackRegistry, DecodedCall, ParamKind,
    MAX_CALLBACK_PARAMS,
};
pub use natives::{NativeRegistry, NativeResult};
