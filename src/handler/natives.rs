//! Native handle table.
//!
//! The remote resolves a native by name once and then invokes it by handle.
//! Handles are assigned sequentially from 0 on the first successful lookup
//! and stay stable until the table is cleared.
//!
//! # Example
//!
//! ```ignore
//! use scriptwire_host::handler::NativeRegistry;
//!
//! let mut natives = NativeRegistry::new();
//! let handle = natives.get_handle(&host, "SetPlayerHealth");
//! assert_eq!(handle, Some(0));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::{CellReader, CellWriter};
use crate::error::{BridgeError, Result};
use crate::host::{Host, Native};

/// Registry mapping native names to handles.
#[derive(Default)]
pub struct NativeRegistry {
    /// Handle by name.
    handles: HashMap<String, i32>,
    /// Natives by handle.
    natives: Vec<Arc<dyn Native>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the handle for a native, resolving it through the host on first use.
    ///
    /// Returns `None` when the host does not know the name.
    pub fn get_handle<H: Host + ?Sized>(&mut self, host: &H, name: &str) -> Option<i32> {
        if let Some(&handle) = self.handles.get(name) {
            return Some(handle);
        }

        let native = host.find_native(name)?;
        let handle = i32::try_from(self.natives.len()).ok()?;
        self.natives.push(native);
        self.handles.insert(name.to_string(), handle);
        tracing::debug!("Native {} bound to handle {}", name, handle);
        Some(handle)
    }

    /// Get the native bound to a handle.
    pub fn get(&self, handle: i32) -> Option<&Arc<dyn Native>> {
        usize::try_from(handle)
            .ok()
            .and_then(|index| self.natives.get(index))
    }

    /// Invoke a native.
    ///
    /// `request` is `[handle i32][argument bytes]`. The native's result bytes
    /// are appended to `response`; returns how many were written.
    ///
    /// # Errors
    ///
    /// Returns an error for a truncated request, an unbound handle, a failing
    /// native or a result that does not fit `response`.
    pub fn invoke(&self, request: &[u8], response: &mut CellWriter) -> Result<usize> {
        let mut reader = CellReader::new(request);
        let handle = reader.read_i32()?;
        let native = self.get(handle).ok_or(BridgeError::NativeNotFound(handle))?;

        let result = native.invoke(reader.rest())?;
        response.put_slice(&result)?;
        Ok(result.len())
    }

    /// Number of bound natives.
    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }

    /// Forget every handle.
    pub fn clear(&mut self) {
        self.handles.clear();
        self.natives.clear();
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("handles", &self.handles)
            .finish()
    }
}

/// Raw result of a native invocation, with typed views.
///
/// Results follow the cell convention: little-endian 32-bit words, floats as
/// their bit pattern, booleans as 0/1.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeResult(pub Vec<u8>);

impl NativeResult {
    pub fn as_i32(&self) -> Result<i32> {
        CellReader::new(&self.0).read_i32()
    }

    pub fn as_f32(&self) -> Result<f32> {
        CellReader::new(&self.0).read_f32()
    }

    pub fn as_bool(&self) -> Result<bool> {
        Ok(self.as_i32()? != 0)
    }

    /// Ignore the result.
    pub fn discard(self) {}
}

impl From<Vec<u8>> for NativeResult {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
