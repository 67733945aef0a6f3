//! Callback registration and marshalling.
//!
//! The remote registers every host callback it wants to receive together with
//! a parameter signature. Only registered callbacks are forwarded; their
//! parameters are marshalled according to that signature.
//!
//! Registration record: `name NUL` followed by one descriptor per parameter:
//!
//! ```text
//! 0x01                 value cell
//! 0x02 [index u32]     array; index of the parameter holding its length
//! 0x04                 string
//! ```
//!
//! Call buffer: `[caller u16]? name NUL` followed by the parameters. Value
//! cells are `i32` (floats as their bits, booleans as 0/1), strings are UTF-8
//! plus NUL, arrays are a `u32` count followed by cells.

use std::collections::HashMap;

use crate::codec::{CellReader, CellWriter};
use crate::error::{BridgeError, Result};

/// Most parameters a callback may declare.
pub const MAX_CALLBACK_PARAMS: usize = 32;

/// Descriptor bytes.
pub mod descriptors {
    pub const VALUE: u8 = 0x01;
    pub const ARRAY: u8 = 0x02;
    pub const STRING: u8 = 0x04;
}

/// Kind of a declared callback parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Value,
    /// Array whose length is carried by the parameter at `length_param`.
    Array { length_param: u32 },
    Str,
}

/// A parameter value supplied by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackParam {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
    Array(Vec<i32>),
}

impl CallbackParam {
    /// The value as a single cell, if it is one.
    fn as_cell(&self) -> Option<i32> {
        match *self {
            CallbackParam::Int(v) => Some(v),
            CallbackParam::Float(v) => Some(v.to_bits() as i32),
            CallbackParam::Bool(v) => Some(i32::from(v)),
            CallbackParam::Str(_) | CallbackParam::Array(_) => None,
        }
    }
}

impl From<i32> for CallbackParam {
    fn from(value: i32) -> Self {
        CallbackParam::Int(value)
    }
}

impl From<f32> for CallbackParam {
    fn from(value: f32) -> Self {
        CallbackParam::Float(value)
    }
}

impl From<bool> for CallbackParam {
    fn from(value: bool) -> Self {
        CallbackParam::Bool(value)
    }
}

impl From<&str> for CallbackParam {
    fn from(value: &str) -> Self {
        CallbackParam::Str(value.to_string())
    }
}

impl From<Vec<i32>> for CallbackParam {
    fn from(value: Vec<i32>) -> Self {
        CallbackParam::Array(value)
    }
}

/// A call buffer as seen by the remote.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub caller: Option<u16>,
    pub name: String,
    /// Value cells decode as [`CallbackParam::Int`].
    pub params: Vec<CallbackParam>,
}

/// Registered callbacks by name.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Vec<ParamKind>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registration record and store it, replacing any previous
    /// signature under the same name.
    ///
    /// Returns the registered name.
    pub fn register_buffer(&mut self, payload: &[u8]) -> Result<String> {
        let mut reader = CellReader::new(payload);
        let name = reader.read_cstr()?;
        if name.is_empty() {
            return Err(BridgeError::Protocol("callback name is empty".to_string()));
        }

        let mut params = Vec::new();
        while !reader.is_empty() {
            if params.len() == MAX_CALLBACK_PARAMS {
                return Err(signature_error(name, "too many parameters"));
            }
            let kind = match reader.read_u8()? {
                descriptors::VALUE => ParamKind::Value,
                descriptors::ARRAY => ParamKind::Array {
                    length_param: reader.read_u32()?,
                },
                descriptors::STRING => ParamKind::Str,
                other => {
                    return Err(signature_error(
                        name,
                        &format!("unknown descriptor 0x{:02X}", other),
                    ))
                }
            };
            params.push(kind);
        }

        for kind in &params {
            if let ParamKind::Array { length_param } = *kind {
                let target = usize::try_from(length_param)
                    .ok()
                    .and_then(|index| params.get(index));
                if target != Some(&ParamKind::Value) {
                    return Err(signature_error(
                        name,
                        &format!("array length parameter {} is not a value", length_param),
                    ));
                }
            }
        }

        tracing::debug!("Registered callback {} with {} parameters", name, params.len());
        self.callbacks.insert(name.to_string(), params);
        Ok(name.to_string())
    }

    /// Signature of a registered callback.
    pub fn get(&self, name: &str) -> Option<&[ParamKind]> {
        self.callbacks.get(name).map(Vec::as_slice)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// Marshal a callback invocation into `out`.
    ///
    /// Returns `Ok(false)` without writing when the callback is not registered.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters do not match the signature or the
    /// buffer would exceed the writer's limit.
    pub fn fill_call_buffer(
        &self,
        caller: u16,
        name: &str,
        params: &[CallbackParam],
        out: &mut CellWriter,
        prepend_caller_id: bool,
    ) -> Result<bool> {
        let Some(signature) = self.get(name) else {
            return Ok(false);
        };
        if params.len() > MAX_CALLBACK_PARAMS {
            return Err(signature_error(name, "too many parameters"));
        }
        if params.len() != signature.len() {
            return Err(signature_error(
                name,
                &format!("expected {} parameters, got {}", signature.len(), params.len()),
            ));
        }

        if prepend_caller_id {
            out.put_u16(caller)?;
        }
        out.put_cstr(name)?;

        for (index, (kind, param)) in signature.iter().zip(params).enumerate() {
            match (kind, param) {
                (ParamKind::Value, param) => {
                    let cell = param.as_cell().ok_or_else(|| {
                        signature_error(name, &format!("parameter {} is not a value", index))
                    })?;
                    out.put_i32(cell)?;
                }
                (ParamKind::Str, CallbackParam::Str(text)) => out.put_cstr(text)?,
                (ParamKind::Array { length_param }, CallbackParam::Array(cells)) => {
                    let declared = params
                        .get(*length_param as usize)
                        .and_then(CallbackParam::as_cell);
                    if declared != i32::try_from(cells.len()).ok() {
                        return Err(signature_error(
                            name,
                            &format!(
                                "array parameter {} has {} cells, length parameter says {:?}",
                                index,
                                cells.len(),
                                declared
                            ),
                        ));
                    }
                    out.put_u32(cells.len() as u32)?;
                    for &cell in cells {
                        out.put_i32(cell)?;
                    }
                }
                (expected, _) => {
                    return Err(signature_error(
                        name,
                        &format!("parameter {} should be {:?}", index, expected),
                    ))
                }
            }
        }

        Ok(true)
    }
}

/// Decode a call buffer against a signature (the remote's side of
/// [`CallbackRegistry::fill_call_buffer`]).
pub fn decode_call_buffer(
    signature: &[ParamKind],
    buf: &[u8],
    has_caller_id: bool,
) -> Result<DecodedCall> {
    let mut reader = CellReader::new(buf);
    let caller = if has_caller_id {
        Some(reader.read_u16()?)
    } else {
        None
    };
    let name = reader.read_cstr()?.to_string();

    let mut params = Vec::with_capacity(signature.len());
    for kind in signature {
        let param = match kind {
            ParamKind::Value => CallbackParam::Int(reader.read_i32()?),
            ParamKind::Str => CallbackParam::Str(reader.read_cstr()?.to_string()),
            ParamKind::Array { .. } => {
                let count = reader.read_u32()? as usize;
                if count > reader.remaining() / 4 {
                    return Err(BridgeError::Protocol(format!(
                        "array of {} cells overruns the buffer",
                        count
                    )));
                }
                let cells = (0..count)
                    .map(|_| reader.read_i32())
                    .collect::<Result<Vec<_>>>()?;
                CallbackParam::Array(cells)
            }
        };
        params.push(param);
    }

    if !reader.is_empty() {
        return Err(BridgeError::Protocol(format!(
            "{} trailing bytes after call to {}",
            reader.remaining(),
            name
        )));
    }

    Ok(DecodedCall {
        caller,
        name,
        params,
    })
}

fn signature_error(name: &str, reason: &str) -> BridgeError {
    BridgeError::SignatureMismatch {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
