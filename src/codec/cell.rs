//! Little-endian cell codec for command payloads.
//!
//! The remote runtime speaks in 32-bit "cells" (the host script VM's word
//! size), 16-bit caller ids and NUL-terminated strings. [`CellReader`] reads
//! them with explicit bounds checks; [`CellWriter`] appends them to a
//! `BytesMut` and refuses to grow past the payload limit.
//!
//! # Example
//!
//! ```
//! use scriptwire_host::codec::{CellReader, CellWriter};
//!
//! let mut writer = CellWriter::new(64);
//! writer.put_u16(7).unwrap();
//! writer.put_cstr("SetPlayerHealth").unwrap();
//! writer.put_i32(-1).unwrap();
//! let bytes = writer.freeze();
//!
//! let mut reader = CellReader::new(&bytes);
//! assert_eq!(reader.read_u16().unwrap(), 7);
//! assert_eq!(reader.read_cstr().unwrap(), "SetPlayerHealth");
//! assert_eq!(reader.read_i32().unwrap(), -1);
//! assert!(reader.is_empty());
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{BridgeError, Result};

/// Bounds-checked reader over a received payload.
#[derive(Debug, Clone)]
pub struct CellReader<'a> {
    buf: &'a [u8],
}

impl<'a> CellReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn require(&self, len: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < len {
            return Err(BridgeError::Protocol(format!(
                "truncated payload: need {} bytes for {}, have {}",
                len,
                what,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1, "u8")?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.require(2, "u16")?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.require(4, "u32")?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.require(4, "cell")?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.require(4, "float cell")?;
        Ok(self.buf.get_f32_le())
    }

    /// Read a NUL-terminated UTF-8 string.
    ///
    /// A missing terminator is accepted when the string runs to the end of
    /// the payload, which is how the remote sends single-name payloads.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let buf = self.buf;
        let (raw, consumed) = match buf.iter().position(|&b| b == 0) {
            Some(nul) => (&buf[..nul], nul + 1),
            None => (buf, buf.len()),
        };
        let text = std::str::from_utf8(raw)
            .map_err(|e| BridgeError::Protocol(format!("string is not UTF-8: {}", e)))?;
        self.buf = &buf[consumed..];
        Ok(text)
    }

    /// Take everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = self.buf;
        self.buf = &[];
        rest
    }
}

/// Appends cells to an owned buffer with a hard size limit.
#[derive(Debug)]
pub struct CellWriter {
    buf: BytesMut,
    limit: usize,
}

impl CellWriter {
    /// Create a writer that refuses to grow beyond `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit.min(1024)),
            limit,
        }
    }

    /// Continue writing into an existing buffer.
    pub fn with_buffer(buf: BytesMut, limit: usize) -> Self {
        Self { buf, limit }
    }

    fn reserve(&mut self, len: usize) -> Result<()> {
        let total = self.buf.len() + len;
        if total > self.limit {
            return Err(BridgeError::PayloadTooLarge {
                len: total,
                max: self.limit,
            });
        }
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.reserve(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.reserve(2)?;
        self.buf.put_u16_le(value);
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.reserve(4)?;
        self.buf.put_u32_le(value);
        Ok(())
    }

    pub fn put_i32(&mut self, value: i32) -> Result<()> {
        self.reserve(4)?;
        self.buf.put_i32_le(value);
        Ok(())
    }

    pub fn put_f32(&mut self, value: f32) -> Result<()> {
        self.reserve(4)?;
        self.buf.put_f32_le(value);
        Ok(())
    }

    /// Write a string followed by a NUL terminator.
    ///
    /// Interior NULs would truncate the string on the other side, so they are
    /// rejected.
    pub fn put_cstr(&mut self, value: &str) -> Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(BridgeError::Protocol(format!(
                "string {:?} contains a NUL byte",
                value
            )));
        }
        self.reserve(value.len() + 1)?;
        self.buf.put_slice(value.as_bytes());
        self.buf.put_u8(0);
        Ok(())
    }

    pub fn put_slice(&mut self, value: &[u8]) -> Result<()> {
        self.reserve(value.len())?;
        self.buf.put_slice(value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
