//! Typed readers and writers for side channel message bodies.
//!
//! All integers and floats are little-endian. Lists and strings carry an
//! `i32` length prefix. Readers never fail: reading past the end of the
//! buffer yields the caller-supplied default, matching what the simulation
//! side does with truncated messages.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Message received from the simulation on one side channel
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    buffer: Bytes,
}

impl IncomingMessage {
    /// Wrap a raw message body
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
        }
    }

    /// Read a boolean (one byte)
    pub fn read_bool(&mut self, default: bool) -> bool {
        if self.buffer.remaining() < 1 {
            return default;
        }
        self.buffer.get_u8() != 0
    }

    /// Read a 32-bit signed integer
    pub fn read_i32(&mut self, default: i32) -> i32 {
        if self.buffer.remaining() < 4 {
            return default;
        }
        self.buffer.get_i32_le()
    }

    /// Read a 32-bit float
    pub fn read_f32(&mut self, default: f32) -> f32 {
        if self.buffer.remaining() < 4 {
            return default;
        }
        self.buffer.get_f32_le()
    }

    /// Read a length-prefixed list of floats
    pub fn read_f32_list(&mut self, default: Vec<f32>) -> Vec<f32> {
        if self.buffer.remaining() < 4 {
            return default;
        }
        let len = (self.buffer.get_i32_le().max(0) as usize).min(self.buffer.remaining() / 4);
        (0..len).map(|_| self.read_f32(0.0)).collect()
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self, default: &str) -> String {
        if self.buffer.remaining() < 4 {
            return default.to_string();
        }
        let len = (self.buffer.get_i32_le().max(0) as usize).min(self.buffer.remaining());
        let raw = self.buffer.split_to(len);
        String::from_utf8_lossy(&raw).into_owned()
    }

    /// Everything not read yet
    pub fn remaining_bytes(&self) -> Bytes {
        self.buffer.clone()
    }

    /// Whether every byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        !self.buffer.has_remaining()
    }
}

/// Message queued for the simulation on one side channel
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    buffer: BytesMut,
}

impl OutgoingMessage {
    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a boolean
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.buffer.put_u8(u8::from(value));
        self
    }

    /// Append a 32-bit signed integer
    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buffer.put_i32_le(value);
        self
    }

    /// Append a 32-bit float
    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buffer.put_f32_le(value);
        self
    }

    /// Append a length-prefixed list of floats
    pub fn write_f32_list(&mut self, values: &[f32]) -> &mut Self {
        self.write_i32(values.len() as i32);
        for &v in values {
            self.buffer.put_f32_le(v);
        }
        self
    }

    /// Append a length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_i32(value.len() as i32);
        self.buffer.put_slice(value.as_bytes());
        self
    }

    /// Replace the whole body with raw bytes
    pub fn set_raw_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.clear();
        self.buffer.put_slice(data);
        self
    }

    /// Finish the message
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}
