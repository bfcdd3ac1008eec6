//! Key/value float properties shared in both directions.

use std::collections::HashMap;

use bytes::Bytes;
use uuid::{uuid, Uuid};

use super::{IncomingMessage, OutgoingMessage, SideChannel};
use crate::error::Result;

const CHANNEL_ID: Uuid = uuid!("60ccf7d0-4f7e-11ea-b238-784f4387d1f7");

/// Float properties readable and writable from both ends.
///
/// Message body: `key: string, value: f32`.
#[derive(Debug, Default)]
pub struct FloatPropertiesChannel {
    properties: HashMap<String, f32>,
    outgoing: Vec<Bytes>,
}

impl FloatPropertiesChannel {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Well-known channel id
    pub fn id() -> Uuid {
        CHANNEL_ID
    }

    /// Set a property locally and queue it for the simulation
    pub fn set_property(&mut self, key: &str, value: f32) {
        self.properties.insert(key.to_string(), value);
        let mut msg = OutgoingMessage::new();
        msg.write_string(key).write_f32(value);
        self.outgoing.push(msg.into_bytes());
    }

    /// Latest known value of a property
    pub fn get_property(&self, key: &str) -> Option<f32> {
        self.properties.get(key).copied()
    }

    /// Names of every known property
    pub fn list_properties(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    /// Snapshot of every property
    pub fn get_property_dict_copy(&self) -> HashMap<String, f32> {
        self.properties.clone()
    }
}

impl SideChannel for FloatPropertiesChannel {
    fn channel_id(&self) -> Uuid {
        CHANNEL_ID
    }

    fn on_message_received(&mut self, mut msg: IncomingMessage) -> Result<()> {
        let key = msg.read_string("");
        let value = msg.read_f32(0.0);
        self.properties.insert(key, value);
        Ok(())
    }

    fn take_outgoing(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outgoing)
    }
}
