//! Multiplexing of side channel messages into one exchange payload.
//!
//! # Wire format
//!
//! ```text
//! +----------------------+---------------+----------------+
//! | Channel id (16B GUID)| Length (i32LE)| Message bytes  |  repeated
//! +----------------------+---------------+----------------+
//! ```
//!
//! The channel id uses the little-endian GUID layout of the simulation
//! runtime ([`Uuid::to_bytes_le`]).

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use super::message::IncomingMessage;
use super::{lock_channel, SharedSideChannel};
use crate::error::{Result, SimLinkError};

/// Size of the per-message header: channel id + length
pub const MESSAGE_HEADER_SIZE: usize = 16 + 4;

/// Registry of side channels attached to one session
#[derive(Default)]
pub struct SideChannelManager {
    channels: HashMap<Uuid, SharedSideChannel>,
}

impl SideChannelManager {
    /// Register channels; ids must be unique
    pub fn new(channels: impl IntoIterator<Item = SharedSideChannel>) -> Result<Self> {
        let mut registry = HashMap::new();
        for channel in channels {
            let id = lock_channel(&channel)?.channel_id();
            if registry.insert(id, channel).is_some() {
                return Err(SimLinkError::SideChannel(format!(
                    "There cannot be two side channels with the same channel id {id}"
                )));
            }
        }
        Ok(Self { channels: registry })
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// No channels registered
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Whether a channel id is registered
    pub fn contains(&self, id: &Uuid) -> bool {
        self.channels.contains_key(id)
    }

    /// Drain every channel's queue into one payload.
    ///
    /// An empty payload is valid and means no channel had anything to say.
    pub fn generate_side_channel_messages(&self) -> Result<Vec<u8>> {
        let mut payload = BytesMut::new();
        for (id, channel) in &self.channels {
            let queued = lock_channel(channel)?.take_outgoing();
            for message in queued {
                let len = i32::try_from(message.len()).map_err(|_| {
                    SimLinkError::SideChannel(format!(
                        "Message of {} bytes on channel {id} exceeds the frame limit",
                        message.len()
                    ))
                })?;
                payload.put_slice(&id.to_bytes_le());
                payload.put_i32_le(len);
                payload.put_slice(&message);
            }
        }
        Ok(payload.to_vec())
    }

    /// Split a payload into `(channel id, message)` pairs without dispatching
    pub fn parse(data: &[u8]) -> Result<Vec<(Uuid, Bytes)>> {
        let mut buf = Bytes::copy_from_slice(data);
        let mut messages = Vec::new();

        while buf.has_remaining() {
            if buf.remaining() < MESSAGE_HEADER_SIZE {
                return Err(SimLinkError::SideChannel(
                    "There was a problem reading a message in a side channel. \
                     Make sure the simulation package version is compatible with SimLink."
                        .to_string(),
                ));
            }
            let mut id_bytes = [0u8; 16];
            buf.copy_to_slice(&mut id_bytes);
            let channel_id = Uuid::from_bytes_le(id_bytes);

            let len = buf.get_i32_le();
            let len = usize::try_from(len).map_err(|_| {
                SimLinkError::SideChannel(format!(
                    "Negative message length {len} on side channel {channel_id}"
                ))
            })?;
            if buf.remaining() < len {
                return Err(SimLinkError::SideChannel(format!(
                    "The message received by the side channel {channel_id} was unexpectedly short"
                )));
            }
            messages.push((channel_id, buf.split_to(len)));
        }

        Ok(messages)
    }

    /// Hand parsed messages to their channels; unknown ids are skipped
    pub fn dispatch(&self, messages: Vec<(Uuid, Bytes)>) -> Result<()> {
        for (channel_id, body) in messages {
            match self.channels.get(&channel_id) {
                Some(channel) => {
                    lock_channel(channel)?.on_message_received(IncomingMessage::new(body))?;
                },
                None => {
                    tracing::warn!("Unknown side channel data received. Channel type: {channel_id}");
                },
            }
        }
        Ok(())
    }

    /// Parse and dispatch an incoming payload
    pub fn process_side_channel_message(&self, data: &[u8]) -> Result<()> {
        let messages = Self::parse(data)?;
        self.dispatch(messages)
    }
}

impl std::fmt::Debug for SideChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideChannelManager")
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .finish()
    }
}
