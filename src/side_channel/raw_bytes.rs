//! Side channel carrying opaque byte messages.

use bytes::Bytes;
use uuid::Uuid;

use super::{IncomingMessage, SideChannel};
use crate::error::Result;

/// Sends and collects raw byte messages on a caller-chosen channel id
#[derive(Debug)]
pub struct RawBytesChannel {
    channel_id: Uuid,
    received: Vec<Bytes>,
    outgoing: Vec<Bytes>,
}

impl RawBytesChannel {
    /// Create a channel with the given id
    pub fn new(channel_id: Uuid) -> Self {
        Self {
            channel_id,
            received: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Queue bytes for the next exchange
    pub fn send_raw_data(&mut self, data: &[u8]) {
        self.outgoing.push(Bytes::copy_from_slice(data));
    }

    /// Messages received since the last call
    pub fn get_and_clear_received_messages(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.received)
    }
}

impl SideChannel for RawBytesChannel {
    fn channel_id(&self) -> Uuid {
        self.channel_id
    }

    fn on_message_received(&mut self, msg: IncomingMessage) -> Result<()> {
        self.received.push(msg.remaining_bytes());
        Ok(())
    }

    fn take_outgoing(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outgoing)
    }
}
