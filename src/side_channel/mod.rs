//! Side channels: auxiliary message streams riding on every exchange.
//!
//! Each channel is addressed by a GUID. Outgoing messages are queued by the
//! caller between steps and flushed with the next `step`/`reset`; incoming
//! messages are dispatched right after the session stores the new state,
//! before control returns to the caller.
//!
//! Channels are shared between the caller and the session as
//! `Arc<Mutex<_>>` handles:
//!
//! ```rust,ignore
//! use std::sync::{Arc, Mutex};
//! use simlink::side_channel::{EnvironmentParametersChannel, SharedSideChannel};
//!
//! let params = Arc::new(Mutex::new(EnvironmentParametersChannel::new()));
//! let channels = vec![params.clone() as SharedSideChannel];
//! // ... hand `channels` to the session ...
//! params.lock().unwrap().set_float_parameter("gravity", -9.81);
//! ```
//!
//! | Channel                         | Direction        |
//! |---------------------------------|------------------|
//! | [`RawBytesChannel`]             | Both             |
//! | [`FloatPropertiesChannel`]      | Both             |
//! | [`EngineConfigurationChannel`]  | To simulation    |
//! | [`EnvironmentParametersChannel`]| To simulation    |
//! | [`StatsSideChannel`]            | From simulation  |

mod engine_config;
mod environment_parameters;
mod float_properties;
mod manager;
mod message;
mod raw_bytes;
mod stats;

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Result, SimLinkError};

pub use engine_config::{ConfigurationType, EngineConfig, EngineConfigurationChannel};
pub use environment_parameters::{EnvironmentDataType, EnvironmentParametersChannel, SamplerType};
pub use float_properties::FloatPropertiesChannel;
pub use manager::{SideChannelManager, MESSAGE_HEADER_SIZE};
pub use message::{IncomingMessage, OutgoingMessage};
pub use raw_bytes::RawBytesChannel;
pub use stats::{StatsAggregationMethod, StatsSideChannel};

/// An independently addressed message stream
pub trait SideChannel: Send {
    /// GUID identifying this channel on both ends
    fn channel_id(&self) -> Uuid;

    /// Handle one message from the simulation
    fn on_message_received(&mut self, msg: IncomingMessage) -> Result<()>;

    /// Hand over every queued outgoing message, leaving the queue empty
    fn take_outgoing(&mut self) -> Vec<Bytes>;
}

/// Side channel handle shared between the caller and the session
pub type SharedSideChannel = Arc<Mutex<dyn SideChannel>>;

pub(crate) fn lock_channel(
    channel: &SharedSideChannel,
) -> Result<MutexGuard<'_, dyn SideChannel + 'static>> {
    channel
        .lock()
        .map_err(|_| SimLinkError::SideChannel("side channel lock poisoned".to_string()))
}
