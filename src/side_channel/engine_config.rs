//! Engine configuration sent to the simulation.
//!
//! Each message is one typed record: an `i32` configuration type followed
//! by its values.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};

use super::{IncomingMessage, OutgoingMessage, SideChannel};
use crate::error::{Result, SimLinkError};

const CHANNEL_ID: Uuid = uuid!("e951342c-4f7e-11ea-b238-784f4387d1f7");

/// Engine configuration record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ConfigurationType {
    /// `width: i32, height: i32`
    ScreenResolution = 0,
    /// `level: i32`
    QualityLevel = 1,
    /// `scale: f32`
    TimeScale = 2,
    /// `fps: i32`
    TargetFrameRate = 3,
    /// `fps: i32`
    CaptureFrameRate = 4,
}

/// Engine settings; unset fields are not sent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window width in pixels
    pub width: Option<i32>,
    /// Window height in pixels
    pub height: Option<i32>,
    /// Rendering quality level
    pub quality_level: Option<i32>,
    /// Simulation speed multiplier
    pub time_scale: Option<f32>,
    /// Target frames per second, `-1` for unlimited
    pub target_frame_rate: Option<i32>,
    /// Fixed capture frame rate
    pub capture_frame_rate: Option<i32>,
}

impl EngineConfig {
    /// Settings commonly used for training: small window, fast clock
    pub fn training() -> Self {
        Self {
            width: Some(84),
            height: Some(84),
            quality_level: Some(5),
            time_scale: Some(20.0),
            target_frame_rate: Some(-1),
            capture_frame_rate: Some(60),
        }
    }
}

/// Send-only channel configuring the simulation engine
#[derive(Debug, Default)]
pub struct EngineConfigurationChannel {
    outgoing: Vec<Bytes>,
}

impl EngineConfigurationChannel {
    /// Create the channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Well-known channel id
    pub fn id() -> Uuid {
        CHANNEL_ID
    }

    /// Queue every set field of `config`.
    ///
    /// Width and height are sent together; a lone dimension is ignored.
    pub fn set_configuration(&mut self, config: &EngineConfig) {
        if let (Some(width), Some(height)) = (config.width, config.height) {
            self.queue(ConfigurationType::ScreenResolution, |msg| {
                msg.write_i32(width).write_i32(height);
            });
        }
        if let Some(level) = config.quality_level {
            self.queue(ConfigurationType::QualityLevel, |msg| {
                msg.write_i32(level);
            });
        }
        if let Some(scale) = config.time_scale {
            self.queue(ConfigurationType::TimeScale, |msg| {
                msg.write_f32(scale);
            });
        }
        if let Some(fps) = config.target_frame_rate {
            self.queue(ConfigurationType::TargetFrameRate, |msg| {
                msg.write_i32(fps);
            });
        }
        if let Some(fps) = config.capture_frame_rate {
            self.queue(ConfigurationType::CaptureFrameRate, |msg| {
                msg.write_i32(fps);
            });
        }
    }

    fn queue(&mut self, kind: ConfigurationType, body: impl FnOnce(&mut OutgoingMessage)) {
        let mut msg = OutgoingMessage::new();
        msg.write_i32(kind as i32);
        body(&mut msg);
        self.outgoing.push(msg.into_bytes());
    }
}

impl SideChannel for EngineConfigurationChannel {
    fn channel_id(&self) -> Uuid {
        CHANNEL_ID
    }

    fn on_message_received(&mut self, _msg: IncomingMessage) -> Result<()> {
        Err(SimLinkError::SideChannel(
            "The EngineConfigurationChannel received a message from the simulation, \
             this should not have happened."
                .to_string(),
        ))
    }

    fn take_outgoing(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outgoing)
    }
}
