//! Environment parameters and samplers sent to the simulation.

use bytes::Bytes;
use uuid::{uuid, Uuid};

use super::{IncomingMessage, OutgoingMessage, SideChannel};
use crate::error::{Result, SimLinkError};

const CHANNEL_ID: Uuid = uuid!("534c891e-810f-11ea-a9d0-822485860400");

/// Parameter record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EnvironmentDataType {
    /// Fixed float value
    Float = 0,
    /// Value drawn by the simulation from a sampler at each episode
    Sampler = 1,
}

/// Sampler kind for [`EnvironmentDataType::Sampler`] records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SamplerType {
    /// `min: f32, max: f32`
    Uniform = 0,
    /// `mean: f32, st_dev: f32`
    Gaussian = 1,
    /// Flattened `[min, max]` intervals
    MultiRangeUniform = 2,
}

/// Send-only channel setting named environment parameters.
///
/// Float record: `key, FLOAT, value`. Sampler record:
/// `key, SAMPLER, seed, sampler type, sampler arguments`.
#[derive(Debug, Default)]
pub struct EnvironmentParametersChannel {
    outgoing: Vec<Bytes>,
}

impl EnvironmentParametersChannel {
    /// Create the channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Well-known channel id
    pub fn id() -> Uuid {
        CHANNEL_ID
    }

    /// Set a parameter to a fixed value
    pub fn set_float_parameter(&mut self, key: &str, value: f32) {
        let mut msg = OutgoingMessage::new();
        msg.write_string(key)
            .write_i32(EnvironmentDataType::Float as i32)
            .write_f32(value);
        self.outgoing.push(msg.into_bytes());
    }

    /// Sample a parameter uniformly from `[min_value, max_value)`
    pub fn set_uniform_sampler_parameters(&mut self, key: &str, min_value: f32, max_value: f32, seed: i32) {
        let mut msg = Self::sampler_header(key, seed, SamplerType::Uniform);
        msg.write_f32(min_value).write_f32(max_value);
        self.outgoing.push(msg.into_bytes());
    }

    /// Sample a parameter from a normal distribution
    pub fn set_gaussian_sampler_parameters(&mut self, key: &str, mean: f32, st_dev: f32, seed: i32) {
        let mut msg = Self::sampler_header(key, seed, SamplerType::Gaussian);
        msg.write_f32(mean).write_f32(st_dev);
        self.outgoing.push(msg.into_bytes());
    }

    /// Sample a parameter uniformly from a union of `(min, max)` intervals
    pub fn set_multirangeuniform_sampler_parameters(
        &mut self,
        key: &str,
        intervals: &[(f32, f32)],
        seed: i32,
    ) {
        let flattened: Vec<f32> = intervals.iter().flat_map(|&(lo, hi)| [lo, hi]).collect();
        let mut msg = Self::sampler_header(key, seed, SamplerType::MultiRangeUniform);
        msg.write_f32_list(&flattened);
        self.outgoing.push(msg.into_bytes());
    }

    fn sampler_header(key: &str, seed: i32, sampler: SamplerType) -> OutgoingMessage {
        let mut msg = OutgoingMessage::new();
        msg.write_string(key)
            .write_i32(EnvironmentDataType::Sampler as i32)
            .write_i32(seed)
            .write_i32(sampler as i32);
        msg
    }
}

impl SideChannel for EnvironmentParametersChannel {
    fn channel_id(&self) -> Uuid {
        CHANNEL_ID
    }

    fn on_message_received(&mut self, _msg: IncomingMessage) -> Result<()> {
        Err(SimLinkError::SideChannel(
            "The EnvironmentParametersChannel received a message from the simulation, \
             this should not have happened."
                .to_string(),
        ))
    }

    fn take_outgoing(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outgoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_parameter_record() {
        let mut channel = EnvironmentParametersChannel::new();
        channel.set_float_parameter("mass", 1.5);

        let mut msg = IncomingMessage::new(channel.take_outgoing().remove(0));
        assert_eq!(msg.read_string(""), "mass");
        assert_eq!(msg.read_i32(-1), EnvironmentDataType::Float as i32);
        assert!((msg.read_f32(0.0) - 1.5).abs() < f32::EPSILON);
        assert!(msg.is_exhausted());
    }

    #[test]
    fn test_multirange_sampler_record() {
        let mut channel = EnvironmentParametersChannel::new();
        channel.set_multirangeuniform_sampler_parameters("length", &[(1.0, 2.0), (5.0, 6.0)], 42);

        let mut msg = IncomingMessage::new(channel.take_outgoing().remove(0));
        assert_eq!(msg.read_string(""), "length");
        assert_eq!(msg.read_i32(-1), EnvironmentDataType::Sampler as i32);
        assert_eq!(msg.read_i32(-1), 42);
        assert_eq!(msg.read_i32(-1), SamplerType::MultiRangeUniform as i32);
        assert_eq!(msg.read_f32_list(vec![]), vec![1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn test_gaussian_and_uniform_queue_in_order() {
        let mut channel = EnvironmentParametersChannel::new();
        channel.set_uniform_sampler_parameters("a", 0.0, 1.0, 1);
        channel.set_gaussian_sampler_parameters("b", 0.0, 1.0, 2);

        let queued = channel.take_outgoing();
        assert_eq!(queued.len(), 2);
        let mut second = IncomingMessage::new(queued[1].clone());
        assert_eq!(second.read_string(""), "b");
        second.read_i32(0);
        second.read_i32(0);
        assert_eq!(second.read_i32(-1), SamplerType::Gaussian as i32);
    }
}
