//! Protocol messages exchanged with the remote simulation.
//!
//! Only the fields the session reads or writes are modelled. Inputs flow
//! from SimLink to the simulation, outputs flow back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::capabilities::RlCapabilities;

/// Command carried by every RL input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Advance the simulation one decision step
    #[default]
    Step,
    /// Reset all episodes
    Reset,
    /// Shut the simulation down
    Quit,
}

/// Action space kind as declared by the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpaceType {
    /// One integer per branch
    #[default]
    Discrete,
    /// Real-valued vector
    Continuous,
}

/// Top-level message sent to the simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnityInput {
    /// Step/reset payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rl_input: Option<RlInput>,
    /// Handshake payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rl_initialization_input: Option<RlInitializationInput>,
}

impl UnityInput {
    /// Wrap a step/reset payload
    pub fn rl(rl_input: RlInput) -> Self {
        Self {
            rl_input: Some(rl_input),
            rl_initialization_input: None,
        }
    }

    /// Wrap a handshake payload
    pub fn initialization(init: RlInitializationInput) -> Self {
        Self {
            rl_input: None,
            rl_initialization_input: Some(init),
        }
    }

    /// Command carried by the RL payload, if any
    pub fn command(&self) -> Option<Command> {
        self.rl_input.as_ref().map(|rl| rl.command)
    }
}

/// Per-step input: actions, command and side channel payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RlInput {
    /// Actions keyed by behavior name, one entry per decision agent in batch order
    #[serde(default)]
    pub agent_actions: HashMap<String, Vec<AgentActionProto>>,
    /// Command for this exchange
    #[serde(default)]
    pub command: Command,
    /// Multiplexed side channel messages
    #[serde(default, with = "super::bytes_base64")]
    pub side_channel: Vec<u8>,
}

/// Flattened action vector for one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentActionProto {
    /// Action values; discrete branches are sent as whole floats
    #[serde(default)]
    pub vector_actions: Vec<f32>,
}

/// Handshake input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RlInitializationInput {
    /// Seed forwarded to the simulation
    pub seed: i32,
    /// Local communication API version
    pub communication_version: String,
    /// Local package version
    pub package_version: String,
    /// Local capabilities
    pub capabilities: RlCapabilities,
}

/// Top-level message received from the simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnityOutput {
    /// Per-step output
    #[serde(default)]
    pub rl_output: RlOutput,
    /// Handshake output, also present when new behaviors appear mid-run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rl_initialization_output: Option<RlInitializationOutput>,
}

/// Per-step output: agent infos and side channel payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RlOutput {
    /// Agent info records keyed by behavior name
    #[serde(default)]
    pub agent_infos: HashMap<String, Vec<AgentInfoProto>>,
    /// Multiplexed side channel messages
    #[serde(default, with = "super::bytes_base64")]
    pub side_channel: Vec<u8>,
}

/// Handshake output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RlInitializationOutput {
    /// Simulation name
    #[serde(default)]
    pub name: String,
    /// Remote communication API version
    #[serde(default)]
    pub communication_version: String,
    /// Remote package version
    #[serde(default)]
    pub package_version: String,
    /// Remote log path
    #[serde(default)]
    pub log_path: String,
    /// Remote capabilities; absent on old simulations
    #[serde(default)]
    pub capabilities: Option<RlCapabilities>,
    /// Declared behaviors
    #[serde(default)]
    pub brain_parameters: Vec<BrainParametersProto>,
}

/// Action space declaration for one behavior
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrainParametersProto {
    /// Behavior name
    pub brain_name: String,
    /// Continuous: `[size]`. Discrete: one entry per branch.
    #[serde(default)]
    pub vector_action_size: Vec<i32>,
    /// Human-readable action labels
    #[serde(default)]
    pub vector_action_descriptions: Vec<String>,
    /// Action space kind
    #[serde(default)]
    pub vector_action_space_type: SpaceType,
    /// Whether the simulation trains this behavior
    #[serde(default)]
    pub is_training: bool,
}

/// State of one agent at the current step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInfoProto {
    /// Reward since the last decision
    #[serde(default)]
    pub reward: f32,
    /// Episode ended
    #[serde(default)]
    pub done: bool,
    /// Episode ended because it hit its step limit
    #[serde(default)]
    pub max_step_reached: bool,
    /// Agent id, unique within the behavior's batch
    pub id: i32,
    /// Discrete action mask, `true` = action unavailable
    #[serde(default)]
    pub action_mask: Vec<bool>,
    /// Observations in declaration order
    #[serde(default)]
    pub observations: Vec<ObservationProto>,
}

/// Dense observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationProto {
    /// Observation shape
    pub shape: Vec<usize>,
    /// Row-major values
    #[serde(default)]
    pub float_data: Vec<f32>,
}

impl ObservationProto {
    /// Create a flat vector observation
    pub fn vector(values: Vec<f32>) -> Self {
        Self {
            shape: vec![values.len()],
            float_data: values,
        }
    }
}
