//! Shared fixtures: a scripted communicator and response builders.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use simlink::protocol::{
    AgentInfoProto, BrainParametersProto, ObservationProto, RlCapabilities,
    RlInitializationOutput, RlOutput, SpaceType, UnityInput, UnityOutput,
};
use simlink::{Communicator, Result, SimLinkError};

/// What the scripted remote does on the next call
pub enum Reply {
    /// Answer with this output
    Output(UnityOutput),
    /// The remote is gone
    Stopped,
    /// The transport fails
    Fail,
}

/// Communicator replaying canned replies and recording every input
#[derive(Clone, Default)]
pub struct Scripted {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    sent: Arc<Mutex<Vec<UnityInput>>>,
    closes: Arc<Mutex<usize>>,
}

impl Scripted {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            ..Default::default()
        }
    }

    /// Queue another reply
    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Every input sent so far
    pub fn sent(&self) -> Vec<UnityInput> {
        self.sent.lock().unwrap().clone()
    }

    /// Most recent input
    pub fn last_sent(&self) -> UnityInput {
        self.sent.lock().unwrap().last().cloned().expect("nothing sent")
    }

    /// How many times `close` was called
    pub fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }

    fn next(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
        self.sent.lock().unwrap().push(input);
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Output(output)) => Ok(Some(output)),
            Some(Reply::Stopped) | None => Ok(None),
            Some(Reply::Fail) => Err(SimLinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted failure",
            ))),
        }
    }
}

impl Communicator for Scripted {
    fn initialize(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
        self.next(input)
    }

    fn exchange(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
        self.next(input)
    }

    fn close(&mut self) {
        *self.closes.lock().unwrap() += 1;
    }
}

pub fn continuous_brain(name: &str, size: i32) -> BrainParametersProto {
    BrainParametersProto {
        brain_name: name.to_string(),
        vector_action_size: vec![size],
        vector_action_space_type: SpaceType::Continuous,
        is_training: true,
        ..Default::default()
    }
}

pub fn discrete_brain(name: &str, branches: Vec<i32>) -> BrainParametersProto {
    BrainParametersProto {
        brain_name: name.to_string(),
        vector_action_size: branches,
        vector_action_space_type: SpaceType::Discrete,
        is_training: true,
        ..Default::default()
    }
}

/// Handshake reply with the given remote API version
pub fn handshake(version: &str, brains: Vec<BrainParametersProto>) -> UnityOutput {
    UnityOutput {
        rl_initialization_output: Some(RlInitializationOutput {
            name: "TestArena".to_string(),
            communication_version: version.to_string(),
            package_version: "1.2.0".to_string(),
            log_path: "/tmp/arena.log".to_string(),
            capabilities: Some(RlCapabilities::default()),
            brain_parameters: brains,
        }),
        ..Default::default()
    }
}

/// A live agent with a 3-float vector observation
pub fn agent(id: i32, reward: f32) -> AgentInfoProto {
    AgentInfoProto {
        id,
        reward,
        observations: vec![ObservationProto::vector(vec![id as f32, 0.0, 1.0])],
        ..Default::default()
    }
}

/// An agent whose episode ended this step
pub fn done_agent(id: i32, reward: f32, interrupted: bool) -> AgentInfoProto {
    AgentInfoProto {
        done: true,
        max_step_reached: interrupted,
        ..agent(id, reward)
    }
}

/// Step reply; `brains` are redeclared alongside the agent infos
pub fn step_output(
    brains: Vec<BrainParametersProto>,
    infos: Vec<(&str, Vec<AgentInfoProto>)>,
) -> UnityOutput {
    let agent_infos: HashMap<String, Vec<AgentInfoProto>> = infos
        .into_iter()
        .map(|(name, records)| (name.to_string(), records))
        .collect();
    UnityOutput {
        rl_output: RlOutput {
            agent_infos,
            side_channel: Vec::new(),
        },
        rl_initialization_output: if brains.is_empty() {
            None
        } else {
            Some(RlInitializationOutput {
                brain_parameters: brains,
                ..Default::default()
            })
        },
    }
}
