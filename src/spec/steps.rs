//! Decision and terminal step batches built from agent info records.
//!
//! Each step the simulation reports every agent of a behavior once. Agents
//! that still need an action land in [`DecisionSteps`], agents whose episode
//! just ended land in [`TerminalSteps`]. Observations are batched per
//! observation index: the leading axis is the agent's position in the batch.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};

use super::behavior::{AgentId, BehaviorSpec};
use crate::error::{Result, SimLinkError};
use crate::protocol::AgentInfoProto;

/// Agents requesting a decision this step
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionSteps {
    /// One array per observation, shape `(n_agents, *obs_shape)`
    pub obs: Vec<ArrayD<f32>>,
    /// Reward since the last decision, per agent
    pub reward: Array1<f32>,
    /// Agent ids in batch order
    pub agent_id: Vec<AgentId>,
    /// Per-branch masks for discrete behaviors, `true` = action unavailable
    pub action_mask: Option<Vec<Array2<bool>>>,
    agent_id_to_index: HashMap<AgentId, usize>,
}

/// A single agent's decision step
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionStep {
    /// One array per observation
    pub obs: Vec<ArrayD<f32>>,
    /// Reward since the last decision
    pub reward: f32,
    /// Agent id
    pub agent_id: AgentId,
    /// Per-branch masks, `true` = action unavailable
    pub action_mask: Option<Vec<Array1<bool>>>,
}

impl DecisionSteps {
    /// Assemble a batch; observation and mask rows must follow `agent_id` order
    pub fn new(
        obs: Vec<ArrayD<f32>>,
        reward: Array1<f32>,
        agent_id: Vec<AgentId>,
        action_mask: Option<Vec<Array2<bool>>>,
    ) -> Self {
        let agent_id_to_index = index_agents(&agent_id);
        Self {
            obs,
            reward,
            agent_id,
            action_mask,
            agent_id_to_index,
        }
    }

    /// Canonical empty batch for a spec
    pub fn empty(spec: &BehaviorSpec) -> Self {
        Self::new(empty_obs(spec), Array1::zeros(0), Vec::new(), None)
    }

    /// Number of agents
    pub fn len(&self) -> usize {
        self.agent_id.len()
    }

    /// No agents requested a decision
    pub fn is_empty(&self) -> bool {
        self.agent_id.is_empty()
    }

    /// Map from agent id to batch position
    pub fn agent_id_to_index(&self) -> &HashMap<AgentId, usize> {
        &self.agent_id_to_index
    }

    /// Batch position of an agent
    pub fn index_of(&self, agent_id: AgentId) -> Option<usize> {
        self.agent_id_to_index.get(&agent_id).copied()
    }

    /// Whether an agent requested a decision
    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.agent_id_to_index.contains_key(&agent_id)
    }

    /// Decision step of one agent
    pub fn get(&self, agent_id: AgentId) -> Option<DecisionStep> {
        let index = self.index_of(agent_id)?;
        Some(self.step_at(index))
    }

    /// Iterate over agents in batch order
    pub fn iter(&self) -> impl Iterator<Item = DecisionStep> + '_ {
        (0..self.len()).map(|i| self.step_at(i))
    }

    fn step_at(&self, index: usize) -> DecisionStep {
        DecisionStep {
            obs: self
                .obs
                .iter()
                .map(|o| o.index_axis(Axis(0), index).to_owned())
                .collect(),
            reward: self.reward[index],
            agent_id: self.agent_id[index],
            action_mask: self.action_mask.as_ref().map(|masks| {
                masks
                    .iter()
                    .map(|m| m.row(index).to_owned())
                    .collect()
            }),
        }
    }
}

/// Agents whose episode ended this step
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalSteps {
    /// One array per observation, shape `(n_agents, *obs_shape)`
    pub obs: Vec<ArrayD<f32>>,
    /// Final reward, per agent
    pub reward: Array1<f32>,
    /// Episode was cut short by the step limit rather than ending naturally
    pub interrupted: Vec<bool>,
    /// Agent ids in batch order
    pub agent_id: Vec<AgentId>,
    agent_id_to_index: HashMap<AgentId, usize>,
}

/// A single agent's terminal step
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalStep {
    /// One array per observation
    pub obs: Vec<ArrayD<f32>>,
    /// Final reward
    pub reward: f32,
    /// Episode hit its step limit
    pub interrupted: bool,
    /// Agent id
    pub agent_id: AgentId,
}

impl TerminalSteps {
    /// Assemble a batch; observation rows must follow `agent_id` order
    pub fn new(
        obs: Vec<ArrayD<f32>>,
        reward: Array1<f32>,
        interrupted: Vec<bool>,
        agent_id: Vec<AgentId>,
    ) -> Self {
        let agent_id_to_index = index_agents(&agent_id);
        Self {
            obs,
            reward,
            interrupted,
            agent_id,
            agent_id_to_index,
        }
    }

    /// Canonical empty batch for a spec
    pub fn empty(spec: &BehaviorSpec) -> Self {
        Self::new(empty_obs(spec), Array1::zeros(0), Vec::new(), Vec::new())
    }

    /// Number of agents
    pub fn len(&self) -> usize {
        self.agent_id.len()
    }

    /// No agents terminated
    pub fn is_empty(&self) -> bool {
        self.agent_id.is_empty()
    }

    /// Map from agent id to batch position
    pub fn agent_id_to_index(&self) -> &HashMap<AgentId, usize> {
        &self.agent_id_to_index
    }

    /// Whether an agent terminated
    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.agent_id_to_index.contains_key(&agent_id)
    }

    /// Terminal step of one agent
    pub fn get(&self, agent_id: AgentId) -> Option<TerminalStep> {
        let index = *self.agent_id_to_index.get(&agent_id)?;
        Some(self.step_at(index))
    }

    /// Iterate over agents in batch order
    pub fn iter(&self) -> impl Iterator<Item = TerminalStep> + '_ {
        (0..self.len()).map(|i| self.step_at(i))
    }

    fn step_at(&self, index: usize) -> TerminalStep {
        TerminalStep {
            obs: self
                .obs
                .iter()
                .map(|o| o.index_axis(Axis(0), index).to_owned())
                .collect(),
            reward: self.reward[index],
            interrupted: self.interrupted[index],
            agent_id: self.agent_id[index],
        }
    }
}

/// Split agent infos into decision and terminal batches shaped by `spec`
pub fn steps_from_proto(
    agent_infos: &[AgentInfoProto],
    spec: &BehaviorSpec,
) -> Result<(DecisionSteps, TerminalSteps)> {
    let (terminal_infos, decision_infos): (Vec<&AgentInfoProto>, Vec<&AgentInfoProto>) =
        agent_infos.iter().partition(|info| info.done);

    let decision_obs = batch_observations(&decision_infos, spec)?;
    let terminal_obs = batch_observations(&terminal_infos, spec)?;

    let decision_reward: Array1<f32> = decision_infos.iter().map(|i| i.reward).collect();
    let terminal_reward: Array1<f32> = terminal_infos.iter().map(|i| i.reward).collect();
    ensure_no_nan(decision_reward.iter().chain(terminal_reward.iter()), "rewards")?;

    let decision_ids = decision_infos.iter().map(|i| i.id).collect();
    let terminal_ids = terminal_infos.iter().map(|i| i.id).collect();
    let interrupted = terminal_infos.iter().map(|i| i.max_step_reached).collect();

    let action_mask = spec
        .discrete_action_branches()
        .map(|branches| build_action_masks(&decision_infos, branches));

    Ok((
        DecisionSteps::new(decision_obs, decision_reward, decision_ids, action_mask),
        TerminalSteps::new(terminal_obs, terminal_reward, interrupted, terminal_ids),
    ))
}

fn index_agents(agent_id: &[AgentId]) -> HashMap<AgentId, usize> {
    agent_id.iter().enumerate().map(|(i, &id)| (id, i)).collect()
}

fn empty_obs(spec: &BehaviorSpec) -> Vec<ArrayD<f32>> {
    spec.observation_shapes
        .iter()
        .map(|shape| ArrayD::zeros(IxDyn(&batched_shape(0, shape))))
        .collect()
}

fn batched_shape(n_agents: usize, shape: &[usize]) -> Vec<usize> {
    let mut full = Vec::with_capacity(shape.len() + 1);
    full.push(n_agents);
    full.extend_from_slice(shape);
    full
}

fn batch_observations(infos: &[&AgentInfoProto], spec: &BehaviorSpec) -> Result<Vec<ArrayD<f32>>> {
    spec.observation_shapes
        .iter()
        .enumerate()
        .map(|(obs_index, shape)| {
            let per_agent: usize = shape.iter().product();
            let mut data = Vec::with_capacity(per_agent * infos.len());
            for info in infos {
                let obs = info.observations.get(obs_index).ok_or_else(|| {
                    SimLinkError::MalformedResponse(format!(
                        "Agent {} is missing observation {}",
                        info.id, obs_index
                    ))
                })?;
                if obs.shape != *shape || obs.float_data.len() != per_agent {
                    return Err(SimLinkError::MalformedResponse(format!(
                        "Observation {} of agent {} has shape {:?} with {} values, expected shape {:?}",
                        obs_index,
                        info.id,
                        obs.shape,
                        obs.float_data.len(),
                        shape
                    )));
                }
                data.extend_from_slice(&obs.float_data);
            }
            ensure_no_nan(data.iter(), "observations")?;
            ArrayD::from_shape_vec(IxDyn(&batched_shape(infos.len(), shape)), data)
                .map_err(|e| SimLinkError::MalformedResponse(e.to_string()))
        })
        .collect()
}

fn build_action_masks(infos: &[&AgentInfoProto], branches: &[usize]) -> Vec<Array2<bool>> {
    let total: usize = branches.iter().sum();
    let mut mask = Array2::from_elem((infos.len(), total), false);
    for (row, info) in infos.iter().enumerate() {
        // A mask of the wrong width is ignored: every action stays available
        if info.action_mask.len() == total {
            for (col, &masked) in info.action_mask.iter().enumerate() {
                mask[[row, col]] = masked;
            }
        }
    }

    let mut start = 0;
    branches
        .iter()
        .map(|&size| {
            let part = mask.slice(ndarray::s![.., start..start + size]).to_owned();
            start += size;
            part
        })
        .collect()
}

fn ensure_no_nan<'a>(mut values: impl Iterator<Item = &'a f32>, what: &str) -> Result<()> {
    if values.any(|v| v.is_nan()) {
        return Err(SimLinkError::MalformedResponse(format!(
            "The {what} provided had NaN values"
        )));
    }
    Ok(())
}
