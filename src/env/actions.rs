//! Pending per-behavior action buffers.

use std::collections::HashMap;

use crate::error::{Result, SimLinkError};
use crate::protocol::AgentActionProto;
use crate::spec::{
    ActionTensor, ActionVector, AgentId, BehaviorName, BehaviorSpec, DecisionSteps,
    TerminalSteps,
};

/// Actions queued for the next step, keyed by behavior.
///
/// Every stored tensor has already been validated against its behavior's
/// spec and decision batch. Groups without an entry get zero actions when
/// the step input is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionBuffer {
    actions: HashMap<BehaviorName, ActionTensor>,
}

impl ActionBuffer {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending actions for `behavior`
    pub fn get(&self, behavior: &str) -> Option<&ActionTensor> {
        self.actions.get(behavior)
    }

    /// Number of behaviors with pending actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// No pending actions
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drop every pending action
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Validate and store a full batch, replacing any previous one
    pub fn set(
        &mut self,
        behavior: &str,
        spec: &BehaviorSpec,
        decision: &DecisionSteps,
        actions: ActionTensor,
    ) -> Result<()> {
        spec.validate_actions(behavior, decision.len(), &actions)?;
        self.actions.insert(behavior.to_string(), actions);
        Ok(())
    }

    /// Validate and store one agent's action.
    ///
    /// The agent must be in `decision`. The zero-filled batch is only
    /// created once every check has passed.
    pub fn set_for_agent(
        &mut self,
        behavior: &str,
        spec: &BehaviorSpec,
        decision: &DecisionSteps,
        agent_id: AgentId,
        action: &ActionVector,
    ) -> Result<()> {
        spec.validate_agent_action(behavior, action)?;
        let index = decision
            .index_of(agent_id)
            .ok_or_else(|| SimLinkError::UnknownAgentForDecision {
                behavior: behavior.to_string(),
                agent_id,
            })?;

        let buffer = self
            .actions
            .entry(behavior.to_string())
            .or_insert_with(|| spec.create_empty_action(decision.len()));
        write_row(behavior, buffer, index, action)
    }

    /// Per-behavior action lists for the next step input.
    ///
    /// Every behavior in `specs` with at least one decision agent gets one
    /// entry per agent in batch order; behaviors without pending actions
    /// get zeros sized to their stored decision count.
    pub fn to_agent_actions(
        &self,
        specs: &HashMap<BehaviorName, BehaviorSpec>,
        state: &HashMap<BehaviorName, (DecisionSteps, TerminalSteps)>,
    ) -> HashMap<String, Vec<AgentActionProto>> {
        let mut agent_actions = HashMap::new();
        for (name, spec) in specs {
            let n_agents = state.get(name).map_or(0, |(decision, _)| decision.len());
            if n_agents == 0 {
                continue;
            }

            let zeros;
            let tensor = match self.actions.get(name) {
                Some(tensor) => tensor,
                None => {
                    zeros = spec.create_empty_action(n_agents);
                    &zeros
                },
            };

            let rows = (0..tensor.n_agents())
                .map(|i| AgentActionProto {
                    vector_actions: tensor.row_as_f32(i),
                })
                .collect();
            agent_actions.insert(name.clone(), rows);
        }
        agent_actions
    }
}

fn write_row(
    behavior: &str,
    buffer: &mut ActionTensor,
    index: usize,
    action: &ActionVector,
) -> Result<()> {
    match (buffer, action) {
        (ActionTensor::Continuous(batch), ActionVector::Continuous(row)) => {
            batch.row_mut(index).assign(row);
            Ok(())
        },
        (ActionTensor::Discrete(batch), ActionVector::Discrete(row)) => {
            batch.row_mut(index).assign(row);
            Ok(())
        },
        (buffer, action) => Err(SimLinkError::ActionTypeMismatch {
            behavior: behavior.to_string(),
            expected: buffer.kind(),
            received: action.kind(),
        }),
    }
}
