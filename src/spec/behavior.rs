//! Behavior specs: what a group of agents observes and how it acts.

use std::fmt;

use ndarray::{Array1, Array2};
use rand::Rng;

use crate::error::{Result, SimLinkError};
use crate::protocol::{AgentInfoProto, BrainParametersProto, SpaceType};

/// Name of a behavior (agent group)
pub type BehaviorName = String;

/// Agent identifier, unique within one decision batch
pub type AgentId = i32;

/// Continuous or discrete, without sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Real-valued actions
    Continuous,
    /// Integer actions, one per branch
    Discrete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continuous => write!(f, "continuous"),
            Self::Discrete => write!(f, "discrete"),
        }
    }
}

/// Action space of a behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    /// Vector of `size` floats
    Continuous {
        /// Vector dimension
        size: usize,
    },
    /// One integer per branch, each in `0..branches[i]`
    Discrete {
        /// Number of actions in each branch
        branches: Vec<usize>,
    },
}

impl ActionSpec {
    /// Kind of this action space
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Continuous { .. } => ActionKind::Continuous,
            Self::Discrete { .. } => ActionKind::Discrete,
        }
    }

    /// Width of one agent's action vector
    pub fn size(&self) -> usize {
        match self {
            Self::Continuous { size } => *size,
            Self::Discrete { branches } => branches.len(),
        }
    }
}

/// Batch of actions, one row per decision agent
#[derive(Debug, Clone, PartialEq)]
pub enum ActionTensor {
    /// `(n_agents, size)` floats
    Continuous(Array2<f32>),
    /// `(n_agents, n_branches)` integers
    Discrete(Array2<i32>),
}

impl ActionTensor {
    /// Kind of the stored actions
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Continuous(_) => ActionKind::Continuous,
            Self::Discrete(_) => ActionKind::Discrete,
        }
    }

    /// Tensor shape
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Continuous(a) => a.shape().to_vec(),
            Self::Discrete(a) => a.shape().to_vec(),
        }
    }

    /// Number of agent rows
    pub fn n_agents(&self) -> usize {
        match self {
            Self::Continuous(a) => a.nrows(),
            Self::Discrete(a) => a.nrows(),
        }
    }

    /// Row `index` as the float vector sent on the wire
    pub fn row_as_f32(&self, index: usize) -> Vec<f32> {
        match self {
            Self::Continuous(a) => a.row(index).to_vec(),
            Self::Discrete(a) => a.row(index).iter().map(|&v| v as f32).collect(),
        }
    }
}

/// Action for a single agent
#[derive(Debug, Clone, PartialEq)]
pub enum ActionVector {
    /// `size` floats
    Continuous(Array1<f32>),
    /// One integer per branch
    Discrete(Array1<i32>),
}

impl ActionVector {
    /// Kind of the stored action
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Continuous(_) => ActionKind::Continuous,
            Self::Discrete(_) => ActionKind::Discrete,
        }
    }

    /// Vector shape
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Continuous(a) => a.shape().to_vec(),
            Self::Discrete(a) => a.shape().to_vec(),
        }
    }
}

/// Observation shapes and action space of one behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorSpec {
    /// Shape of each observation, in declaration order
    pub observation_shapes: Vec<Vec<usize>>,
    /// Action space
    pub action_spec: ActionSpec,
}

impl BehaviorSpec {
    /// Build a spec from a behavior declaration and a sample agent
    pub fn from_proto(brain: &BrainParametersProto, agent: &AgentInfoProto) -> Result<Self> {
        let observation_shapes = agent
            .observations
            .iter()
            .map(|obs| obs.shape.clone())
            .collect();

        let sizes = brain
            .vector_action_size
            .iter()
            .map(|&s| {
                usize::try_from(s).map_err(|_| {
                    SimLinkError::MalformedResponse(format!(
                        "Behavior {} declares negative action size {}",
                        brain.brain_name, s
                    ))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let action_spec = match brain.vector_action_space_type {
            SpaceType::Continuous => {
                let size = *sizes.first().ok_or_else(|| {
                    SimLinkError::MalformedResponse(format!(
                        "Behavior {} declares no continuous action size",
                        brain.brain_name
                    ))
                })?;
                ActionSpec::Continuous { size }
            },
            SpaceType::Discrete => {
                if sizes.is_empty() {
                    return Err(SimLinkError::MalformedResponse(format!(
                        "Behavior {} declares no discrete branches",
                        brain.brain_name
                    )));
                }
                ActionSpec::Discrete { branches: sizes }
            },
        };

        Ok(Self {
            observation_shapes,
            action_spec,
        })
    }

    /// Whether actions are discrete
    pub fn is_action_discrete(&self) -> bool {
        self.action_spec.kind() == ActionKind::Discrete
    }

    /// Whether actions are continuous
    pub fn is_action_continuous(&self) -> bool {
        self.action_spec.kind() == ActionKind::Continuous
    }

    /// Width of one agent's action vector
    pub fn action_size(&self) -> usize {
        self.action_spec.size()
    }

    /// Branch sizes for discrete actions
    pub fn discrete_action_branches(&self) -> Option<&[usize]> {
        match &self.action_spec {
            ActionSpec::Discrete { branches } => Some(branches),
            ActionSpec::Continuous { .. } => None,
        }
    }

    /// Zero-filled action batch for `n_agents`
    pub fn create_empty_action(&self, n_agents: usize) -> ActionTensor {
        let shape = (n_agents, self.action_size());
        match self.action_spec {
            ActionSpec::Continuous { .. } => ActionTensor::Continuous(Array2::zeros(shape)),
            ActionSpec::Discrete { .. } => ActionTensor::Discrete(Array2::zeros(shape)),
        }
    }

    /// Uniformly random action batch for `n_agents`.
    ///
    /// Continuous values fall in `[-1, 1)`, discrete values in each branch's range.
    pub fn create_random_action<R: Rng + ?Sized>(&self, n_agents: usize, rng: &mut R) -> ActionTensor {
        match &self.action_spec {
            ActionSpec::Continuous { size } => ActionTensor::Continuous(Array2::from_shape_fn(
                (n_agents, *size),
                |_| rng.gen_range(-1.0..1.0),
            )),
            ActionSpec::Discrete { branches } => {
                ActionTensor::Discrete(Array2::from_shape_fn((n_agents, branches.len()), |(_, b)| {
                    rng.gen_range(0..branches[b].max(1)) as i32
                }))
            },
        }
    }

    /// Check an action batch against this spec for `n_agents` decision agents
    pub fn validate_actions(
        &self,
        behavior: &str,
        n_agents: usize,
        actions: &ActionTensor,
    ) -> Result<()> {
        self.check_kind(behavior, actions.kind())?;

        let expected = vec![n_agents, self.action_size()];
        let received = actions.shape();
        if received != expected {
            return Err(SimLinkError::ActionShapeMismatch {
                behavior: behavior.to_string(),
                expected,
                received,
            });
        }

        if let ActionTensor::Discrete(values) = actions {
            for row in values.rows() {
                self.check_branches(behavior, row.iter().copied())?;
            }
        }
        Ok(())
    }

    /// Check a single agent's action against this spec
    pub fn validate_agent_action(&self, behavior: &str, action: &ActionVector) -> Result<()> {
        self.check_kind(behavior, action.kind())?;

        let expected = vec![self.action_size()];
        let received = action.shape();
        if received != expected {
            return Err(SimLinkError::ActionShapeMismatch {
                behavior: behavior.to_string(),
                expected,
                received,
            });
        }

        if let ActionVector::Discrete(values) = action {
            self.check_branches(behavior, values.iter().copied())?;
        }
        Ok(())
    }

    fn check_kind(&self, behavior: &str, received: ActionKind) -> Result<()> {
        let expected = self.action_spec.kind();
        if expected != received {
            return Err(SimLinkError::ActionTypeMismatch {
                behavior: behavior.to_string(),
                expected,
                received,
            });
        }
        Ok(())
    }

    fn check_branches(&self, behavior: &str, values: impl Iterator<Item = i32>) -> Result<()> {
        let Some(branches) = self.discrete_action_branches() else {
            return Ok(());
        };
        for (branch, (value, &branch_size)) in values.zip(branches).enumerate() {
            if value < 0 || value as usize >= branch_size {
                return Err(SimLinkError::ActionOutOfRange {
                    behavior: behavior.to_string(),
                    branch,
                    value,
                    branch_size,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::protocol::ObservationProto;

    fn brain(space: SpaceType, sizes: Vec<i32>) -> BrainParametersProto {
        BrainParametersProto {
            brain_name: "Crawler".to_string(),
            vector_action_size: sizes,
            vector_action_space_type: space,
            ..Default::default()
        }
    }

    fn agent() -> AgentInfoProto {
        AgentInfoProto {
            id: 0,
            observations: vec![
                ObservationProto::vector(vec![0.0; 4]),
                ObservationProto {
                    shape: vec![2, 2],
                    float_data: vec![0.0; 4],
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_continuous_from_proto() {
        let spec = BehaviorSpec::from_proto(&brain(SpaceType::Continuous, vec![3]), &agent()).unwrap();
        assert_eq!(spec.action_spec, ActionSpec::Continuous { size: 3 });
        assert_eq!(spec.observation_shapes, vec![vec![4], vec![2, 2]]);
        assert!(spec.is_action_continuous());
        assert_eq!(spec.discrete_action_branches(), None);
    }

    #[test]
    fn test_discrete_from_proto() {
        let spec = BehaviorSpec::from_proto(&brain(SpaceType::Discrete, vec![3, 2]), &agent()).unwrap();
        assert_eq!(spec.action_size(), 2);
        assert_eq!(spec.discrete_action_branches(), Some(&[3usize, 2][..]));
    }

    #[test]
    fn test_from_proto_rejects_empty_sizes() {
        for space in [SpaceType::Continuous, SpaceType::Discrete] {
            let err = BehaviorSpec::from_proto(&brain(space, vec![]), &agent()).unwrap_err();
            assert!(matches!(err, SimLinkError::MalformedResponse(_)));
        }
        let err = BehaviorSpec::from_proto(&brain(SpaceType::Discrete, vec![-1]), &agent()).unwrap_err();
        assert!(matches!(err, SimLinkError::MalformedResponse(_)));
    }

    #[test]
    fn test_empty_action_shape() {
        let spec = BehaviorSpec::from_proto(&brain(SpaceType::Discrete, vec![3, 2]), &agent()).unwrap();
        let empty = spec.create_empty_action(5);
        assert_eq!(empty.shape(), vec![5, 2]);
        assert_eq!(empty, ActionTensor::Discrete(Array2::zeros((5, 2))));
    }

    #[test]
    fn test_random_action_respects_branches() {
        let spec = BehaviorSpec::from_proto(&brain(SpaceType::Discrete, vec![3, 1]), &agent()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let actions = spec.create_random_action(64, &mut rng);
        spec.validate_actions("Crawler", 64, &actions).unwrap();

        let spec = BehaviorSpec::from_proto(&brain(SpaceType::Continuous, vec![2]), &agent()).unwrap();
        let ActionTensor::Continuous(values) = spec.create_random_action(16, &mut rng) else {
            panic!("expected continuous actions");
        };
        assert!(values.iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn test_validate_rejects_wrong_kind_shape_and_range() {
        let spec = BehaviorSpec::from_proto(&brain(SpaceType::Discrete, vec![3, 2]), &agent()).unwrap();

        let wrong_kind = ActionTensor::Continuous(Array2::zeros((1, 2)));
        assert!(matches!(
            spec.validate_actions("Crawler", 1, &wrong_kind),
            Err(SimLinkError::ActionTypeMismatch { .. })
        ));

        let wrong_shape = ActionTensor::Discrete(Array2::zeros((2, 2)));
        assert!(matches!(
            spec.validate_actions("Crawler", 1, &wrong_shape),
            Err(SimLinkError::ActionShapeMismatch { .. })
        ));

        let out_of_range = ActionTensor::Discrete(array![[2, 2]]);
        match spec.validate_actions("Crawler", 1, &out_of_range) {
            Err(SimLinkError::ActionOutOfRange { branch, value, .. }) => {
                assert_eq!(branch, 1);
                assert_eq!(value, 2);
            },
            other => panic!("expected out of range, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_agent_action() {
        let spec = BehaviorSpec::from_proto(&brain(SpaceType::Continuous, vec![2]), &agent()).unwrap();
        spec.validate_agent_action("Crawler", &ActionVector::Continuous(array![0.1, 0.2]))
            .unwrap();
        assert!(matches!(
            spec.validate_agent_action("Crawler", &ActionVector::Continuous(array![0.1])),
            Err(SimLinkError::ActionShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_discrete_rows_sent_as_floats() {
        let actions = ActionTensor::Discrete(array![[1, 0], [2, 1]]);
        assert_eq!(actions.row_as_f32(1), vec![2.0, 1.0]);
        assert_eq!(actions.n_agents(), 2);
    }
}
