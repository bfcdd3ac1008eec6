//! SimLink error types.
//!
//! Every failure the session can surface to a training loop is a variant of
//! [`SimLinkError`]. Protocol deviations the client deliberately tolerates
//! (minor version skew, a missing capability flag, side channel data for an
//! unregistered channel) are logged with `tracing::warn!` and never reach
//! this type.

use thiserror::Error;

use crate::spec::ActionKind;

/// SimLink errors.
#[derive(Error, Debug)]
pub enum SimLinkError {
    /// Operation requires a loaded environment.
    #[error("No simulation environment is loaded")]
    EnvironmentNotLoaded,

    /// Remote process terminated or the channel closed during an exchange.
    #[error("Communicator has exited: {0}")]
    CommunicatorStopped(String),

    /// Behavior name absent from the behavior registry.
    #[error("The group {0} does not correspond to an existing agent group in the environment")]
    UnknownBehaviorGroup(String),

    /// Action tensor shape does not match the behavior spec.
    #[error(
        "The behavior {behavior} needs an input of dimension {expected:?} \
         but received input of dimension {received:?}"
    )]
    ActionShapeMismatch {
        /// Behavior the action was addressed to.
        behavior: String,
        /// Shape derived from the behavior spec and the decision batch.
        expected: Vec<usize>,
        /// Shape supplied by the caller.
        received: Vec<usize>,
    },

    /// Continuous action supplied to a discrete behavior, or vice versa.
    #[error("The behavior {behavior} expects {expected} actions but received {received} actions")]
    ActionTypeMismatch {
        /// Behavior the action was addressed to.
        behavior: String,
        /// Action kind declared by the behavior spec.
        expected: ActionKind,
        /// Action kind supplied by the caller.
        received: ActionKind,
    },

    /// Discrete action value outside its branch.
    #[error(
        "The behavior {behavior} received value {value} for branch {branch}, \
         which only has {branch_size} actions"
    )]
    ActionOutOfRange {
        /// Behavior the action was addressed to.
        behavior: String,
        /// Index of the offending branch.
        branch: usize,
        /// Value supplied by the caller.
        value: i32,
        /// Number of actions in the branch.
        branch_size: usize,
    },

    /// Agent did not request a decision in the most recent step.
    #[error("agent_id {agent_id} of behavior {behavior} did not request a decision at the previous step")]
    UnknownAgentForDecision {
        /// Behavior the action was addressed to.
        behavior: String,
        /// Offending agent id.
        agent_id: i32,
    },

    /// Major protocol version mismatch.
    #[error(
        "The communication API version is not compatible between the simulation and SimLink. \
         SimLink API: {local}, simulation API: {remote}"
    )]
    VersionIncompatible {
        /// Local API version.
        local: String,
        /// Version reported by the remote process.
        remote: String,
    },

    /// Version string could not be parsed.
    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    /// Response carried data inconsistent with its own declarations.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Side channel framing or dispatch failure.
    #[error("Side channel error: {0}")]
    SideChannel(String),

    /// Remote process did not connect in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for SimLink operations
pub type Result<T> = std::result::Result<T, SimLinkError>;

impl From<toml::de::Error> for SimLinkError {
    fn from(err: toml::de::Error) -> Self {
        SimLinkError::Config(err.to_string())
    }
}
