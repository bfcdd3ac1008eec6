//! # SimLink - Synchronous Driver for Remote RL Simulations
//!
//! Client-side session for a simulation process that hosts reinforcement
//! learning agents. SimLink negotiates a protocol version, exchanges one
//! observation/action message per step, and exposes the latest agent state
//! to a training loop.
//!
//! ## Features
//!
//! - **Version negotiation**: handshake with major/minor compatibility checks
//! - **Behavior registry**: action and observation specs per agent group
//! - **Shape-checked actions**: batches validated before they are queued
//! - **Side channels**: multiplexed auxiliary streams on every exchange
//! - **Pluggable transport**: blocking TCP or any [`Communicator`]
//!
//! ## Architecture
//!
//! ```text
//! Training loop                SimLink                    Simulation
//!    |                            |                           |
//!    |-- set_actions ------------>|                           |
//!    |-- step ------------------->|                           |
//!    |                            |--- actions + side ch. --->|
//!    |                            |<-- agent infos + side ch -|
//!    |                            |  update specs/state       |
//!    |                            |  dispatch side channels   |
//!    |<-- get_steps --------------|                           |
//! ```
//!
//! ### State Machine
//!
//! ```text
//!        connect()
//!   [Unconnected] ─────────> [Loaded, first message]
//!                                  │
//!                                  │ step() / reset()
//!                                  v
//!                            [Loaded] ──┐ step() / reset()
//!                                  │ <──┘
//!                                  │ close()
//!                                  v
//!                             [Closed]
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ndarray::Array2;
//! use simlink::{ActionTensor, EnvConfig, Environment};
//!
//! let mut env = Environment::open(&EnvConfig::default(), Vec::new())?;
//! env.reset()?;
//!
//! for _ in 0..100 {
//!     let names: Vec<String> = env.behavior_names().iter().map(|n| n.to_string()).collect();
//!     for name in &names {
//!         let spec = env.behavior_specs()[name].clone();
//!         let n_agents = env.get_steps(name)?.map_or(0, |(decision, _)| decision.len());
//!         env.set_actions(name, spec.create_empty_action(n_agents))?;
//!     }
//!     env.step()?;
//! }
//! env.close()?;
//! ```
//!
//! ## Modules
//!
//! - [`env`]: The environment session and action buffers
//! - [`spec`]: Behavior specs and step batches
//! - [`side_channel`]: Side channel multiplexer and built-in channels
//! - [`protocol`]: Wire messages and version negotiation
//! - [`communicator`]: RPC abstraction and the TCP implementation
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod communicator;
pub mod config;
pub mod env;
pub mod error;
pub mod protocol;
pub mod side_channel;
pub mod spec;

// Re-exports for convenience
pub use communicator::{Communicator, TcpCommunicator};
pub use config::EnvConfig;
pub use env::{ActionBuffer, Environment, RemoteInfo};
pub use error::{Result, SimLinkError};
pub use protocol::{ProtocolVersion, API_VERSION};
pub use side_channel::{
    EngineConfig, EngineConfigurationChannel, EnvironmentParametersChannel,
    FloatPropertiesChannel, RawBytesChannel, SharedSideChannel, SideChannel,
    SideChannelManager, StatsSideChannel,
};
pub use spec::{
    ActionKind, ActionSpec, ActionTensor, ActionVector, AgentId, BehaviorName, BehaviorSpec,
    DecisionStep, DecisionSteps, TerminalStep, TerminalSteps,
};

/// Library version, sent to the simulation as the package version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
