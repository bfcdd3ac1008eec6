//! Behavior specs and per-step agent batches.
//!
//! A behavior is a named group of agents sharing one observation layout and
//! one action space. The simulation declares behaviors during the handshake
//! (and whenever a new one appears), then reports every agent of every
//! behavior on each exchange.

mod behavior;
mod steps;

pub use behavior::{
    ActionKind, ActionSpec, ActionTensor, ActionVector, AgentId, BehaviorName, BehaviorSpec,
};
pub use steps::{steps_from_proto, DecisionStep, DecisionSteps, TerminalStep, TerminalSteps};
