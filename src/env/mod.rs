//! Environment session: handshake, step/reset loop and action handling.
//!
//! ```rust,ignore
//! use simlink::{EnvConfig, Environment};
//!
//! let mut env = Environment::open(&EnvConfig::default(), Vec::new())?;
//! env.reset()?;
//! for name in env.behavior_names() {
//!     let (decision, terminal) = env.get_steps(name)?.unwrap();
//!     println!("{name}: {} deciding, {} done", decision.len(), terminal.len());
//! }
//! env.step()?;
//! env.close()?;
//! ```

mod actions;
mod environment;

pub use actions::ActionBuffer;
pub use environment::{Environment, RemoteInfo};
