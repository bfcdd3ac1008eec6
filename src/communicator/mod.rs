//! RPC communicator abstraction.
//!
//! The session never touches sockets directly. It drives a [`Communicator`]
//! that performs one blocking request/response round trip per call:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Environment                │
//! │        (transport-agnostic)             │
//! └──────────────────┬──────────────────────┘
//!                    │ initialize / exchange / close
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │ TcpCommunicator │ │  caller-defined │
//! │ (framed JSON)   │ │  (gRPC, mocks)  │
//! └─────────────────┘ └─────────────────┘
//! ```
//!
//! `Ok(None)` from `initialize` or `exchange` means the simulation has
//! terminated or the channel closed; the session turns it into
//! [`SimLinkError::CommunicatorStopped`](crate::SimLinkError::CommunicatorStopped).

mod framing;
mod tcp;

pub use framing::{read_message, write_message, MAX_MESSAGE_SIZE};
pub use tcp::{Envelope, EnvelopeHeader, TcpCommunicator, STATUS_CLOSING, STATUS_OK};

use crate::error::Result;
use crate::protocol::{UnityInput, UnityOutput};

/// Request/response channel to the simulation
pub trait Communicator: Send {
    /// Send the handshake and wait for the simulation's reply
    fn initialize(&mut self, input: UnityInput) -> Result<Option<UnityOutput>>;

    /// Send one step/reset input and wait for the reply
    fn exchange(&mut self, input: UnityInput) -> Result<Option<UnityOutput>>;

    /// Release transport resources. Safe to call more than once.
    fn close(&mut self);
}

impl<C: Communicator + ?Sized> Communicator for Box<C> {
    fn initialize(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
        (**self).initialize(input)
    }

    fn exchange(&mut self, input: UnityInput) -> Result<Option<UnityOutput>> {
        (**self).exchange(input)
    }

    fn close(&mut self) {
        (**self).close();
    }
}
