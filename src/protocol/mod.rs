//! Wire protocol between SimLink and the remote simulation.
//!
//! The session speaks a strict call/response protocol. The client opens
//! with one handshake and then issues exchanges, each carrying a command,
//! the actions for every behavior and a side channel payload.
//!
//! ## Message Flow
//!
//! ```text
//! SimLink                                   Simulation
//!    |                                          |
//!    |---- initialize (version, caps, seed) --->|  Handshake
//!    |<--- init output (version, behaviors) ----|
//!    |                                          |
//!    |---- exchange RESET (side channel) ------>|  First step
//!    |<--- agent infos (side channel) ----------|
//!    |                                          |
//!    |---- exchange STEP (actions, side ch.) -->|  Every step
//!    |<--- agent infos (side channel) ----------|
//!    |                                          |
//!    |---- QUIT ------------------------------->|  Close
//! ```
//!
//! A missing response at any point means the simulation is gone.
//!
//! ## Versioning
//!
//! | Remote vs. local      | Outcome                        |
//! |-----------------------|--------------------------------|
//! | Major differs         | `VersionIncompatible` (fatal)  |
//! | Minor differs         | Warning, session continues     |
//! | Same major and minor  | Info log                       |

mod capabilities;
mod message;

pub use capabilities::{
    check_communication_compatibility, ensure_compatible, warn_base_capabilities,
    Compatibility, ProtocolVersion, RlCapabilities,
};
pub use message::{
    AgentActionProto, AgentInfoProto, BrainParametersProto, Command, ObservationProto,
    RlInitializationInput, RlInitializationOutput, RlInput, RlOutput, SpaceType, UnityInput,
    UnityOutput,
};

/// Communication API version. Compatible with remotes of the same major version.
pub const API_VERSION: &str = "1.0.0";

/// Port the simulation editor listens on when no executable is launched
pub const DEFAULT_EDITOR_PORT: u16 = 5004;

/// Base port for launched simulations; each worker is offset by its id
pub const BASE_ENVIRONMENT_PORT: u16 = 5005;

/// Command line argument used to pass the port to a simulation executable
pub const PORT_COMMAND_LINE_ARG: &str = "--mlagents-port";

/// Serde adapter encoding side channel bytes as base64 strings on the wire
pub(crate) mod bytes_base64 {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
