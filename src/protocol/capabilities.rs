//! Capabilities and version negotiation for the handshake.
//!
//! The communication version follows semantic versioning: peers with the
//! same major version can talk, a minor difference only disables the newer
//! side's extra features. Capability flags are advisory. A simulation that
//! does not advertise one keeps working with reduced functionality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimLinkError};

/// Feature flags advertised by each peer during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RlCapabilities {
    /// Base reinforcement-learning protocol support
    #[serde(default)]
    pub base_rl_capabilities: bool,
}

impl Default for RlCapabilities {
    fn default() -> Self {
        Self {
            base_rl_capabilities: true,
        }
    }
}

/// Parsed `major.minor.patch` version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion {
    /// Breaking changes
    pub major: u32,
    /// Backwards-compatible additions
    pub minor: u32,
    /// Fixes
    pub patch: u32,
}

impl FromStr for ProtocolVersion {
    type Err = SimLinkError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SimLinkError::InvalidVersion(s.to_string());

        // Pre-release and build suffixes do not affect compatibility
        let core = s.trim().split(['-', '+']).next().ok_or_else(invalid)?;
        let mut parts = core.split('.');
        let mut next = || -> Result<u32> {
            parts
                .next()
                .ok_or_else(invalid)?
                .parse::<u32>()
                .map_err(|_| invalid())
        };

        let version = Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Outcome of comparing the remote version against ours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Same major and minor
    Exact,
    /// Same major, different minor
    MinorMismatch,
    /// Different major
    Incompatible,
}

impl ProtocolVersion {
    /// Compare a remote version against this (local) one
    pub fn compatibility(&self, remote: &ProtocolVersion) -> Compatibility {
        if self.major != remote.major {
            Compatibility::Incompatible
        } else if self.minor != remote.minor {
            Compatibility::MinorMismatch
        } else {
            Compatibility::Exact
        }
    }
}

/// Check the remote communication version against the local API version.
///
/// Returns `Ok(false)` on a major mismatch, logs a warning on a minor
/// mismatch and fails only when either version string cannot be parsed.
pub fn check_communication_compatibility(
    remote_version: &str,
    local_version: &str,
    remote_package_version: &str,
) -> Result<bool> {
    let remote: ProtocolVersion = remote_version.parse()?;
    let local: ProtocolVersion = local_version.parse()?;

    match local.compatibility(&remote) {
        Compatibility::Incompatible => Ok(false),
        Compatibility::MinorMismatch => {
            tracing::warn!(
                "The communication API versions between the simulation and SimLink differ at the minor version level. \
                 SimLink API: {}, simulation API: {}. \
                 Some features may not work unless you upgrade the package with the lower version.",
                local,
                remote
            );
            Ok(true)
        },
        Compatibility::Exact => {
            tracing::info!(
                "Connected to simulation with package version {} and communication version {}",
                remote_package_version,
                remote
            );
            Ok(true)
        },
    }
}

/// Fail with [`SimLinkError::VersionIncompatible`] unless the versions are compatible
pub fn ensure_compatible(
    remote_version: &str,
    local_version: &str,
    remote_package_version: &str,
) -> Result<()> {
    if check_communication_compatibility(remote_version, local_version, remote_package_version)? {
        Ok(())
    } else {
        Err(SimLinkError::VersionIncompatible {
            local: local_version.to_string(),
            remote: remote_version.to_string(),
        })
    }
}

/// Warn when the remote lacks the base RL capabilities.
///
/// Returns whether the capability is present; never fails.
pub fn warn_base_capabilities(
    caps: Option<&RlCapabilities>,
    remote_package_version: &str,
    local_package_version: &str,
) -> bool {
    let present = caps.is_some_and(|c| c.base_rl_capabilities);
    if !present {
        tracing::warn!(
            "The simulation is not running with the expected base reinforcement learning capabilities. \
             Upgrade the simulation package to a version compatible with this client. \
             SimLink package version: {}, simulation package version: {}",
            local_package_version,
            remote_package_version
        );
    }
    present
}
