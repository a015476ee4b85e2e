//! # Protocol Configuration & Constants
//!
//! Every magic number of the boost protocol lives here. The grace period,
//! the pending-operation cap and the signature skew tolerance together decide
//! how long a relayer holds authority over an account, so they are kept in
//! one place and read from [`ProtocolConfig`] everywhere else.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Delegation & Pending Operations
// ---------------------------------------------------------------------------

/// Grace period between an opt-out and the moment the delegation is void.
/// Also the age after which anyone may finalize a pending operation. One day.
pub const OPT_OUT_PERIOD: u64 = 24 * 60 * 60;

/// Maximum number of operations that may be pending for a single account.
pub const MAX_PENDING_OPS: usize = 25;

/// How far into the future a signed intent's timestamp may point when it is
/// submitted for execution. Clocks drift, block producers round; an hour
/// absorbs both.
pub const MAX_FUTURE_SKEW: u64 = 60 * 60;

// ---------------------------------------------------------------------------
// Typed Messages
// ---------------------------------------------------------------------------

/// Chain id embedded in every typed-message domain unless overridden.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Version string of every typed-message domain.
pub const DOMAIN_VERSION: &str = "1";

/// Prefix prepended to a 32-byte digest by generic message-signing wallets
/// (hardware wallets, `personal_sign`).
pub const PERSONAL_SIGN_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

// ---------------------------------------------------------------------------
// Amount Codec
// ---------------------------------------------------------------------------

/// Width of every amount field in a packed word.
pub const AMOUNT_BITS: usize = 96;

/// Width of the fuel-kind field in a packed burn word.
pub const FUEL_KIND_BITS: usize = 3;

// ---------------------------------------------------------------------------
// ProtocolConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`ProtocolConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("malformed config: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A field holds a value the protocol cannot operate with.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// The registry a component is wired to runs a different opt-out period.
    #[error("opt_out_period is {config} but the delegation registry uses {registry}")]
    RegistryMismatch { config: u64, registry: u64 },
}

/// Tunable protocol parameters.
///
/// Defaults match the constants above. Tests shrink the periods to keep
/// time travel short; production deployments should not touch them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Seconds between an opt-out and the end of the delegation.
    pub opt_out_period: u64,

    /// Maximum pending operations per account.
    pub max_pending_ops: usize,

    /// Seconds a submitted intent's timestamp may lie in the future.
    pub max_future_skew: u64,

    /// Maximum age, in seconds, of a revert proof and of the operation it
    /// reverts.
    pub revert_proof_window: u64,

    /// Chain id used in typed-message domains.
    pub chain_id: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            opt_out_period: OPT_OUT_PERIOD,
            max_pending_ops: MAX_PENDING_OPS,
            max_future_skew: MAX_FUTURE_SKEW,
            revert_proof_window: OPT_OUT_PERIOD,
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}

impl ProtocolConfig {
    /// Parses a JSON document. Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the protocol unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.opt_out_period == 0 {
            return Err(ConfigError::Invalid {
                field: "opt_out_period",
                reason: "must be greater than zero",
            });
        }
        if self.max_pending_ops == 0 {
            return Err(ConfigError::Invalid {
                field: "max_pending_ops",
                reason: "at least one pending operation must fit",
            });
        }
        if self.revert_proof_window == 0 {
            return Err(ConfigError::Invalid {
                field: "revert_proof_window",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}
