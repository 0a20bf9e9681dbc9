//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the signing engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Extra read-compute-write cycles after an optimistic collision
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,

    /// Per-attempt timeout for signer identity verification
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_ms: u64,

    /// Timeout for document, notification and certificate calls
    #[serde(default = "default_collaborator_timeout")]
    pub collaborator_timeout_ms: u64,

    /// Expiration sweep interval
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Upper bound on `expires_in_days` at creation
    #[serde(default = "default_max_expiry_days")]
    pub max_expiry_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: default_max_commit_retries(),
            auth_timeout_ms: default_auth_timeout(),
            collaborator_timeout_ms: default_collaborator_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            max_expiry_days: default_max_expiry_days(),
        }
    }
}

impl EngineConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Total commit attempts including the first
    pub fn max_commit_attempts(&self) -> u32 {
        self.max_commit_retries.saturating_add(1)
    }
}

// Default value helpers
fn default_max_commit_retries() -> u32 {
    5
}

fn default_auth_timeout() -> u64 {
    5_000
}

fn default_collaborator_timeout() -> u64 {
    3_000
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_expiry_days() -> u32 {
    365
}
