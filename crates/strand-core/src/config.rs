//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strand_canonical::PrincipalId;

use crate::errors::CoreError;
use crate::shard::DEFAULT_SHARD_COUNT;

/// What `execute_intent` requires of the intent's branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// The executor is trusted to settle before executing; branch state is not checked.
    TrustExecutor,
    /// Execution fails with `BranchNotSettled` unless the branch is settled.
    #[default]
    RequireSettled,
}

/// Configuration for a [`SettlementEngine`](crate::SettlementEngine).
///
/// ```rust
/// use strand_core::{EngineConfig, ExecutionPolicy};
///
/// let config = EngineConfig::from_json_str(r#"{"execution_policy": "trust_executor"}"#)?;
/// assert_eq!(config.execution_policy, ExecutionPolicy::TrustExecutor);
/// assert_eq!(config.shard_count, 64);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of lock shards for branch sets and intents.
    pub shard_count: usize,
    /// Branch precondition for execution.
    pub execution_policy: ExecutionPolicy,
    /// Owner of the aggregate counters; defaults to the engine owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_owner: Option<PrincipalId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            execution_policy: ExecutionPolicy::default(),
            counter_owner: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.shard_count == 0 {
            return Err(CoreError::Config("shard_count must be positive".to_string()));
        }
        if let Some(owner) = &self.counter_owner {
            PrincipalId::parse(owner.as_str())
                .map_err(|e| CoreError::Config(format!("counter_owner: {e}")))?;
        }
        Ok(())
    }
}
