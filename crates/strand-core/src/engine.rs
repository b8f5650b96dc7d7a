//! Wiring of the kernel components behind one handle.

use std::sync::Arc;

use strand_canonical::PrincipalId;
use tracing::debug;

use crate::auth::{AuthorizationContext, CallContext};
use crate::batch::BatchCoordinator;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::errors::CoreError;
use crate::intent::IntentStore;
use crate::registry::BranchRegistry;
use crate::sink::SharedSink;

/// A branch registry, intent store, batch coordinator, and allow-list
/// sharing one sink and one clock.
///
/// ```rust
/// use std::sync::Arc;
/// use strand_canonical::{payload_ref, ActorId, PrincipalId};
/// use strand_core::{EngineConfig, MemorySink, SettlementEngine};
///
/// let owner = PrincipalId::parse("acct:owner")?;
/// let alice = ActorId::parse("acct:alice")?;
/// let engine = SettlementEngine::new(EngineConfig::default(), owner, Arc::new(MemorySink::new()))?;
///
/// let ctx = engine.call_as(&alice);
/// engine.registry().register_branch(&ctx, &alice, 1, payload_ref(b"a"))?;
/// engine.registry().register_branch(&ctx, &alice, 2, payload_ref(b"b"))?;
/// assert_eq!(engine.registry().settle(&ctx, &alice, 2)?, vec![1]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SettlementEngine {
    config: EngineConfig,
    auth: AuthorizationContext,
    registry: Arc<BranchRegistry>,
    intents: Arc<IntentStore>,
    batches: BatchCoordinator,
}

impl SettlementEngine {
    /// Builds an engine on the wall clock.
    pub fn new(config: EngineConfig, owner: PrincipalId, sink: SharedSink) -> Result<Self, CoreError> {
        Self::with_clock(config, owner, sink, Arc::new(SystemClock))
    }

    /// Builds an engine on a caller-supplied clock.
    pub fn with_clock(
        config: EngineConfig,
        owner: PrincipalId,
        sink: SharedSink,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let counter_owner = config.counter_owner.clone().unwrap_or_else(|| owner.clone());
        let registry = Arc::new(BranchRegistry::new(
            config.shard_count,
            sink.clone(),
            clock.clone(),
        ));
        let intents = Arc::new(IntentStore::new(
            config.shard_count,
            registry.clone(),
            config.execution_policy,
            counter_owner,
            sink.clone(),
            clock,
        ));
        let batches = BatchCoordinator::new(registry.clone(), intents.clone(), sink.clone());
        debug!(
            shard_count = config.shard_count,
            policy = ?config.execution_policy,
            owner = %owner,
            "settlement engine ready"
        );
        Ok(Self {
            auth: AuthorizationContext::new(owner, sink),
            config,
            registry,
            intents,
            batches,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The allow-list every guarded call is checked against.
    pub fn auth(&self) -> &AuthorizationContext {
        &self.auth
    }

    /// Shorthand for `self.auth().call_as(caller)`.
    pub fn call_as<'a>(&'a self, caller: &'a PrincipalId) -> CallContext<'a> {
        self.auth.call_as(caller)
    }

    /// Branch registry.
    pub fn registry(&self) -> &BranchRegistry {
        &self.registry
    }

    /// Intent store.
    pub fn intents(&self) -> &IntentStore {
        &self.intents
    }

    /// Batch coordinator.
    pub fn batches(&self) -> &BatchCoordinator {
        &self.batches
    }
}
