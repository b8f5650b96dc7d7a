//! Isolated aggregate counters.
//!
//! Each counter owns its own cell; no two metrics ever share a lock. The
//! cell is a `parking_lot::Mutex<U256>` because a checked 256-bit add has no
//! single-word CAS; the uncontended path is one atomic compare-exchange.
//!
//! The cell lock covers only the arithmetic. `CounterChanged` is emitted
//! after it is released, so a slow sink never stalls other writers; each
//! notification carries the value it produced, and concurrent writers may
//! reach the sink out of value order.

use alloy_primitives::U256;
use parking_lot::{Mutex, MutexGuard};
use strand_canonical::PrincipalId;
use tracing::{debug, warn};

use crate::auth::CallContext;
use crate::errors::CoreError;
use crate::events::{CounterDirection, Notification};
use crate::sink::SharedSink;

/// Signed change to a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDelta {
    /// Add the amount.
    Increase(U256),
    /// Subtract the amount.
    Decrease(U256),
}

impl CounterDelta {
    fn direction(self) -> CounterDirection {
        match self {
            CounterDelta::Increase(_) => CounterDirection::Increment,
            CounterDelta::Decrease(_) => CounterDirection::Decrement,
        }
    }

    fn magnitude(self) -> U256 {
        match self {
            CounterDelta::Increase(v) | CounterDelta::Decrease(v) => v,
        }
    }
}

/// Contention-isolated accumulator with checked arithmetic.
pub struct AggregateCounter {
    name: String,
    owner: PrincipalId,
    value: Mutex<U256>,
    sink: SharedSink,
}

impl std::fmt::Debug for AggregateCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateCounter")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("value", &self.current())
            .finish()
    }
}

impl AggregateCounter {
    /// Creates a zeroed counter.
    pub fn new(name: impl Into<String>, owner: PrincipalId, sink: SharedSink) -> Self {
        Self {
            name: name.into(),
            owner,
            value: Mutex::new(U256::ZERO),
            sink,
        }
    }

    /// Counter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Principal allowed to reset the counter.
    pub fn owner(&self) -> &PrincipalId {
        &self.owner
    }

    /// Current value.
    pub fn current(&self) -> U256 {
        *self.value.lock()
    }

    /// Adds `delta`; fails with `Arithmetic` on overflow, leaving the value unchanged.
    pub fn increment(&self, ctx: &CallContext<'_>, delta: U256) -> Result<U256, CoreError> {
        self.apply(ctx, CounterDelta::Increase(delta))
    }

    /// Subtracts `delta`; fails with `Arithmetic` on underflow, leaving the value unchanged.
    pub fn decrement(&self, ctx: &CallContext<'_>, delta: U256) -> Result<U256, CoreError> {
        self.apply(ctx, CounterDelta::Decrease(delta))
    }

    /// Applies a signed delta and returns the new value.
    ///
    /// The caller must be authorized; anyone else gets `NotAuthorized` and
    /// the value is left alone.
    pub fn apply(&self, ctx: &CallContext<'_>, delta: CounterDelta) -> Result<U256, CoreError> {
        ctx.ensure_authorized()?;
        let next = {
            let mut value = self.value.lock();
            let next = self.checked(*value, delta)?;
            *value = next;
            next
        };
        self.announce(delta, next);
        Ok(next)
    }

    /// Sets the value to zero. Owner only. Returns the previous value.
    pub fn reset(&self, caller: &PrincipalId) -> Result<U256, CoreError> {
        if caller != &self.owner {
            warn!(counter = %self.name, caller = %caller, "counter reset rejected");
            return Err(CoreError::NotAuthorized {
                principal: caller.clone(),
            });
        }
        let previous = std::mem::replace(&mut *self.value.lock(), U256::ZERO);
        debug!(counter = %self.name, %previous, "counter reset");
        self.sink.emit(Notification::CounterReset {
            counter: self.name.clone(),
            previous,
        });
        Ok(previous)
    }

    /// Applies several deltas as one update: either every counter changes or none does.
    ///
    /// Cells are locked in address order so concurrent calls over overlapping
    /// counters cannot deadlock.
    pub(crate) fn apply_together(
        updates: &[(&AggregateCounter, CounterDelta)],
    ) -> Result<(), CoreError> {
        let mut order: Vec<usize> = (0..updates.len()).collect();
        order.sort_by_key(|&i| std::ptr::from_ref(updates[i].0) as usize);
        order.dedup_by_key(|i| std::ptr::from_ref(updates[*i].0) as usize);
        if order.len() != updates.len() {
            return Err(CoreError::InvalidBatch(
                "counter listed twice in one update".to_string(),
            ));
        }

        let mut guards: Vec<(usize, MutexGuard<'_, U256>)> = order
            .iter()
            .map(|&i| (i, updates[i].0.value.lock()))
            .collect();

        let mut staged = Vec::with_capacity(guards.len());
        for (i, guard) in &guards {
            let (counter, delta) = updates[*i];
            staged.push(counter.checked(**guard, delta)?);
        }
        let mut applied = Vec::with_capacity(guards.len());
        for ((i, guard), next) in guards.iter_mut().zip(staged) {
            **guard = next;
            applied.push((*i, next));
        }
        drop(guards);

        applied.sort_unstable_by_key(|&(i, _)| i);
        for (i, next) in applied {
            let (counter, delta) = updates[i];
            counter.announce(delta, next);
        }
        Ok(())
    }

    fn checked(&self, value: U256, delta: CounterDelta) -> Result<U256, CoreError> {
        let (next, reason) = match delta {
            CounterDelta::Increase(v) => (value.checked_add(v), "overflow"),
            CounterDelta::Decrease(v) => (value.checked_sub(v), "underflow"),
        };
        next.ok_or_else(|| {
            warn!(counter = %self.name, reason, "counter update rejected");
            CoreError::Arithmetic {
                counter: self.name.clone(),
                reason,
            }
        })
    }

    fn announce(&self, delta: CounterDelta, value: U256) {
        self.sink.emit(Notification::CounterChanged {
            counter: self.name.clone(),
            direction: delta.direction(),
            delta: delta.magnitude(),
            value,
        });
    }
}
