//! Allow-list authorization.
//!
//! There is no process-wide allow-list: every guarded call receives a
//! [`CallContext`] naming the caller and the [`AuthorizationContext`] it is
//! checked against. Checks happen at call entry, so a revocation affects
//! every call that starts after it and none that already passed the check.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use strand_canonical::{ActorId, PrincipalId};
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::events::Notification;
use crate::sink::SharedSink;

/// Owner plus the set of principals allowed to act for others.
pub struct AuthorizationContext {
    owner: PrincipalId,
    authorized: RwLock<BTreeSet<PrincipalId>>,
    sink: SharedSink,
}

impl AuthorizationContext {
    /// Creates a context whose only privileged principal is `owner`.
    pub fn new(owner: PrincipalId, sink: SharedSink) -> Self {
        Self {
            owner,
            authorized: RwLock::new(BTreeSet::new()),
            sink,
        }
    }

    /// The owner.
    pub fn owner(&self) -> &PrincipalId {
        &self.owner
    }

    /// True for the owner and for any currently allowed principal.
    pub fn is_authorized(&self, principal: &PrincipalId) -> bool {
        principal == &self.owner || self.authorized.read().contains(principal)
    }

    /// Grants or revokes `principal`. Owner only.
    ///
    /// Emits `AuthorizationChanged` only when membership actually changes.
    pub fn set_authorized(
        &self,
        caller: &PrincipalId,
        principal: PrincipalId,
        allowed: bool,
    ) -> Result<(), CoreError> {
        if caller != &self.owner {
            warn!(caller = %caller, principal = %principal, "set_authorized rejected");
            return Err(CoreError::NotAuthorized {
                principal: caller.clone(),
            });
        }
        let mut authorized = self.authorized.write();
        let changed = if allowed {
            authorized.insert(principal.clone())
        } else {
            authorized.remove(&principal)
        };
        if changed {
            debug!(principal = %principal, allowed, "authorization changed");
            self.sink
                .emit(Notification::AuthorizationChanged { principal, allowed });
        }
        Ok(())
    }

    /// Sorted snapshot of allowed principals (the owner is implicit).
    pub fn authorized_principals(&self) -> Vec<PrincipalId> {
        self.authorized.read().iter().cloned().collect()
    }

    /// Binds `caller` to this context for a guarded call.
    pub fn call_as<'a>(&'a self, caller: &'a PrincipalId) -> CallContext<'a> {
        CallContext { caller, auth: self }
    }
}

/// The caller of one operation and the allow-list it is checked against.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    caller: &'a PrincipalId,
    auth: &'a AuthorizationContext,
}

impl<'a> CallContext<'a> {
    /// Builds a context explicitly.
    pub fn new(caller: &'a PrincipalId, auth: &'a AuthorizationContext) -> Self {
        Self { caller, auth }
    }

    /// The calling principal.
    pub fn caller(&self) -> &'a PrincipalId {
        self.caller
    }

    /// Fails unless the caller is the owner or allowed.
    pub fn ensure_authorized(&self) -> Result<(), CoreError> {
        if self.auth.is_authorized(self.caller) {
            return Ok(());
        }
        warn!(caller = %self.caller, "caller not authorized");
        Err(CoreError::NotAuthorized {
            principal: self.caller.clone(),
        })
    }

    /// Fails unless the caller is `actor` itself, the owner, or allowed.
    pub fn ensure_actor_or_authorized(&self, actor: &ActorId) -> Result<(), CoreError> {
        if self.caller == actor {
            return Ok(());
        }
        self.ensure_authorized()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sink::MemorySink;

    fn p(s: &str) -> PrincipalId {
        PrincipalId::parse(s).unwrap()
    }

    #[test]
    fn owner_is_always_authorized() {
        let auth = AuthorizationContext::new(p("acct:owner"), Arc::new(MemorySink::new()));
        assert!(auth.is_authorized(&p("acct:owner")));
        assert!(!auth.is_authorized(&p("acct:relayer")));
    }

    #[test]
    fn grant_and_revoke_take_effect_immediately() {
        let sink = Arc::new(MemorySink::new());
        let auth = AuthorizationContext::new(p("acct:owner"), sink.clone());
        let relayer = p("acct:relayer");

        auth.set_authorized(&p("acct:owner"), relayer.clone(), true).unwrap();
        assert!(auth.call_as(&relayer).ensure_authorized().is_ok());

        auth.set_authorized(&p("acct:owner"), relayer.clone(), false).unwrap();
        assert!(auth.call_as(&relayer).ensure_authorized().is_err());
        assert_eq!(sink.of_kind("authorization_changed").len(), 2);
    }

    #[test]
    fn only_owner_may_change_membership() {
        let auth = AuthorizationContext::new(p("acct:owner"), Arc::new(MemorySink::new()));
        let relayer = p("acct:relayer");
        auth.set_authorized(&p("acct:owner"), relayer.clone(), true).unwrap();

        let err = auth
            .set_authorized(&relayer, p("acct:friend"), true)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotAuthorized { .. }));
        assert!(!auth.is_authorized(&p("acct:friend")));
    }

    #[test]
    fn redundant_changes_are_silent() {
        let sink = Arc::new(MemorySink::new());
        let auth = AuthorizationContext::new(p("acct:owner"), sink.clone());
        auth.set_authorized(&p("acct:owner"), p("acct:x"), false).unwrap();
        auth.set_authorized(&p("acct:owner"), p("acct:x"), true).unwrap();
        auth.set_authorized(&p("acct:owner"), p("acct:x"), true).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(auth.authorized_principals(), vec![p("acct:x")]);
    }

    #[test]
    fn actor_may_act_for_itself() {
        let auth = AuthorizationContext::new(p("acct:owner"), Arc::new(MemorySink::new()));
        let alice = p("acct:alice");
        let ctx = auth.call_as(&alice);
        assert!(ctx.ensure_actor_or_authorized(&alice).is_ok());
        assert!(ctx.ensure_actor_or_authorized(&p("acct:bob")).is_err());
    }
}
