//! Per-request tenant context.
//!
//! A [`TenantContext`] is an ordinary value: create one per inbound request
//! (usually with [`TenantContext::for_actor`]) and pass it down the call chain.
//! Nothing here is global, so concurrent requests cannot observe each other's
//! tenant.

use crate::actor::Actor;
use crate::error::TenancyError;
use crate::tenant::TenantId;

/// The active tenant and the override flag for one request.
///
/// The default context has no tenant and no override, so any scoped query
/// issued before the context is resolved fails with
/// [`TenancyError::TenantIdNotSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<i64>,
    override_scope: bool,
}

impl TenantContext {
    /// Create an unresolved context.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context scoped to one tenant.
    pub fn for_tenant(tenant_id: i64) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            override_scope: false,
        }
    }

    /// A context with scoping disabled.
    pub fn unrestricted() -> Self {
        Self {
            tenant_id: None,
            override_scope: true,
        }
    }

    /// Build a context already resolved for `actor`.
    pub fn for_actor(actor: Option<&dyn Actor>) -> Self {
        let mut ctx = Self::new();
        ctx.resolve_for_current_actor(actor);
        ctx
    }

    /// Store the current tenant id. Validation happens when the id is consumed.
    pub fn set_tenant_id(&mut self, tenant_id: i64) {
        self.tenant_id = Some(tenant_id);
    }

    pub fn tenant_id(&self) -> Option<i64> {
        self.tenant_id
    }

    /// Forget the current tenant id.
    pub fn clear_tenant_id(&mut self) {
        self.tenant_id = None;
    }

    /// Enable or disable the scoping override.
    pub fn set_override(&mut self, enabled: bool) {
        self.override_scope = enabled;
    }

    /// Whether scoping is bypassed for this context.
    pub fn is_overridden(&self) -> bool {
        self.override_scope
    }

    /// Resolve override and tenant id from the authenticated actor.
    ///
    /// - no actor: override, no tenant (CLI and system jobs run unrestricted)
    /// - administrator: override, tenant taken from the actor if it has one
    /// - anyone else: scoped to the actor's tenant
    ///
    /// A tenant id left from an earlier resolution never survives.
    pub fn resolve_for_current_actor(&mut self, actor: Option<&dyn Actor>) {
        match actor {
            None => {
                tracing::debug!("no authenticated actor, tenant scoping overridden");
                self.override_scope = true;
                self.tenant_id = None;
            }
            Some(actor) if actor.is_administrator() => {
                tracing::debug!("administrator actor, tenant scoping overridden");
                self.override_scope = true;
                self.tenant_id = actor.tenant_id();
            }
            Some(actor) => {
                self.override_scope = false;
                match actor.tenant_id() {
                    Some(id) => self.tenant_id = Some(id),
                    None => {
                        tracing::warn!("authenticated actor has no tenant id");
                        self.tenant_id = None;
                    }
                }
            }
        }
    }

    /// The validated tenant id, for contexts that are not overridden.
    pub fn require_tenant(&self) -> Result<TenantId, TenancyError> {
        match self.tenant_id {
            Some(id) if id >= 1 => TenantId::new(id),
            _ => Err(TenancyError::TenantIdNotSet),
        }
    }
}
