//! Request-local tenant context for async handlers.
//!
//! A [`TenantContext`] can be passed explicitly, or installed for the
//! duration of one request future with [`with_tenant_context`]. Each call
//! creates a fresh scope; nothing is shared between concurrent requests.

use std::future::Future;
use tenantry_core::TenantContext;

tokio::task_local! {
    static CURRENT_CONTEXT: TenantContext;
}

/// Run `fut` with `context` as the current tenant context.
pub async fn with_tenant_context<F: Future>(context: TenantContext, fut: F) -> F::Output {
    CURRENT_CONTEXT.scope(context, fut).await
}

/// The context of the enclosing request scope, if any.
pub fn current_context() -> Option<TenantContext> {
    CURRENT_CONTEXT.try_with(TenantContext::clone).ok()
}
