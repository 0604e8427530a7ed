//! Error types for tenant resolution.

use thiserror::Error;

/// Errors raised when a tenant id is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenancyError {
    /// No usable tenant id is available and scoping is not overridden.
    #[error("tenant id is not set")]
    TenantIdNotSet,

    /// An explicit tenant id was given but is not a positive integer.
    #[error("invalid tenant id {0}: tenant ids must be >= 1")]
    InvalidTenantId(i64),
}
