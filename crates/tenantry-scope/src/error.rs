//! Error types for the scoping crate.

use tenantry_core::TenancyError;
use thiserror::Error;

/// Errors that can occur while scoping or executing a tenant-scoped query.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// No valid tenant id is available, or an explicit tenant id was invalid.
    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    /// An admin delete was attempted on an entity that was never persisted.
    #[error("cannot delete from {table}: entity has no primary key")]
    MissingPrimaryKey { table: String },

    /// SQL parsing failed.
    #[error("failed to parse SQL: {0}")]
    ParseError(String),

    /// SQL parsed but cannot be mapped onto a scoped query.
    #[error("unsupported SQL: {reason}")]
    Unsupported { reason: String },

    /// An entity could not be serialized into a row.
    #[error("failed to encode {table} entity: {source}")]
    Encode {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored row could not be decoded into the entity type.
    #[error("failed to decode {table} row: {source}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    /// The storage collaborator failed.
    #[error("query execution failed: {0}")]
    Execution(#[from] anyhow::Error),
}

impl ScopeError {
    /// True when the error means "no tenant id": the case request handlers
    /// translate into a server-side failure.
    pub fn is_tenant_not_set(&self) -> bool {
        matches!(self, ScopeError::Tenancy(TenancyError::TenantIdNotSet))
    }
}
