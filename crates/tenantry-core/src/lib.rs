//! # tenantry-core
//!
//! Shared types for Tenantry's row-level tenant isolation:
//!
//! - [`TenantContext`]: the per-request tenant id and override flag
//! - [`Actor`] / [`Principal`]: the authentication surface used to resolve a context
//! - [`TenancyConfig`]: which column carries the tenant id on each table
//!
//! Query rewriting lives in `tenantry-scope`; this crate has no opinion on how
//! queries are built or executed.

pub mod actor;
pub mod config;
pub mod context;
pub mod error;
pub mod tenant;

pub use actor::{Actor, Principal};
pub use config::{
    ConfigError, LoggingConfig, TableTenancyConfig, TenancyConfig, TenantryConfig,
};
pub use context::TenantContext;
pub use error::TenancyError;
pub use tenant::TenantId;
