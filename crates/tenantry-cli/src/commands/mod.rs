//! CLI command implementations for Tenantry.

pub mod check;
pub mod explain;
