//! # tenantry-scope
//!
//! Automatic row-level tenant isolation for query builders.
//!
//! Every query built against a scoped entity gets a tenant predicate:
//!
//! **Built by the caller:**
//! ```sql
//! SELECT * FROM orders WHERE status = $1
//! ```
//!
//! **Executed:**
//! ```sql
//! SELECT * FROM orders WHERE status = $1 AND orders.tenant_id = $2
//! ```
//!
//! Privileged code can step outside the current tenant explicitly:
//!
//! | Operation              | Effect                                            |
//! |------------------------|---------------------------------------------------|
//! | `remove_tenant()`      | Drop the tenant predicate and its binding         |
//! | `all_tenants()`        | Alias of `remove_tenant()`                        |
//! | `apply_tenant(ids)`    | Replace it with `= id` or `IN (ids)`              |
//! | `admin_delete(entity)` | Delete one row by primary key, ignoring tenancy   |
//!
//! New entities are stamped with the current tenant before their first insert
//! (see [`entity::before_create`]).

pub mod entity;
pub mod error;
pub mod executor;
pub mod parser;
pub mod query;
pub mod repository;
pub mod request;
pub mod rewriter;
pub mod scope;
pub mod sql;

pub use entity::{Row, ScopedEntity, before_create};
pub use error::ScopeError;
pub use executor::{MemoryExecutor, QueryExecutor};
pub use parser::{ParsedStatement, SqlAnalyzer, SqlOperation};
pub use query::{Connector, FilterQuery, Operator, Predicate, Query};
pub use repository::TenantRepository;
pub use request::{current_context, with_tenant_context};
pub use rewriter::{ConstraintRewriter, TenantSelector};
pub use scope::{ScopeState, ScopedQuery, TenantScope};
pub use sql::{RenderedSql, render_delete, render_select};
