//! Validated tenant identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TenancyError;

/// A tenant id that has passed validation (always `>= 1`).
///
/// Raw ids stored on a [`TenantContext`](crate::TenantContext) are plain
/// integers; they only become a `TenantId` when a query is scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TenantId(i64);

impl TenantId {
    /// Validate a raw id.
    pub fn new(id: i64) -> Result<Self, TenancyError> {
        if id < 1 {
            return Err(TenancyError::InvalidTenantId(id));
        }
        Ok(Self(id))
    }

    /// The raw integer value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TenantId {
    type Error = TenancyError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<TenantId> for i64 {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
