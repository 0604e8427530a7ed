//! The authentication surface Tenantry needs from the host application.
//!
//! Only two questions are asked of an authenticated actor: whether it is an
//! administrator and which tenant it belongs to. "Is there a current actor"
//! is answered by passing `Option<&dyn Actor>`; `None` is the anonymous case.

use serde::{Deserialize, Serialize};

/// An authenticated caller.
pub trait Actor {
    /// Administrators bypass tenant scoping entirely.
    fn is_administrator(&self) -> bool;

    /// The tenant this actor belongs to, if any.
    fn tenant_id(&self) -> Option<i64>;
}

impl<A: Actor + ?Sized> Actor for &A {
    fn is_administrator(&self) -> bool {
        (**self).is_administrator()
    }

    fn tenant_id(&self) -> Option<i64> {
        (**self).tenant_id()
    }
}

/// A plain actor record, for hosts that don't carry their own user type
/// and for loading actors from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque identifier, used only for logging.
    pub id: String,

    #[serde(default)]
    pub tenant_id: Option<i64>,

    #[serde(default)]
    pub administrator: bool,
}

impl Principal {
    /// An ordinary user belonging to `tenant_id`.
    pub fn user(id: impl Into<String>, tenant_id: i64) -> Self {
        Self {
            id: id.into(),
            tenant_id: Some(tenant_id),
            administrator: false,
        }
    }

    /// An administrator. Administrators may still belong to a tenant.
    pub fn administrator(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant_id: None,
            administrator: true,
        }
    }
}

impl Actor for Principal {
    fn is_administrator(&self) -> bool {
        self.administrator
    }

    fn tenant_id(&self) -> Option<i64> {
        self.tenant_id
    }
}
