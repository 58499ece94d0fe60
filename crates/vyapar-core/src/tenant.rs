//! Tenants and the tenant context passed into every operation.
//!
//! There is no ambient "current tenant". The server resolves the caller to a
//! [`TenantContext`] once per request and hands `ctx.tenant_id()` to every
//! repository call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Tenant lifecycle. Only `Active` tenants may use the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum TenantStatus {
    Pending,
    Active,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Pending => "PENDING",
            TenantStatus::Active => "ACTIVE",
            TenantStatus::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account: the isolation boundary for all other data.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tenant {
    pub id: String,
    pub company_name: String,
    pub status: TenantStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Staff role carried in the caller's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Manager,
    Cashier,
    Waiter,
    Kitchen,
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "cashier" => Ok(Role::Cashier),
            "waiter" => Ok(Role::Waiter),
            "kitchen" => Ok(Role::Kitchen),
            other => Err(ValidationError::InvalidFormat {
                field: "role".to_string(),
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// Already-authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: String,
    role: Role,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>, role: Role) -> Self {
        TenantContext {
            tenant_id: tenant_id.into(),
            role,
        }
    }

    #[inline]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Table layout and product catalogue changes.
    pub fn can_manage(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Kitchen".parse::<Role>().ok(), Some(Role::Kitchen));
        assert!("chef".parse::<Role>().is_err());
    }

    #[test]
    fn test_context_permissions() {
        assert!(TenantContext::new("t1", Role::Manager).can_manage());
        assert!(!TenantContext::new("t1", Role::Waiter).can_manage());
    }
}
