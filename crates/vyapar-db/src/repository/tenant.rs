//! # Tenant Repository
//!
//! Accounts and their lifecycle. Signup and authentication live elsewhere;
//! this repository only records tenants and answers "is this tenant active".

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use vyapar_core::validation;
use vyapar_core::{Tenant, TenantStatus};

#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Creates a tenant with a caller-chosen id.
    pub async fn create(
        &self,
        id: &str,
        company_name: &str,
        status: TenantStatus,
    ) -> DbResult<Tenant> {
        validation::validate_name(company_name, "company_name")
            .map_err(vyapar_core::CoreError::from)?;
        debug!(tenant_id = %id, "Creating tenant");

        let tenant = Tenant {
            id: id.to_string(),
            company_name: company_name.trim().to_string(),
            status,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO tenants (id, company_name, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&tenant.id)
        .bind(&tenant.company_name)
        .bind(tenant.status)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("tenant id", id),
            other => other,
        })?;

        Ok(tenant)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT id, company_name, status, created_at FROM tenants WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    pub async fn set_status(&self, id: &str, status: TenantStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE tenants SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tenant", id));
        }

        info!(tenant_id = %id, status = %status, "Tenant status changed");
        Ok(())
    }

    /// True only for tenants in `ACTIVE` state.
    pub async fn is_active(&self, id: &str) -> DbResult<bool> {
        Ok(self.get(id).await?.is_some_and(|t| t.is_active()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_tenant_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tenants();

        let tenant = repo
            .create("acct-1", "Chai Point", TenantStatus::Pending)
            .await
            .unwrap();
        assert_eq!(tenant.status, TenantStatus::Pending);
        assert!(!repo.is_active("acct-1").await.unwrap());

        repo.set_status("acct-1", TenantStatus::Active).await.unwrap();
        assert!(repo.is_active("acct-1").await.unwrap());

        repo.set_status("acct-1", TenantStatus::Suspended).await.unwrap();
        assert!(!repo.is_active("acct-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_and_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tenants();

        repo.create("acct-1", "Chai Point", TenantStatus::Active)
            .await
            .unwrap();
        let dup = repo
            .create("acct-1", "Other", TenantStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(dup, DbError::UniqueViolation { .. }));

        assert!(!repo.is_active("nobody").await.unwrap());
        assert!(repo
            .set_status("nobody", TenantStatus::Active)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
