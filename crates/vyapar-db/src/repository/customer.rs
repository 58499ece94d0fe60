//! # Customer Repository
//!
//! Customer records and their loyalty balance. The balance only changes
//! through a checkout; see [`super::checkout`].

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use vyapar_core::ids::{self, Alphabet};
use vyapar_core::validation;
use vyapar_core::{CoreError, Customer, NewCustomer, TenantContext};

pub(crate) const CUSTOMER_COLUMNS: &str =
    "id, tenant_id, name, phone, email, city, pincode, loyalty_points, created_at";

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn create(&self, tenant: &TenantContext, new: NewCustomer) -> DbResult<Customer> {
        validation::validate_name(&new.name, "name").map_err(CoreError::from)?;

        let customer = Customer {
            id: ids::generate_id(16, Alphabet::Alphanumeric, "CUS-"),
            tenant_id: tenant.tenant_id().to_string(),
            name: new.name.trim().to_string(),
            phone: blank_to_none(new.phone),
            email: blank_to_none(new.email),
            city: blank_to_none(new.city),
            pincode: blank_to_none(new.pincode),
            loyalty_points: 0,
            created_at: Utc::now(),
        };

        debug!(tenant_id = %customer.tenant_id, customer_id = %customer.id, "Creating customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, tenant_id, name, phone, email, city, pincode, loyalty_points, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.tenant_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.city)
        .bind(&customer.pincode)
        .bind(customer.loyalty_points)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn get(&self, tenant: &TenantContext, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1 AND tenant_id = ?2"
        ))
        .bind(id)
        .bind(tenant.tenant_id())
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_tenant, setup};

    #[tokio::test]
    async fn test_create_and_get() {
        let (db, tenant) = setup().await;
        let customers = db.customers();

        let created = customers
            .create(
                &tenant,
                NewCustomer {
                    name: "  Asha Verma ".into(),
                    phone: Some("9800000001".into()),
                    city: Some(" ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.name, "Asha Verma");
        assert!(created.city.is_none());
        assert_eq!(created.loyalty_points, 0);

        let fetched = customers.get(&tenant, &created.id).await.unwrap().unwrap();
        assert_eq!(fetched.phone.as_deref(), Some("9800000001"));

        let other = add_tenant(&db, "acct-other").await;
        assert!(customers.get(&other, &created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_name_required() {
        let (db, tenant) = setup().await;
        let err = db
            .customers()
            .create(&tenant, NewCustomer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::DbError::Domain(CoreError::Validation(_))));
    }
}
