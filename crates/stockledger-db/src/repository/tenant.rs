//! # Tenant Repository
//!
//! Bootstrap of tenant rows. Which tenant a request belongs to is decided
//! by the caller; this only makes the foreign key target exist.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use stockledger_core::{Tenant, ValidationError};

const TENANT_NAME_MAX_LEN: usize = 255;

/// Repository for tenant rows.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Creates a tenant. Names are unique across the installation.
    pub async fn create(&self, name: &str) -> DbResult<Tenant> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "tenant name".to_string(),
            }
            .into());
        }
        if name.chars().count() > TENANT_NAME_MAX_LEN {
            return Err(ValidationError::TooLong {
                field: "tenant name".to_string(),
                max: TENANT_NAME_MAX_LEN,
            }
            .into());
        }

        let tenant = Tenant {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO tenants (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&tenant.id)
            .bind(&tenant.name)
            .bind(tenant.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).with_duplicate_value("name", name))?;

        info!(tenant_id = %tenant.id, name = %tenant.name, "Tenant created");
        Ok(tenant)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Tenant>> {
        debug!(id = %id, "Getting tenant");

        let tenant = sqlx::query_as::<_, Tenant>("SELECT id, name, created_at FROM tenants WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tenant)
    }

    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Tenant>> {
        let tenant =
            sqlx::query_as::<_, Tenant>("SELECT id, name, created_at FROM tenants WHERE name = ?1")
                .bind(name.trim())
                .fetch_optional(&self.pool)
                .await?;

        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = db.tenants().create("Corner Shop").await.unwrap();

        let fetched = db.tenants().get(&tenant.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Corner Shop");
        assert!(db.tenants().get("missing").await.unwrap().is_none());
        assert!(db.tenants().get_by_name("Corner Shop").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.tenants().create("Corner Shop").await.unwrap();

        let err = db.tenants().create("Corner Shop").await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { ref field, .. } if field == "name"));
    }
}
