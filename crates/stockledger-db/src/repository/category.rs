//! # Category Repository
//!
//! Per-tenant product groupings. Deleting a category keeps its products;
//! they just become uncategorized.

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use stockledger_core::validation::validate_category_name;
use stockledger_core::{authorize, Actor, Category, CoreError, Operation, TenantContext};

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

/// Loads a category by id and checks it belongs to `ctx`.
///
/// Works against the pool or an open transaction.
pub(crate) async fn fetch_owned<'e, E>(executor: E, ctx: &TenantContext, id: &str) -> DbResult<Category>
where
    E: Executor<'e, Database = Sqlite>,
{
    let category = sqlx::query_as::<_, Category>("SELECT id, tenant_id, name FROM categories WHERE id = ?1")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| CoreError::CategoryNotFound(id.to_string()))?;

    ctx.ensure_owns("Category", &category.id, &category.tenant_id)?;
    Ok(category)
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn create(&self, ctx: &TenantContext, actor: &Actor, name: &str) -> DbResult<Category> {
        authorize(ctx, actor, Operation::ManageCatalog)?;
        validate_category_name(name)?;

        let category = Category {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id().to_string(),
            name: name.trim().to_string(),
        };

        sqlx::query("INSERT INTO categories (id, tenant_id, name) VALUES (?1, ?2, ?3)")
            .bind(&category.id)
            .bind(&category.tenant_id)
            .bind(&category.name)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).with_duplicate_value("name", &category.name))?;

        info!(tenant_id = %ctx.tenant_id(), category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn get(&self, ctx: &TenantContext, actor: &Actor, id: &str) -> DbResult<Category> {
        authorize(ctx, actor, Operation::ViewCatalog)?;
        debug!(id = %id, "Getting category");
        fetch_owned(&self.pool, ctx, id).await
    }

    /// All categories of the tenant, ordered by name.
    pub async fn list(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<Vec<Category>> {
        authorize(ctx, actor, Operation::ViewCatalog)?;

        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, tenant_id, name FROM categories WHERE tenant_id = ?1 ORDER BY name",
        )
        .bind(ctx.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn rename(&self, ctx: &TenantContext, actor: &Actor, id: &str, name: &str) -> DbResult<Category> {
        authorize(ctx, actor, Operation::ManageCatalog)?;
        validate_category_name(name)?;

        let mut category = fetch_owned(&self.pool, ctx, id).await?;
        category.name = name.trim().to_string();

        sqlx::query("UPDATE categories SET name = ?2 WHERE id = ?1 AND tenant_id = ?3")
            .bind(&category.id)
            .bind(&category.name)
            .bind(ctx.tenant_id())
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from(e).with_duplicate_value("name", &category.name))?;

        info!(category_id = %category.id, name = %category.name, "Category renamed");
        Ok(category)
    }

    /// Deletes a category; its products stay, with `category_id` cleared.
    pub async fn delete(&self, ctx: &TenantContext, actor: &Actor, id: &str) -> DbResult<()> {
        authorize(ctx, actor, Operation::ManageCatalog)?;

        let mut tx = self.pool.begin().await?;
        fetch_owned(&mut *tx, ctx, id).await?;

        // Explicit rather than relying on ON DELETE SET NULL, so
        // last_updated moves too.
        let detached = sqlx::query(
            "UPDATE products SET category_id = NULL, last_updated = ?3 \
             WHERE category_id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(ctx.tenant_id())
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM categories WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(ctx.tenant_id())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(category_id = %id, detached_products = detached, "Category deleted");
        Ok(())
    }
}
