//! # Product Repository
//!
//! Catalog operations for products, plus the two statements the ledger
//! uses to change stock.
//!
//! ## Locking and Guarded Deltas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  lock_for_update(id)                                                    │
//! │    UPDATE products SET last_updated = last_updated                      │
//! │    WHERE id = ? RETURNING *                                             │
//! │    → takes the SQLite write lock, then hands back the current row.      │
//! │      A second writer blocks here (busy_timeout) until we commit.        │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  rules decide on the row just returned                                  │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  apply_stock_delta(id, dq, db)                                          │
//! │    UPDATE products SET quantity = quantity + dq, ...                    │
//! │    WHERE id = ? AND quantity + dq >= 0 AND bottles + db >= 0            │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Catalog writes (`create`, `update`, `deactivate`) never touch
//! `quantity` after creation, nor `bottles_outstanding` at all.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::category;
use stockledger_core::ledger::check_returnable_change;
use stockledger_core::validation::{generate_sku, validate_new_product, validate_product};
use stockledger_core::{
    authorize, Actor, CoreError, NewProduct, Operation, Product, ProductFilter, ProductSort,
    ProductUpdate, TenantContext,
};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

// =============================================================================
// Ledger helpers (crate-private)
// =============================================================================

/// Locks the product row for the rest of the transaction and returns it.
///
/// Must be the first write of the transaction; `Ok(None)` if there is no
/// such product.
pub(crate) async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET last_updated = last_updated WHERE id = ?1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(product)
}

/// Locks a product and checks it belongs to `ctx`.
pub(crate) async fn lock_owned(conn: &mut SqliteConnection, ctx: &TenantContext, id: &str) -> DbResult<Product> {
    let product = lock_for_update(conn, id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;
    ctx.ensure_owns("Product", &product.id, &product.tenant_id)?;
    Ok(product)
}

/// Adds the deltas to stock and outstanding containers, refusing to take
/// either below zero. Returns the updated row.
pub(crate) async fn apply_stock_delta(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
    quantity_delta: i64,
    bottles_delta: i64,
    now: DateTime<Utc>,
) -> DbResult<Product> {
    let updated = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            quantity = quantity + ?3,
            bottles_outstanding = bottles_outstanding + ?4,
            last_updated = ?5
        WHERE id = ?1
          AND tenant_id = ?2
          AND quantity + ?3 >= 0
          AND bottles_outstanding + ?4 >= 0
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(ctx.tenant_id())
    .bind(quantity_delta)
    .bind(bottles_delta)
    .bind(now)
    .fetch_optional(conn)
    .await?;

    // The row is locked and the rules already approved these deltas, so a
    // miss here means the lock did not hold.
    updated.ok_or_else(|| {
        DbError::Internal(format!(
            "stock guard rejected delta ({quantity_delta}, {bottles_delta}) on product {id}"
        ))
    })
}

// =============================================================================
// Catalog operations
// =============================================================================

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product with its opening stock.
    ///
    /// A missing SKU is generated. The category, if given, must belong to
    /// the same tenant.
    pub async fn create(&self, ctx: &TenantContext, actor: &Actor, new: NewProduct) -> DbResult<Product> {
        authorize(ctx, actor, Operation::ManageCatalog)?;
        validate_new_product(&new)?;

        if let Some(category_id) = &new.category_id {
            category::fetch_owned(&self.pool, ctx, category_id).await?;
        }

        let sku = match new.sku.as_deref().map(str::trim) {
            Some(sku) if !sku.is_empty() => sku.to_string(),
            _ => generate_sku(),
        };
        let product = Product::from_new(Uuid::new_v4().to_string(), ctx.tenant_id(), sku, new, Utc::now());

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, category_id, name, description, sku,
                quantity, price_cents, expiry_date, low_stock_threshold,
                is_returnable, deposit_cents, bottles_outstanding, is_active,
                created_at, last_updated
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(product.quantity)
        .bind(product.price_cents)
        .bind(product.expiry_date)
        .bind(product.low_stock_threshold)
        .bind(product.is_returnable)
        .bind(product.deposit_cents)
        .bind(product.bottles_outstanding)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.last_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("sku", &product.sku))?;

        info!(
            tenant_id = %product.tenant_id,
            product_id = %product.id,
            sku = %product.sku,
            quantity = product.quantity,
            "Product created"
        );
        Ok(product)
    }

    /// Gets a product by ID (active or not).
    pub async fn get(&self, ctx: &TenantContext, actor: &Actor, id: &str) -> DbResult<Product> {
        authorize(ctx, actor, Operation::ViewCatalog)?;
        debug!(id = %id, "Getting product");

        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;

        ctx.ensure_owns("Product", &product.id, &product.tenant_id)?;
        Ok(product)
    }

    pub async fn get_by_sku(&self, ctx: &TenantContext, actor: &Actor, sku: &str) -> DbResult<Option<Product>> {
        authorize(ctx, actor, Operation::ViewCatalog)?;

        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE tenant_id = ?1 AND sku = ?2")
            .bind(ctx.tenant_id())
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists products with filtering, sorting and pagination.
    ///
    /// Ties in the sort key fall back to name, then id, so pages are stable.
    pub async fn list(&self, ctx: &TenantContext, actor: &Actor, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        authorize(ctx, actor, Operation::ViewCatalog)?;
        debug!(?filter, "Listing products");

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT p.* FROM products p LEFT JOIN categories c ON c.id = p.category_id WHERE p.tenant_id = ",
        );
        query.push_bind(ctx.tenant_id().to_string());

        if !filter.include_inactive {
            query.push(" AND p.is_active = 1");
        }
        if let Some(category_id) = &filter.category_id {
            query.push(" AND p.category_id = ").push_bind(category_id.clone());
        }
        if filter.low_stock_only {
            query.push(" AND p.quantity <= p.low_stock_threshold");
        }

        let direction = if filter.descending { "DESC" } else { "ASC" };
        let key = match filter.sort {
            ProductSort::Name => "p.name",
            ProductSort::Quantity => "p.quantity",
            ProductSort::Price => "p.price_cents",
            // Uncategorized products sort last either way.
            ProductSort::Category => "c.name IS NULL, c.name",
        };
        query.push(format!(" ORDER BY {key} {direction}, p.name ASC, p.id ASC"));

        query.push(" LIMIT ").push_bind(i64::from(filter.limit));
        query.push(" OFFSET ").push_bind(i64::from(filter.offset));

        let products = query.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Number of products the tenant has (active or not).
    pub async fn count(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<i64> {
        authorize(ctx, actor, Operation::ViewCatalog)?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE tenant_id = ?1")
            .bind(ctx.tenant_id())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Updates descriptive fields. Stock and outstanding containers are
    /// left exactly as they are.
    pub async fn update(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        id: &str,
        update: &ProductUpdate,
    ) -> DbResult<Product> {
        authorize(ctx, actor, Operation::ManageCatalog)?;

        let mut tx = self.pool.begin().await?;
        let current = lock_owned(&mut *tx, ctx, id).await?;

        let mut product = current.clone();
        update.apply_to(&mut product);
        validate_product(&product)?;
        check_returnable_change(&current, &product)?;

        if let Some(category_id) = &product.category_id {
            category::fetch_owned(&mut *tx, ctx, category_id).await?;
        }

        product.last_updated = Utc::now();

        sqlx::query(
            r#"
            UPDATE products SET
                category_id = ?3,
                name = ?4,
                description = ?5,
                sku = ?6,
                price_cents = ?7,
                expiry_date = ?8,
                low_stock_threshold = ?9,
                is_returnable = ?10,
                deposit_cents = ?11,
                last_updated = ?12
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.sku)
        .bind(product.price_cents)
        .bind(product.expiry_date)
        .bind(product.low_stock_threshold)
        .bind(product.is_returnable)
        .bind(product.deposit_cents)
        .bind(product.last_updated)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value("sku", &product.sku))?;

        tx.commit().await?;

        info!(product_id = %product.id, "Product updated");
        Ok(product)
    }

    /// Soft-deletes a product. History keeps pointing at it; the ledger
    /// refuses new entries for it.
    pub async fn deactivate(&self, ctx: &TenantContext, actor: &Actor, id: &str) -> DbResult<Product> {
        authorize(ctx, actor, Operation::ManageCatalog)?;

        let mut tx = self.pool.begin().await?;
        let mut product = lock_owned(&mut *tx, ctx, id).await?;

        product.is_active = false;
        product.last_updated = Utc::now();

        sqlx::query("UPDATE products SET is_active = 0, last_updated = ?2 WHERE id = ?1")
            .bind(&product.id)
            .bind(product.last_updated)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(product_id = %product.id, "Product deactivated");
        Ok(product)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use stockledger_core::{Role, ValidationError};

    async fn setup() -> (Database, TenantContext, Actor) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = db.tenants().create("Corner Shop").await.unwrap();
        let ctx = TenantContext::new(&tenant.id);
        let manager = Actor::new("m-1", Role::Manager, &tenant.id);
        (db, ctx, manager)
    }

    #[tokio::test]
    async fn test_create_with_defaults() {
        let (db, ctx, manager) = setup().await;

        let product = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Bread", 300))
            .await
            .unwrap();

        assert_eq!(product.quantity, 0);
        assert_eq!(product.low_stock_threshold, 10);
        assert_eq!(product.bottles_outstanding, 0);
        assert_eq!(product.sku.len(), 20);
        assert!(product.is_active);

        let fetched = db.products().get(&ctx, &manager, &product.id).await.unwrap();
        assert_eq!(fetched.id, product.id);
        assert_eq!(fetched.sku, product.sku);
        assert_eq!(fetched.tenant_id, ctx.tenant_id());
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let (db, ctx, manager) = setup().await;
        let repo = db.products();

        repo.create(&ctx, &manager, NewProduct::new("Bread", 300).sku("BREAD"))
            .await
            .unwrap();
        let err = repo
            .create(&ctx, &manager, NewProduct::new("Rye Bread", 350).sku("BREAD"))
            .await
            .unwrap_err();

        match err {
            DbError::DuplicateKey { field, value } => {
                assert_eq!(field, "sku");
                assert_eq!(value, "BREAD");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_same_sku_in_other_tenant_is_fine() {
        let (db, ctx, manager) = setup().await;
        let other = db.tenants().create("Other Shop").await.unwrap();
        let other_ctx = TenantContext::new(&other.id);
        let other_manager = Actor::new("m-2", Role::Manager, &other.id);

        db.products()
            .create(&ctx, &manager, NewProduct::new("Bread", 300).sku("BREAD"))
            .await
            .unwrap();
        db.products()
            .create(&other_ctx, &other_manager, NewProduct::new("Bread", 300).sku("BREAD"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deposit_rule_enforced_on_create() {
        let (db, ctx, manager) = setup().await;

        let err = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Lager", 800).returnable(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::DepositMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_sorting() {
        let (db, ctx, manager) = setup().await;
        let repo = db.products();

        repo.create(&ctx, &manager, NewProduct::new("Cheese", 900).quantity(50))
            .await
            .unwrap();
        repo.create(&ctx, &manager, NewProduct::new("Apples", 200).quantity(5))
            .await
            .unwrap();
        let bread = repo
            .create(&ctx, &manager, NewProduct::new("Bread", 300).quantity(10))
            .await
            .unwrap();

        let names = |products: Vec<Product>| products.into_iter().map(|p| p.name).collect::<Vec<_>>();

        let by_name = repo.list(&ctx, &manager, &ProductFilter::default()).await.unwrap();
        assert_eq!(names(by_name), vec!["Apples", "Bread", "Cheese"]);

        let by_price_desc = ProductFilter {
            sort: ProductSort::Price,
            descending: true,
            ..Default::default()
        };
        assert_eq!(
            names(repo.list(&ctx, &manager, &by_price_desc).await.unwrap()),
            vec!["Cheese", "Bread", "Apples"]
        );

        // threshold defaults to 10 and the comparison is inclusive
        let low = ProductFilter {
            low_stock_only: true,
            ..Default::default()
        };
        assert_eq!(names(repo.list(&ctx, &manager, &low).await.unwrap()), vec!["Apples", "Bread"]);

        let page = ProductFilter {
            limit: 1,
            offset: 1,
            ..Default::default()
        };
        assert_eq!(names(repo.list(&ctx, &manager, &page).await.unwrap()), vec!["Bread"]);

        repo.deactivate(&ctx, &manager, &bread.id).await.unwrap();
        assert_eq!(
            names(repo.list(&ctx, &manager, &ProductFilter::default()).await.unwrap()),
            vec!["Apples", "Cheese"]
        );
        let all = ProductFilter {
            include_inactive: true,
            ..Default::default()
        };
        assert_eq!(repo.list(&ctx, &manager, &all).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sort_by_category_puts_uncategorized_last() {
        let (db, ctx, manager) = setup().await;
        let dairy = db.categories().create(&ctx, &manager, "Dairy").await.unwrap();
        let bakery = db.categories().create(&ctx, &manager, "Bakery").await.unwrap();
        let repo = db.products();

        repo.create(&ctx, &manager, NewProduct::new("Loose item", 100))
            .await
            .unwrap();
        repo.create(&ctx, &manager, NewProduct::new("Milk", 120).category(&dairy.id))
            .await
            .unwrap();
        repo.create(&ctx, &manager, NewProduct::new("Bread", 300).category(&bakery.id))
            .await
            .unwrap();

        let filter = ProductFilter {
            sort: ProductSort::Category,
            ..Default::default()
        };
        let names: Vec<String> = repo
            .list(&ctx, &manager, &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Bread", "Milk", "Loose item"]);

        let by_dairy = ProductFilter {
            category_id: Some(dairy.id.clone()),
            ..Default::default()
        };
        assert_eq!(repo.list(&ctx, &manager, &by_dairy).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_never_touches_stock() {
        let (db, ctx, manager) = setup().await;
        let product = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Lager", 800).quantity(40).returnable(200))
            .await
            .unwrap();

        let update = ProductUpdate {
            name: Some("Lager 50cl".to_string()),
            price_cents: Some(850),
            ..Default::default()
        };
        let updated = db.products().update(&ctx, &manager, &product.id, &update).await.unwrap();

        assert_eq!(updated.name, "Lager 50cl");
        assert_eq!(updated.price_cents, 850);
        assert_eq!(updated.quantity, 40);
        assert_eq!(updated.deposit_cents, 200);

        let stored = db.products().get(&ctx, &manager, &product.id).await.unwrap();
        assert_eq!(stored.name, "Lager 50cl");
        assert_eq!(stored.quantity, 40);
    }

    #[tokio::test]
    async fn test_returnable_flag_locked_while_containers_outstanding() {
        let (db, ctx, manager) = setup().await;
        let lager = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Lager", 800).quantity(40).returnable(200))
            .await
            .unwrap();
        db.ledger().record_sale(&ctx, &manager, &lager.id, 5).await.unwrap();

        let drop_deposit = ProductUpdate {
            is_returnable: Some(false),
            ..Default::default()
        };
        let err = db
            .products()
            .update(&ctx, &manager, &lager.id, &drop_deposit)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ContainersOutstanding { outstanding: 5, .. })
        ));

        let stored = db.products().get(&ctx, &manager, &lager.id).await.unwrap();
        assert!(stored.is_returnable);
        assert_eq!(stored.deposit_cents, 200);
        assert_eq!(
            db.reports().total_deposit_liability(&ctx, &manager).await.unwrap().cents(),
            1000
        );

        // Once every container is back the flag may go.
        db.ledger().record_deposit_refund(&ctx, &manager, &lager.id, 5).await.unwrap();
        let updated = db
            .products()
            .update(&ctx, &manager, &lager.id, &drop_deposit)
            .await
            .unwrap();
        assert!(!updated.is_returnable);
        assert_eq!(updated.deposit_cents, 0);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_result() {
        let (db, ctx, manager) = setup().await;
        let product = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Bread", 300))
            .await
            .unwrap();

        let update = ProductUpdate {
            price_cents: Some(0),
            ..Default::default()
        };
        let err = db.products().update(&ctx, &manager, &product.id, &update).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let stored = db.products().get(&ctx, &manager, &product.id).await.unwrap();
        assert_eq!(stored.price_cents, 300);
    }

    #[tokio::test]
    async fn test_category_from_other_tenant_rejected() {
        let (db, ctx, manager) = setup().await;
        let other = db.tenants().create("Other Shop").await.unwrap();
        let other_manager = Actor::new("m-2", Role::Manager, &other.id);
        let foreign = db
            .categories()
            .create(&TenantContext::new(&other.id), &other_manager, "Drinks")
            .await
            .unwrap();

        let err = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Cola", 150).category(&foreign.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TenantMismatch { .. })));
    }

    #[tokio::test]
    async fn test_get_other_tenant_product() {
        let (db, ctx, manager) = setup().await;
        let product = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Bread", 300))
            .await
            .unwrap();

        let other = db.tenants().create("Other Shop").await.unwrap();
        let other_ctx = TenantContext::new(&other.id);
        let other_manager = Actor::new("m-2", Role::Manager, &other.id);

        let err = db.products().get(&other_ctx, &other_manager, &product.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TenantMismatch { .. })));
        assert_eq!(db.products().count(&other_ctx, &other_manager).await.unwrap(), 0);
    }
}
