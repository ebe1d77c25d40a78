//! # Reporting Queries
//!
//! Read-only aggregates over the ledger and catalog for one tenant.
//! Manager only (`ViewReports`).
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────────┐
//! │ sales_total          │ Σ amount of `sale` rows in [from, to)            │
//! │ sales_summary        │ revenue, deposits, units, row count in [from, to)│
//! │ top_products         │ products by units sold in [from, to)             │
//! │ product_snapshot     │ every active product, by name                    │
//! │ low_stock_products   │ quantity <= low_stock_threshold                  │
//! │ stock_value          │ Σ quantity × price over active products          │
//! │ deposit_liability    │ outstanding containers × deposit, per product    │
//! └──────────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! Ranges are half-open and compared on the stored UTC timestamps.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use stockledger_core::{
    authorize, Actor, DepositLiability, Money, Operation, Product, ProductSnapshot, SalesSummary,
    TenantContext, TopProduct,
};

/// Read-only reporting over one tenant's data.
#[derive(Debug, Clone)]
pub struct ReportingRepository {
    pool: SqlitePool,
}

impl ReportingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportingRepository { pool }
    }

    /// Revenue from sale entries in `[from, to)`. Deposits are not revenue.
    pub async fn sales_total(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Money> {
        Ok(Money::from_cents(
            self.sales_summary(ctx, actor, from, to).await?.revenue_cents,
        ))
    }

    pub async fn sales_summary(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<SalesSummary> {
        authorize(ctx, actor, Operation::ViewReports)?;
        debug!(tenant_id = %ctx.tenant_id(), %from, %to, "Summarising sales");

        let summary = sqlx::query_as::<_, SalesSummary>(
            r#"
            SELECT
                COALESCE(SUM(amount_cents), 0)  AS revenue_cents,
                COALESCE(SUM(deposit_cents), 0) AS deposit_cents,
                COALESCE(SUM(quantity), 0)      AS units_sold,
                COUNT(*)                        AS transaction_count
            FROM stock_transactions
            WHERE tenant_id = ?1
              AND transaction_type = 'sale'
              AND timestamp >= ?2
              AND timestamp < ?3
            "#,
        )
        .bind(ctx.tenant_id())
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// The `limit` best sellers by units in `[from, to)`; ties by name.
    pub async fn top_products(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<TopProduct>> {
        authorize(ctx, actor, Operation::ViewReports)?;

        let rows = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                t.product_id          AS product_id,
                p.name                AS name,
                SUM(t.quantity)       AS units_sold,
                SUM(t.amount_cents)   AS revenue_cents
            FROM stock_transactions t
            JOIN products p ON p.id = t.product_id
            WHERE t.tenant_id = ?1
              AND t.transaction_type = 'sale'
              AND t.timestamp >= ?2
              AND t.timestamp < ?3
            GROUP BY t.product_id, p.name
            ORDER BY units_sold DESC, p.name ASC
            LIMIT ?4
            "#,
        )
        .bind(ctx.tenant_id())
        .bind(from)
        .bind(to)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Current state of every active product, ordered by name.
    pub async fn product_snapshot(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<Vec<ProductSnapshot>> {
        authorize(ctx, actor, Operation::ViewReports)?;

        let today = Utc::now().date_naive();
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE tenant_id = ?1 AND is_active = 1 ORDER BY name, id",
        )
        .bind(ctx.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        Ok(products.iter().map(|p| p.snapshot(today)).collect())
    }

    /// Active products at or below their threshold, emptiest first.
    pub async fn low_stock_products(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<Vec<Product>> {
        authorize(ctx, actor, Operation::ViewReports)?;

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE tenant_id = ?1
              AND is_active = 1
              AND quantity <= low_stock_threshold
            ORDER BY quantity ASC, name ASC
            "#,
        )
        .bind(ctx.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Shelf value of active stock at current prices.
    pub async fn stock_value(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<Money> {
        authorize(ctx, actor, Operation::ViewReports)?;

        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity * price_cents), 0) FROM products WHERE tenant_id = ?1 AND is_active = 1",
        )
        .bind(ctx.tenant_id())
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }

    /// Deposits owed back to customers, per returnable product with
    /// containers outstanding. Includes deactivated products: the
    /// containers are still out there.
    pub async fn deposit_liability(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<Vec<DepositLiability>> {
        authorize(ctx, actor, Operation::ViewReports)?;

        let rows = sqlx::query_as::<_, DepositLiability>(
            r#"
            SELECT
                id                                   AS product_id,
                name                                 AS name,
                bottles_outstanding                  AS bottles_outstanding,
                deposit_cents                        AS deposit_cents,
                bottles_outstanding * deposit_cents  AS liability_cents
            FROM products
            WHERE tenant_id = ?1
              AND is_returnable = 1
              AND bottles_outstanding > 0
            ORDER BY name
            "#,
        )
        .bind(ctx.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sum of [`deposit_liability`](Self::deposit_liability).
    pub async fn total_deposit_liability(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<Money> {
        Ok(self
            .deposit_liability(ctx, actor)
            .await?
            .iter()
            .map(|row| Money::from_cents(row.liability_cents))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use chrono::Duration;
    use stockledger_core::{CoreError, NewProduct, PaymentMethod, Role, SaleLine};

    async fn setup() -> (Database, TenantContext, Actor) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = db.tenants().create("Corner Shop").await.unwrap();
        let ctx = TenantContext::new(&tenant.id);
        let manager = Actor::new("m-1", Role::Manager, &tenant.id);
        (db, ctx, manager)
    }

    fn today_window() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::hours(1), now + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_sales_summary_and_top_products() {
        let (db, ctx, manager) = setup().await;
        let lager = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Lager", 800).quantity(100).returnable(200))
            .await
            .unwrap();
        let bread = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Bread", 300).quantity(20))
            .await
            .unwrap();

        db.ledger()
            .checkout(
                &ctx,
                &manager,
                &[SaleLine::new(&lager.id, 5), SaleLine::new(&bread.id, 2)],
                PaymentMethod::Cash,
            )
            .await
            .unwrap();
        db.ledger().record_sale(&ctx, &manager, &bread.id, 1).await.unwrap();
        // Not a sale: must not count.
        db.ledger().record_restock(&ctx, &manager, &bread.id, 10).await.unwrap();

        let (from, to) = today_window();
        let summary = db.reports().sales_summary(&ctx, &manager, from, to).await.unwrap();
        assert_eq!(summary.revenue_cents, 5 * 800 + 3 * 300);
        assert_eq!(summary.deposit_cents, 5 * 200);
        assert_eq!(summary.units_sold, 8);
        assert_eq!(summary.transaction_count, 3);

        let total = db.reports().sales_total(&ctx, &manager, from, to).await.unwrap();
        assert_eq!(total.cents(), 4900);

        let top = db.reports().top_products(&ctx, &manager, from, to, 5).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Lager");
        assert_eq!(top[0].units_sold, 5);
        assert_eq!(top[1].units_sold, 3);

        let earlier = db
            .reports()
            .sales_summary(&ctx, &manager, from - Duration::days(2), from - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(earlier, SalesSummary::default());
    }

    #[tokio::test]
    async fn test_stock_reports() {
        let (db, ctx, manager) = setup().await;
        let lager = db
            .products()
            .create(&ctx, &manager, NewProduct::new("Lager", 800).quantity(100).returnable(200))
            .await
            .unwrap();
        db.products()
            .create(&ctx, &manager, NewProduct::new("Bread", 300).quantity(4))
            .await
            .unwrap();

        db.ledger().record_sale(&ctx, &manager, &lager.id, 5).await.unwrap();

        let snapshot = db.reports().product_snapshot(&ctx, &manager).await.unwrap();
        let names: Vec<&str> = snapshot.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Bread", "Lager"]);
        assert!(snapshot[0].is_low_stock);
        assert_eq!(snapshot[1].quantity, 95);

        let low = db.reports().low_stock_products(&ctx, &manager).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Bread");

        let value = db.reports().stock_value(&ctx, &manager).await.unwrap();
        assert_eq!(value.cents(), 95 * 800 + 4 * 300);

        let liability = db.reports().deposit_liability(&ctx, &manager).await.unwrap();
        assert_eq!(liability.len(), 1);
        assert_eq!(liability[0].bottles_outstanding, 5);
        assert_eq!(liability[0].liability_cents, 1000);
        assert_eq!(
            db.reports().total_deposit_liability(&ctx, &manager).await.unwrap().cents(),
            1000
        );
    }

    #[tokio::test]
    async fn test_reports_are_manager_only() {
        let (db, ctx, _) = setup().await;
        let cashier = Actor::new("c-1", Role::Cashier, ctx.tenant_id());

        let err = db.reports().deposit_liability(&ctx, &cashier).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Forbidden { .. })));
    }
}
