//! # Sale Repository
//!
//! Sale headers and their items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Ledger::checkout (one database transaction)                            │
//! │     ├── insert_header()  → Sale { total: 0 }                            │
//! │     ├── insert_item()    → SaleItem  ┐                                  │
//! │     ├── insert_item()    → SaleItem  ├ each with its `sale` ledger row  │
//! │     └── set_total()      → Sale { total: Σ subtotals }                  │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Afterwards: read-only (get, list). Sales are never edited.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use stockledger_core::{authorize, Actor, CoreError, Operation, Sale, SaleItem, SaleReceipt, TenantContext};

/// Repository for reading sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

pub(crate) async fn insert_header(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (id, tenant_id, created_by, timestamp, total_cents, payment_method)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.tenant_id)
    .bind(&sale.created_by)
    .bind(sale.timestamp)
    .bind(sale.total_cents)
    .bind(sale.payment_method)
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    debug!(sale_id = %item.sale_id, product_id = %item.product_id, "Adding sale item");

    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, quantity,
            unit_price_cents, deposit_cents, subtotal_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.deposit_cents)
    .bind(item.subtotal_cents)
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn set_total(conn: &mut SqliteConnection, sale_id: &str, total_cents: i64) -> DbResult<()> {
    sqlx::query("UPDATE sales SET total_cents = ?2 WHERE id = ?1")
        .bind(sale_id)
        .bind(total_cents)
        .execute(conn)
        .await?;

    Ok(())
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// A sale with its items in line order.
    pub async fn get(&self, ctx: &TenantContext, actor: &Actor, id: &str) -> DbResult<SaleReceipt> {
        authorize(ctx, actor, Operation::ViewLedger)?;
        debug!(id = %id, "Getting sale");

        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;

        ctx.ensure_owns("Sale", &sale.id, &sale.tenant_id)?;

        let items = sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY rowid")
            .bind(&sale.id)
            .fetch_all(&self.pool)
            .await?;

        Ok(SaleReceipt { sale, items })
    }

    /// Most recent sales first.
    pub async fn list(&self, ctx: &TenantContext, actor: &Actor, limit: u32) -> DbResult<Vec<Sale>> {
        authorize(ctx, actor, Operation::ViewLedger)?;

        let sales = sqlx::query_as::<_, Sale>(
            "SELECT * FROM sales WHERE tenant_id = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
        )
        .bind(ctx.tenant_id())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Number of sales the tenant has.
    pub async fn count(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<i64> {
        authorize(ctx, actor, Operation::ViewLedger)?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE tenant_id = ?1")
            .bind(ctx.tenant_id())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
