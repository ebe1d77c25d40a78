//! # Transaction Repository
//!
//! The append-only ledger. Rows are written by the ledger engine inside
//! its locked transaction and never updated or deleted afterwards.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockledger_core::{authorize, Actor, Operation, StockTransaction, TenantContext, TransactionFilter};

/// Repository for reading ledger history.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

/// Appends a ledger row.
pub(crate) async fn insert(conn: &mut SqliteConnection, txn: &StockTransaction) -> DbResult<()> {
    debug!(id = %txn.id, kind = %txn.transaction_type, product_id = %txn.product_id, "Inserting transaction");

    sqlx::query(
        r#"
        INSERT INTO stock_transactions (
            id, tenant_id, product_id, sale_id,
            quantity, transaction_type, timestamp,
            created_by, notes, amount_cents, deposit_cents
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7,
            ?8, ?9, ?10, ?11
        )
        "#,
    )
    .bind(&txn.id)
    .bind(&txn.tenant_id)
    .bind(&txn.product_id)
    .bind(&txn.sale_id)
    .bind(txn.quantity)
    .bind(txn.transaction_type)
    .bind(txn.timestamp)
    .bind(&txn.created_by)
    .bind(&txn.notes)
    .bind(txn.amount_cents)
    .bind(txn.deposit_cents)
    .execute(conn)
    .await?;

    Ok(())
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    pub async fn get(&self, ctx: &TenantContext, actor: &Actor, id: &str) -> DbResult<StockTransaction> {
        authorize(ctx, actor, Operation::ViewLedger)?;

        let txn = sqlx::query_as::<_, StockTransaction>("SELECT * FROM stock_transactions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", id))?;

        ctx.ensure_owns("Transaction", &txn.id, &txn.tenant_id)?;
        Ok(txn)
    }

    /// Ledger history, newest first.
    pub async fn list(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        filter: &TransactionFilter,
    ) -> DbResult<Vec<StockTransaction>> {
        authorize(ctx, actor, Operation::ViewLedger)?;
        debug!(?filter, "Listing transactions");

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM stock_transactions WHERE tenant_id = ");
        query.push_bind(ctx.tenant_id().to_string());

        if let Some(kind) = filter.transaction_type {
            query.push(" AND transaction_type = ").push_bind(kind);
        }
        if let Some(product_id) = &filter.product_id {
            query.push(" AND product_id = ").push_bind(product_id.clone());
        }

        // rowid breaks ties between entries committed in the same instant
        query.push(" ORDER BY timestamp DESC, rowid DESC LIMIT ");
        query.push_bind(i64::from(filter.limit));

        let txns = query.build_query_as::<StockTransaction>().fetch_all(&self.pool).await?;
        Ok(txns)
    }

    /// The ledger rows written by one checkout, in line order.
    pub async fn list_for_sale(&self, ctx: &TenantContext, actor: &Actor, sale_id: &str) -> DbResult<Vec<StockTransaction>> {
        authorize(ctx, actor, Operation::ViewLedger)?;

        let txns = sqlx::query_as::<_, StockTransaction>(
            "SELECT * FROM stock_transactions WHERE tenant_id = ?1 AND sale_id = ?2 ORDER BY rowid",
        )
        .bind(ctx.tenant_id())
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txns)
    }

    /// Number of ledger rows for the tenant.
    pub async fn count(&self, ctx: &TenantContext, actor: &Actor) -> DbResult<i64> {
        authorize(ctx, actor, Operation::ViewLedger)?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_transactions WHERE tenant_id = ?1")
            .bind(ctx.tenant_id())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
