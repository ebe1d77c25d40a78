//! # Ledger Engine
//!
//! The single writer of stock and deposit state. Every entry point:
//!
//! ```text
//! authorize(ctx, actor, op)        ← no storage touched on Forbidden
//!      │
//!      ▼
//! BEGIN
//!   lock_owned(product)            ← write lock, current row, tenant check
//!   plan_effect(kind, row, qty)    ← stockledger-core rules
//!   apply_stock_delta(...)         ← guarded UPDATE
//!   INSERT stock_transactions
//! COMMIT                           ← or ROLLBACK on any error
//! ```
//!
//! A failed call leaves no trace: no product change, no ledger row.
//! Multi-product sales go through [`Ledger::checkout`].

mod checkout;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{product, transaction};
use stockledger_core::ledger::{check_quantity, plan_effect, required_operation};
use stockledger_core::{authorize, Actor, CoreError, Product, StockTransaction, TenantContext, TransactionType};

/// A single-product ledger entry to record.
///
/// ```rust,ignore
/// let entry = ledger
///     .record(&ctx, &manager, LedgerRequest::restock(&product_id, 24).notes("delivery #118"))
///     .await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRequest {
    pub kind: TransactionType,
    pub product_id: String,
    pub quantity: i64,
    pub notes: Option<String>,
}

impl LedgerRequest {
    pub fn new(kind: TransactionType, product_id: impl Into<String>, quantity: i64) -> Self {
        LedgerRequest {
            kind,
            product_id: product_id.into(),
            quantity,
            notes: None,
        }
    }

    pub fn sale(product_id: impl Into<String>, quantity: i64) -> Self {
        Self::new(TransactionType::Sale, product_id, quantity)
    }

    pub fn restock(product_id: impl Into<String>, quantity: i64) -> Self {
        Self::new(TransactionType::Restock, product_id, quantity)
    }

    pub fn deposit_refund(product_id: impl Into<String>, quantity: i64) -> Self {
        Self::new(TransactionType::DepositRefund, product_id, quantity)
    }

    pub fn deposit_collected(product_id: impl Into<String>, quantity: i64) -> Self {
        Self::new(TransactionType::DepositCollected, product_id, quantity)
    }

    /// Free-text note stored on the ledger row. Blank notes are dropped.
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = if notes.trim().is_empty() { None } else { Some(notes) };
        self
    }
}

/// A committed ledger entry together with the product as it stands after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction: StockTransaction,
    pub product: Product,
}

/// The ledger engine.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Ledger { pool }
    }

    /// Sells `quantity` units of one product.
    pub async fn record_sale(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<LedgerEntry> {
        self.record(ctx, actor, LedgerRequest::sale(product_id, quantity)).await
    }

    /// Adds `quantity` units to stock.
    pub async fn record_restock(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<LedgerEntry> {
        self.record(ctx, actor, LedgerRequest::restock(product_id, quantity)).await
    }

    /// Takes back `quantity` empty containers and pays out their deposit.
    pub async fn record_deposit_refund(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<LedgerEntry> {
        self.record(ctx, actor, LedgerRequest::deposit_refund(product_id, quantity)).await
    }

    /// Records a deposit taken without moving stock.
    pub async fn record_deposit_collected(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<LedgerEntry> {
        self.record(ctx, actor, LedgerRequest::deposit_collected(product_id, quantity)).await
    }

    /// Records one entry atomically.
    pub async fn record(&self, ctx: &TenantContext, actor: &Actor, request: LedgerRequest) -> DbResult<LedgerEntry> {
        let op = required_operation(request.kind);
        if let Err(e) = authorize(ctx, actor, op) {
            warn!(actor = %actor.id, operation = %op, tenant_id = %ctx.tenant_id(), "Ledger operation forbidden");
            return Err(e.into());
        }
        check_quantity(request.quantity)?;

        let mut tx = self.pool.begin().await?;

        match record_locked(&mut *tx, ctx, actor, &request).await {
            Ok(entry) => {
                tx.commit().await?;
                info!(
                    tenant_id = %ctx.tenant_id(),
                    transaction_id = %entry.transaction.id,
                    kind = %entry.transaction.transaction_type,
                    product_id = %entry.product.id,
                    quantity = entry.transaction.quantity,
                    stock = entry.product.quantity,
                    outstanding = entry.product.bottles_outstanding,
                    "Ledger entry committed"
                );
                Ok(entry)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                log_rejection(request.kind.as_str(), &request.product_id, &e);
                Err(e)
            }
        }
    }
}

async fn record_locked(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    actor: &Actor,
    request: &LedgerRequest,
) -> DbResult<LedgerEntry> {
    let locked = product::lock_owned(conn, ctx, &request.product_id).await?;
    let effect = plan_effect(request.kind, &locked, request.quantity)?;
    let now = Utc::now();

    let product = if effect.touches_stock() {
        product::apply_stock_delta(conn, ctx, &locked.id, effect.quantity_delta, effect.bottles_delta, now).await?
    } else {
        locked
    };

    let txn = StockTransaction {
        id: Uuid::new_v4().to_string(),
        tenant_id: ctx.tenant_id().to_string(),
        product_id: product.id.clone(),
        sale_id: None,
        quantity: effect.quantity,
        transaction_type: effect.transaction_type,
        timestamp: now,
        created_by: Some(actor.id.clone()),
        notes: request.notes.clone(),
        amount_cents: effect.amount.cents(),
        deposit_cents: effect.deposit_amount.cents(),
    };
    transaction::insert(conn, &txn).await?;

    Ok(LedgerEntry {
        transaction: txn,
        product,
    })
}

/// Rejections are expected traffic; storage faults are not.
fn log_rejection(operation: &str, subject: &str, err: &DbError) {
    match err {
        DbError::Domain(e) => match e.root() {
            CoreError::InsufficientStock { .. }
            | CoreError::ExceedsOutstanding { .. }
            | CoreError::TenantMismatch { .. } => {
                warn!(operation, subject, error = %e, "Ledger operation rejected")
            }
            _ => info!(operation, subject, error = %e, "Ledger operation rejected"),
        },
        DbError::Contention(_) | DbError::PoolExhausted => {
            warn!(operation, subject, error = %err, "Ledger operation hit contention")
        }
        other => warn!(operation, subject, error = %other, "Ledger operation failed"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use stockledger_core::{NewProduct, Role, TransactionFilter};

    struct Fixture {
        db: Database,
        ctx: TenantContext,
        manager: Actor,
        cashier: Actor,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = db.tenants().create("Corner Shop").await.unwrap();
        Fixture {
            ctx: TenantContext::new(&tenant.id),
            manager: Actor::new("m-1", Role::Manager, &tenant.id),
            cashier: Actor::new("c-1", Role::Cashier, &tenant.id),
            db,
        }
    }

    async fn product(f: &Fixture, new: NewProduct) -> Product {
        f.db.products().create(&f.ctx, &f.manager, new).await.unwrap()
    }

    #[tokio::test]
    async fn test_sale_updates_stock_and_writes_row() {
        let f = fixture().await;
        let bread = product(&f, NewProduct::new("Bread", 300).quantity(10)).await;

        let entry = f.db.ledger().record_sale(&f.ctx, &f.cashier, &bread.id, 4).await.unwrap();

        assert_eq!(entry.product.quantity, 6);
        assert_eq!(entry.transaction.amount_cents, 1200);
        assert_eq!(entry.transaction.deposit_cents, 0);
        assert_eq!(entry.transaction.created_by.as_deref(), Some("c-1"));

        let stored = f.db.products().get(&f.ctx, &f.manager, &bread.id).await.unwrap();
        assert_eq!(stored.quantity, 6);

        let history = f
            .db
            .transactions()
            .list(&f.ctx, &f.manager, &TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, entry.transaction.id);
    }

    #[tokio::test]
    async fn test_notes_are_stored() {
        let f = fixture().await;
        let bread = product(&f, NewProduct::new("Bread", 300)).await;

        let entry = f
            .db
            .ledger()
            .record(&f.ctx, &f.manager, LedgerRequest::restock(&bread.id, 12).notes("delivery #118"))
            .await
            .unwrap();

        let stored = f.db.transactions().get(&f.ctx, &f.manager, &entry.transaction.id).await.unwrap();
        assert_eq!(stored.notes.as_deref(), Some("delivery #118"));
        assert_eq!(stored.transaction_type, TransactionType::Restock);
        assert_eq!(LedgerRequest::restock("p", 1).notes("   ").notes, None);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_no_trace() {
        let f = fixture().await;
        let bread = product(&f, NewProduct::new("Bread", 300).quantity(2)).await;

        let err = f.db.ledger().record_sale(&f.ctx, &f.cashier, &bread.id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 2, requested: 3, .. })
        ));

        let stored = f.db.products().get(&f.ctx, &f.manager, &bread.id).await.unwrap();
        assert_eq!(stored.quantity, 2);
        assert_eq!(f.db.transactions().count(&f.ctx, &f.manager).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cashier_cannot_restock() {
        let f = fixture().await;
        let bread = product(&f, NewProduct::new("Bread", 300)).await;

        let err = f.db.ledger().record_restock(&f.ctx, &f.cashier, &bread.id, 5).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Forbidden { .. })));
        assert_eq!(f.db.transactions().count(&f.ctx, &f.manager).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_products() {
        let f = fixture().await;
        let err = f.db.ledger().record_restock(&f.ctx, &f.manager, "missing", 5).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));

        let bread = product(&f, NewProduct::new("Bread", 300)).await;
        f.db.products().deactivate(&f.ctx, &f.manager, &bread.id).await.unwrap();
        let err = f.db.ledger().record_restock(&f.ctx, &f.manager, &bread.id, 5).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductInactive(_))));
    }

    #[tokio::test]
    async fn test_deposit_collected_keeps_outstanding() {
        let f = fixture().await;
        let lager = product(&f, NewProduct::new("Lager", 800).quantity(10).returnable(200)).await;

        let entry = f
            .db
            .ledger()
            .record_deposit_collected(&f.ctx, &f.manager, &lager.id, 3)
            .await
            .unwrap();

        assert_eq!(entry.transaction.amount_cents, 0);
        assert_eq!(entry.transaction.deposit_cents, 600);
        assert_eq!(entry.product.bottles_outstanding, 0);
        assert_eq!(entry.product.quantity, 10);
    }
}
