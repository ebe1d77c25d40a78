//! Multi-product checkout: one Sale, its items, and one `sale` ledger row
//! per line, committed together or not at all.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::{log_rejection, Ledger};
use crate::error::{DbError, DbResult};
use crate::repository::{product, sale, transaction};
use stockledger_core::ledger::{check_quantity, lock_order, plan_effect};
use stockledger_core::{
    authorize, Actor, CoreError, Operation, PaymentMethod, Product, Sale, SaleItem, SaleLine,
    SaleReceipt, StockTransaction, TenantContext, TransactionType, ValidationError,
};

impl Ledger {
    /// Sells several lines as one atomic unit.
    ///
    /// ## Order of Work
    /// 1. Policy, non-empty, every quantity in range (no storage touched)
    /// 2. Lock each distinct product in ascending id order
    /// 3. Insert the Sale header
    /// 4. Lines in caller order: check against the running stock, update
    ///    the product, insert the SaleItem and its `sale` ledger row
    /// 5. Store the total and commit
    ///
    /// Any failure rolls everything back and is reported as
    /// `CheckoutLineFailed` naming the line and product.
    pub async fn checkout(
        &self,
        ctx: &TenantContext,
        actor: &Actor,
        lines: &[SaleLine],
        payment_method: PaymentMethod,
    ) -> DbResult<SaleReceipt> {
        if let Err(e) = authorize(ctx, actor, Operation::Checkout) {
            warn!(actor = %actor.id, tenant_id = %ctx.tenant_id(), "Checkout forbidden");
            return Err(e.into());
        }
        if lines.is_empty() {
            return Err(CoreError::EmptySale.into());
        }
        for (index, line) in lines.iter().enumerate() {
            check_quantity(line.quantity).map_err(|e| CoreError::line_failed(index, &line.product_id, e))?;
        }

        let mut tx = self.pool.begin().await?;

        match checkout_locked(&mut *tx, ctx, actor, lines, payment_method).await {
            Ok(receipt) => {
                tx.commit().await?;
                info!(
                    tenant_id = %ctx.tenant_id(),
                    sale_id = %receipt.sale.id,
                    lines = receipt.items.len(),
                    total = %receipt.sale.total(),
                    payment_method = ?receipt.sale.payment_method,
                    "Checkout committed"
                );
                Ok(receipt)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                log_rejection("checkout", &format!("{} lines", lines.len()), &e);
                Err(e)
            }
        }
    }
}

fn first_line_of(lines: &[SaleLine], product_id: &str) -> usize {
    lines
        .iter()
        .position(|l| l.product_id == product_id)
        .unwrap_or_default()
}

async fn checkout_locked(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    actor: &Actor,
    lines: &[SaleLine],
    payment_method: PaymentMethod,
) -> DbResult<SaleReceipt> {
    let mut locked: HashMap<String, Product> = HashMap::new();
    for product_id in lock_order(lines) {
        let product = match product::lock_owned(conn, ctx, product_id).await {
            Ok(p) => p,
            Err(DbError::Domain(e)) => {
                let index = first_line_of(lines, product_id);
                return Err(CoreError::line_failed(index, product_id, e).into());
            }
            Err(e) => return Err(e),
        };
        locked.insert(product_id.to_string(), product);
    }

    let now = Utc::now();
    let mut header = Sale {
        id: Uuid::new_v4().to_string(),
        tenant_id: ctx.tenant_id().to_string(),
        created_by: Some(actor.id.clone()),
        timestamp: now,
        total_cents: 0,
        payment_method,
    };
    sale::insert_header(conn, &header).await?;

    let mut total_cents: i64 = 0;
    let mut items = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let current = locked
            .get_mut(&line.product_id)
            .ok_or_else(|| DbError::Internal(format!("product {} was not locked", line.product_id)))?;

        // Checked against the running snapshot, so a product listed twice
        // sees the first line's decrement.
        let effect = plan_effect(TransactionType::Sale, current, line.quantity)
            .map_err(|e| CoreError::line_failed(index, &line.product_id, e))?;

        *current = product::apply_stock_delta(
            conn,
            ctx,
            &line.product_id,
            effect.quantity_delta,
            effect.bottles_delta,
            now,
        )
        .await?;

        let subtotal = effect.sale_subtotal().cents();
        total_cents = total_cents.checked_add(subtotal).ok_or_else(|| {
            CoreError::from(ValidationError::OutOfRange {
                field: "sale total".to_string(),
                min: 0,
                max: i64::MAX,
            })
        })?;

        let item = SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: header.id.clone(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price_cents: current.price_cents,
            deposit_cents: current.deposit().cents(),
            subtotal_cents: subtotal,
        };
        sale::insert_item(conn, &item).await?;

        let txn = StockTransaction {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id().to_string(),
            product_id: line.product_id.clone(),
            sale_id: Some(header.id.clone()),
            quantity: line.quantity,
            transaction_type: TransactionType::Sale,
            timestamp: now,
            created_by: Some(actor.id.clone()),
            notes: None,
            amount_cents: effect.amount.cents(),
            deposit_cents: effect.deposit_amount.cents(),
        };
        transaction::insert(conn, &txn).await?;

        items.push(item);
    }

    header.total_cents = total_cents;
    sale::set_total(conn, &header.id, total_cents).await?;

    Ok(SaleReceipt { sale: header, items })
}

// =============================================================================
// Unit Tests
// =============================================================================
