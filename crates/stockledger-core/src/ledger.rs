//! # Ledger Rules
//!
//! One state transition per transaction type: given the locked, current
//! product row and a requested quantity, decide whether the entry is legal
//! and what it does.
//!
//! ## Transitions
//! ```text
//! ┌───────────────────┬──────────────┬──────────────────┬───────────────────┬─────────────────┐
//! │ Type              │ Δ quantity   │ Δ outstanding    │ amount            │ deposit_amount  │
//! ├───────────────────┼──────────────┼──────────────────┼───────────────────┼─────────────────┤
//! │ sale              │ -q           │ +q if returnable │ q × price         │ q × deposit     │
//! │ restock           │ +q           │ 0                │ 0                 │ 0               │
//! │ deposit_refund    │ 0            │ -q               │ -(q × deposit)    │ q × deposit     │
//! │ deposit_collected │ 0            │ 0                │ 0                 │ q × deposit     │
//! └───────────────────┴──────────────┴──────────────────┴───────────────────┴─────────────────┘
//! ```
//!
//! Preconditions:
//! - every type: `1 <= q <= MAX_LINE_QUANTITY`, product active
//! - sale: `quantity >= q`
//! - deposit_refund: returnable and `bottles_outstanding >= q`
//! - deposit_collected: returnable
//!
//! The storage crate calls [`plan_effect`] on the row it has just locked and
//! writes the resulting deltas in the same transaction. Nothing here reads a
//! cached product.

use serde::{Deserialize, Serialize};

use crate::auth::Operation;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Product, SaleLine, TransactionType};
use crate::MAX_LINE_QUANTITY;

/// What a single ledger entry does to its product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEffect {
    pub transaction_type: TransactionType,
    pub quantity: i64,
    /// Change to `product.quantity`.
    pub quantity_delta: i64,
    /// Change to `product.bottles_outstanding`.
    pub bottles_delta: i64,
    pub amount: Money,
    pub deposit_amount: Money,
}

impl StockEffect {
    /// What the customer pays for a sale line: goods plus container deposit.
    pub fn sale_subtotal(&self) -> Money {
        self.amount + self.deposit_amount
    }

    pub fn touches_stock(&self) -> bool {
        self.quantity_delta != 0 || self.bottles_delta != 0
    }
}

/// Rejects quantities outside `1..=MAX_LINE_QUANTITY`.
pub fn check_quantity(quantity: i64) -> CoreResult<()> {
    if quantity <= 0 || quantity > MAX_LINE_QUANTITY {
        return Err(CoreError::InvalidQuantity {
            quantity,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Guards catalog edits against erasing deposit liability.
///
/// A product may only stop being returnable once every container has come
/// back through `deposit_refund`.
pub fn check_returnable_change(before: &Product, after: &Product) -> CoreResult<()> {
    if before.is_returnable && !after.is_returnable && before.bottles_outstanding > 0 {
        return Err(CoreError::ContainersOutstanding {
            product_id: before.id.clone(),
            name: before.name.clone(),
            outstanding: before.bottles_outstanding,
        });
    }
    Ok(())
}

/// The policy operation each transaction type requires.
pub const fn required_operation(kind: TransactionType) -> Operation {
    match kind {
        TransactionType::Sale => Operation::RecordSale,
        TransactionType::Restock => Operation::RecordRestock,
        TransactionType::DepositRefund => Operation::RecordDepositRefund,
        TransactionType::DepositCollected => Operation::RecordDepositCollected,
    }
}

fn line_money(unit: Money, quantity: i64) -> CoreResult<Money> {
    unit.checked_multiply_quantity(quantity).ok_or_else(|| {
        ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: i64::MIN,
            max: i64::MAX,
        }
        .into()
    })
}

/// Decides whether `kind` of `quantity` is legal against `product` and
/// computes its effect.
///
/// `product` must be the freshly locked row; the result is only valid for
/// as long as that lock is held.
pub fn plan_effect(kind: TransactionType, product: &Product, quantity: i64) -> CoreResult<StockEffect> {
    check_quantity(quantity)?;

    if !product.is_active {
        return Err(CoreError::ProductInactive(product.id.clone()));
    }

    let not_returnable = || CoreError::NotReturnable {
        product_id: product.id.clone(),
        name: product.name.clone(),
    };

    let effect = match kind {
        TransactionType::Sale => {
            if product.quantity < quantity {
                return Err(CoreError::InsufficientStock {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    available: product.quantity,
                    requested: quantity,
                });
            }
            StockEffect {
                transaction_type: kind,
                quantity,
                quantity_delta: -quantity,
                bottles_delta: if product.is_returnable { quantity } else { 0 },
                amount: line_money(product.price(), quantity)?,
                deposit_amount: line_money(product.deposit(), quantity)?,
            }
        }

        TransactionType::Restock => {
            if product.quantity.checked_add(quantity).is_none() {
                return Err(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into());
            }
            StockEffect {
                transaction_type: kind,
                quantity,
                quantity_delta: quantity,
                bottles_delta: 0,
                amount: Money::zero(),
                deposit_amount: Money::zero(),
            }
        }

        TransactionType::DepositRefund => {
            if !product.is_returnable {
                return Err(not_returnable());
            }
            if product.bottles_outstanding < quantity {
                return Err(CoreError::ExceedsOutstanding {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    outstanding: product.bottles_outstanding,
                    requested: quantity,
                });
            }
            let refund = line_money(product.deposit(), quantity)?;
            StockEffect {
                transaction_type: kind,
                quantity,
                quantity_delta: 0,
                bottles_delta: -quantity,
                amount: -refund,
                deposit_amount: refund,
            }
        }

        // Outstanding count is left alone; only the sale path issues containers.
        TransactionType::DepositCollected => {
            if !product.is_returnable {
                return Err(not_returnable());
            }
            StockEffect {
                transaction_type: kind,
                quantity,
                quantity_delta: 0,
                bottles_delta: 0,
                amount: Money::zero(),
                deposit_amount: line_money(product.deposit(), quantity)?,
            }
        }
    };

    Ok(effect)
}

/// Distinct product ids of a checkout in the order their rows must be
/// locked: ascending id, so two checkouts sharing products never wait on
/// each other in a cycle.
pub fn lock_order(lines: &[SaleLine]) -> Vec<&str> {
    let mut ids: Vec<&str> = lines.iter().map(|l| l.product_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

// =============================================================================
// Unit Tests
// =============================================================================
