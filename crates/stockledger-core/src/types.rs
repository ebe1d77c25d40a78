//! # Domain Types
//!
//! Entities of the stock ledger and the input/filter types used to create
//! and query them.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────┐   ┌────────────────────┐   ┌─────────────────┐      │
//! │  │    Tenant     │◄──│      Product       │◄──│ StockTransaction│      │
//! │  │  ───────────  │   │  ────────────────  │   │  ─────────────  │      │
//! │  │  id, name     │   │  quantity ≥ 0      │   │  sale | restock │      │
//! │  └───────▲───────┘   │  price_cents > 0   │   │  deposit_refund │      │
//! │          │           │  deposit_cents     │   │  deposit_coll.  │      │
//! │  ┌───────┴───────┐   │  bottles_outst. ≥0 │   │  amount_cents   │      │
//! │  │   Category    │◄┄┄│  category (weak)   │   └─────────────────┘      │
//! │  └───────────────┘   └─────────▲──────────┘                            │
//! │                                │ weak                                   │
//! │                      ┌─────────┴──────────┐   ┌─────────────────┐      │
//! │                      │     SaleItem       │──►│      Sale       │      │
//! │                      │  price snapshot    │   │  total_cents    │      │
//! │                      └────────────────────┘   └─────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity carries `tenant_id` (directly or via its Sale); no query in
//! the storage crate reads a row without filtering on it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::DEFAULT_LOW_STOCK_THRESHOLD;

// =============================================================================
// Tenant
// =============================================================================

/// An isolated company sharing the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Category
// =============================================================================

/// A product category. `(tenant_id, name)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
///
/// `quantity` and `bottles_outstanding` are only ever changed by the ledger
/// engine; catalog updates cannot touch them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Weak reference; nulled when the category is deleted.
    pub category_id: Option<String>,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub description: Option<String>,

    /// Stock Keeping Unit, unique per tenant.
    pub sku: String,

    /// Units on hand. Never negative.
    pub quantity: i64,

    /// Unit price in minor units. Always positive.
    pub price_cents: i64,

    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,

    /// At or below this quantity the product counts as low stock.
    pub low_stock_threshold: i64,

    /// Whether the product is sold in a refundable container.
    pub is_returnable: bool,

    /// Per-unit container deposit. Zero unless `is_returnable`.
    pub deposit_cents: i64,

    /// Containers sold and not yet returned. Never negative.
    pub bottles_outstanding: i64,

    /// Soft-delete flag; inactive products accept no ledger entries.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl Product {
    /// Builds a product row from creation input.
    ///
    /// The caller supplies the id, the resolved SKU and the clock so this
    /// stays free of I/O.
    pub fn from_new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        sku: impl Into<String>,
        new: NewProduct,
        now: DateTime<Utc>,
    ) -> Self {
        Product {
            id: id.into(),
            tenant_id: tenant_id.into(),
            category_id: new.category_id,
            name: new.name.trim().to_string(),
            description: new.description,
            sku: sku.into(),
            quantity: new.quantity,
            price_cents: new.price_cents,
            expiry_date: new.expiry_date,
            low_stock_threshold: new.low_stock_threshold,
            is_returnable: new.is_returnable,
            deposit_cents: new.deposit_cents,
            bottles_outstanding: 0,
            is_active: true,
            created_at: now,
            last_updated: now,
        }
    }

    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Per-unit deposit; zero for non-returnable products.
    #[inline]
    pub fn deposit(&self) -> Money {
        if self.is_returnable {
            Money::from_cents(self.deposit_cents)
        } else {
            Money::zero()
        }
    }

    /// Shelf price including the container deposit.
    #[inline]
    pub fn total_price(&self) -> Money {
        self.price() + self.deposit()
    }

    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }

    /// Whether the expiry date lies strictly before `today`.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date.map(|d| d < today).unwrap_or(false)
    }

    /// Whether `quantity` units can be taken from stock right now.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.quantity >= quantity
    }

    /// Current state as a report row.
    pub fn snapshot(&self, today: NaiveDate) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id.clone(),
            name: self.name.clone(),
            sku: self.sku.clone(),
            category_id: self.category_id.clone(),
            quantity: self.quantity,
            price_cents: self.price_cents,
            total_price_cents: self.total_price().cents(),
            bottles_outstanding: self.bottles_outstanding,
            is_low_stock: self.is_low_stock(),
            is_expired: self.is_expired_on(today),
        }
    }
}

/// Input for creating a product.
///
/// ```rust
/// use stockledger_core::NewProduct;
///
/// let crate_of_lager = NewProduct::new("Lager 50cl", 500)
///     .quantity(100)
///     .returnable(200);
/// assert!(crate_of_lager.is_returnable);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    /// Generated when absent.
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    pub price_cents: i64,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub is_returnable: bool,
    #[serde(default)]
    pub deposit_cents: i64,
}

fn default_low_stock_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price_cents: i64) -> Self {
        NewProduct {
            name: name.into(),
            description: None,
            category_id: None,
            sku: None,
            quantity: 0,
            price_cents,
            expiry_date: None,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            is_returnable: false,
            deposit_cents: 0,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Opening stock level.
    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn expires_on(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }

    pub fn low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    /// Marks the product returnable with the given per-unit deposit.
    pub fn returnable(mut self, deposit_cents: i64) -> Self {
        self.is_returnable = true;
        self.deposit_cents = deposit_cents;
        self
    }
}

/// Partial update of a product's descriptive fields.
///
/// Stock levels are deliberately absent: they move only through the ledger.
/// Nested `Option`s distinguish "leave unchanged" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<String>>,
    pub sku: Option<String>,
    pub price_cents: Option<i64>,
    pub expiry_date: Option<Option<NaiveDate>>,
    pub low_stock_threshold: Option<i64>,
    pub is_returnable: Option<bool>,
    pub deposit_cents: Option<i64>,
}

impl ProductUpdate {
    /// Applies the set fields to `product`.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(category_id) = &self.category_id {
            product.category_id = category_id.clone();
        }
        if let Some(sku) = &self.sku {
            product.sku = sku.trim().to_string();
        }
        if let Some(price) = self.price_cents {
            product.price_cents = price;
        }
        if let Some(expiry) = self.expiry_date {
            product.expiry_date = expiry;
        }
        if let Some(threshold) = self.low_stock_threshold {
            product.low_stock_threshold = threshold;
        }
        if let Some(returnable) = self.is_returnable {
            product.is_returnable = returnable;
            if !returnable && self.deposit_cents.is_none() {
                product.deposit_cents = 0;
            }
        }
        if let Some(deposit) = self.deposit_cents {
            product.deposit_cents = deposit;
        }
    }
}

/// Sort key for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Name,
    Quantity,
    Price,
    Category,
}

/// Product listing filter with pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<String>,
    pub low_stock_only: bool,
    pub include_inactive: bool,
    pub sort: ProductSort,
    pub descending: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for ProductFilter {
    fn default() -> Self {
        ProductFilter {
            category_id: None,
            low_stock_only: false,
            include_inactive: false,
            sort: ProductSort::Name,
            descending: false,
            limit: 10,
            offset: 0,
        }
    }
}

// =============================================================================
// Stock Transaction
// =============================================================================

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Units leave stock; returnable containers go out.
    Sale,
    /// Units enter stock.
    Restock,
    /// Empty containers come back; the deposit is paid out.
    DepositRefund,
    /// Deposit taken without a stock movement.
    DepositCollected,
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Restock => "restock",
            TransactionType::DepositRefund => "deposit_refund",
            TransactionType::DepositCollected => "deposit_collected",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger entry.
///
/// `amount_cents` and `deposit_cents` are frozen from the product's price and
/// deposit at the moment of creation; later price changes do not touch them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransaction {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    /// Set when the entry was written as part of a checkout.
    pub sale_id: Option<String>,
    pub quantity: i64,
    pub transaction_type: TransactionType,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub created_by: Option<String>,
    pub notes: Option<String>,
    pub amount_cents: i64,
    pub deposit_cents: i64,
}

impl StockTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn deposit(&self) -> Money {
        Money::from_cents(self.deposit_cents)
    }
}

/// History filter for ledger reads. Results are newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub product_id: Option<String>,
    pub limit: u32,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        TransactionFilter {
            transaction_type: None,
            product_id: None,
            limit: 50,
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
}

// =============================================================================
// Sale
// =============================================================================

/// One requested checkout line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

impl SaleLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Header of a multi-product checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    /// Always equals the sum of the items' `subtotal_cents`.
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line of a sale, snapshotting price and deposit at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Unit deposit at time of sale (frozen); zero for non-returnables.
    pub deposit_cents: i64,
    /// quantity × (unit price + unit deposit).
    pub subtotal_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// A sale with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Reporting Rows
// =============================================================================

/// Aggregate of `sale` entries in a time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesSummary {
    pub revenue_cents: i64,
    pub deposit_cents: i64,
    pub units_sold: i64,
    pub transaction_count: i64,
}

/// A product ranked by units sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub units_sold: i64,
    pub revenue_cents: i64,
}

/// Point-in-time view of a product for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub category_id: Option<String>,
    pub quantity: i64,
    pub price_cents: i64,
    pub total_price_cents: i64,
    pub bottles_outstanding: i64,
    pub is_low_stock: bool,
    pub is_expired: bool,
}

/// Outstanding container liability for one returnable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DepositLiability {
    pub product_id: String,
    pub name: String,
    pub bottles_outstanding: i64,
    pub deposit_cents: i64,
    pub liability_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
