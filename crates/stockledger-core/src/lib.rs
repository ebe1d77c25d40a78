//! # stockledger-core: Pure Business Logic for the Stock Ledger
//!
//! This crate holds every rule of the ledger that can be expressed without
//! touching storage: what a sale does to a product, who may restock, how a
//! deposit refund is priced. The storage crate (`stockledger-db`) applies
//! these rules under row locks.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Stock Ledger Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            External API / HTML / admin (not in workspace)       │   │
//! │  │   resolves tenant + authenticated role, renders results         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ TenantContext + Actor                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockledger-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │   │
//! │  │   │  types   │  │  money   │  │   auth   │  │    ledger    │   │   │
//! │  │   │ Product  │  │  Money   │  │  Role    │  │ StockEffect  │   │   │
//! │  │   │ Sale     │  │          │  │  Actor   │  │ plan_effect  │   │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                stockledger-db (Storage + Engine)                │   │
//! │  │      SQLite, row locks, repositories, checkout, reporting       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Tenant, Category, Product, StockTransaction, Sale)
//! - [`money`] - Money type with integer arithmetic
//! - [`tenant`] - Explicit tenant context passed into every call
//! - [`auth`] - Closed role set and the permission table
//! - [`ledger`] - Stock transition rules per transaction type
//! - [`validation`] - Input validation for catalog writes
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use stockledger_core::ledger::plan_effect;
//! use stockledger_core::{NewProduct, Product, TransactionType};
//!
//! let new = NewProduct::new("Lager 50cl", 500).quantity(10);
//! let product = Product::from_new("p-1", "t-1", "LAGER-50", new, Utc::now());
//! let effect = plan_effect(TransactionType::Sale, &product, 3).unwrap();
//! assert_eq!(effect.amount.cents(), 1500);
//! assert_eq!(effect.quantity_delta, -3);
//! ```

pub mod auth;
pub mod error;
pub mod ledger;
pub mod money;
pub mod tenant;
pub mod types;
pub mod validation;

pub use auth::{authorize, Actor, Operation, Role};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use tenant::TenantContext;
pub use types::*;

/// Largest quantity accepted on a single ledger line.
///
/// Keeps `quantity * price` comfortably inside `i64` cents.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Default low-stock threshold for new products.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Length of auto-generated SKUs (and the SKU column limit).
pub const SKU_MAX_LEN: usize = 20;
