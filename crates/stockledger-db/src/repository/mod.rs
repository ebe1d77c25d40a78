//! # Repository Module
//!
//! Tenant-scoped data access.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                                 │
//! │       │  db.products().list(&ctx, &actor, &filter)                      │
//! │       ▼                                                                 │
//! │  ProductRepository                                                      │
//! │  ├── authorize(ctx, actor, op)    ← before any SQL                      │
//! │  ├── WHERE tenant_id = ctx        ← every query                         │
//! │  └── ensure_owns(...)             ← every row fetched by id             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories never change `quantity` or `bottles_outstanding`; only the
//! [`Ledger`](crate::ledger::Ledger) does, through the crate-private
//! helpers in [`product`] and [`transaction`].
//!
//! ## Available Repositories
//!
//! - [`TenantRepository`](tenant::TenantRepository) - Tenant bootstrap
//! - [`CategoryRepository`](category::CategoryRepository) - Category CRUD
//! - [`ProductRepository`](product::ProductRepository) - Product catalog
//! - [`TransactionRepository`](transaction::TransactionRepository) - Ledger history
//! - [`SaleRepository`](sale::SaleRepository) - Sale headers and items

pub mod category;
pub mod product;
pub mod sale;
pub mod tenant;
pub mod transaction;
