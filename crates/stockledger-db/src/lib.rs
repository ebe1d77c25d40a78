//! # stockledger-db: Storage and Ledger Engine
//!
//! SQLite persistence for the stock ledger, and the engine that performs
//! every stock and deposit mutation atomically.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stock Ledger Data Flow                           │
//! │                                                                         │
//! │  Web / till frontend (not in this workspace)                            │
//! │       │  builds TenantContext + Actor per request                       │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 stockledger-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │    Ledger     │    │  Reporting   │   │   │
//! │  │   │   (pool.rs)   │    │  (ledger/)    │    │ (read-only)  │   │   │
//! │  │   │               │    │ record_* /    │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ checkout      │    │ summaries,   │   │   │
//! │  │   │ busy_timeout  │    ├───────────────┤    │ liability    │   │   │
//! │  │   │ migrations    │◄───│ Repositories  │    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                              │                                  │   │
//! │  │                              ▼                                  │   │
//! │  │                   stockledger-core rules                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment-driven settings
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage error types
//! - [`repository`] - Tenant-scoped catalog and history access
//! - [`ledger`] - The ledger engine (single entries and checkout)
//! - [`reporting`] - Read-only aggregates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockledger_core::{Actor, NewProduct, PaymentMethod, Role, SaleLine, TenantContext};
//! use stockledger_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("ledger.db")).await?;
//! let tenant = db.tenants().create("Corner Shop").await?;
//! let ctx = TenantContext::new(&tenant.id);
//! let manager = Actor::new("u-1", Role::Manager, &tenant.id);
//!
//! let lager = db
//!     .products()
//!     .create(&ctx, &manager, NewProduct::new("Lager 50cl", 800).quantity(100).returnable(200))
//!     .await?;
//!
//! let receipt = db
//!     .ledger()
//!     .checkout(&ctx, &manager, &[SaleLine::new(&lager.id, 5)], PaymentMethod::Cash)
//!     .await?;
//! assert_eq!(receipt.sale.total_cents, 5000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod reporting;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, LedgerConfig};
pub use error::{DbError, DbResult};
pub use ledger::{Ledger, LedgerEntry, LedgerRequest};
pub use pool::{Database, DbConfig};
pub use reporting::ReportingRepository;

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::tenant::TenantRepository;
pub use repository::transaction::TransactionRepository;
