//! # Authorization Policy
//!
//! Role-based gating of every ledger, catalog and reporting operation.
//!
//! ## Permission Table
//! ```text
//! ┌──────────────────────────┬─────────┬─────────┬───────────┬───────┐
//! │ Operation                │ Manager │ Cashier │ Warehouse │ Other │
//! ├──────────────────────────┼─────────┼─────────┼───────────┼───────┤
//! │ RecordSale               │    ✓    │    ✓    │           │       │
//! │ Checkout                 │    ✓    │    ✓    │           │       │
//! │ RecordDepositRefund      │    ✓    │    ✓    │           │       │
//! │ RecordDepositCollected   │    ✓    │         │           │       │
//! │ RecordRestock            │    ✓    │         │           │       │
//! │ ManageCatalog            │    ✓    │         │           │       │
//! │ ViewCatalog              │    ✓    │    ✓    │           │       │
//! │ ViewLedger               │    ✓    │    ✓    │           │       │
//! │ ViewReports              │    ✓    │         │           │       │
//! └──────────────────────────┴─────────┴─────────┴───────────┴───────┘
//! ```
//!
//! A superuser passes every check for every tenant. Anyone else must belong
//! to the tenant named by the request's [`TenantContext`].

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::tenant::TenantContext;

// =============================================================================
// Role
// =============================================================================

/// The closed set of staff roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    Cashier,
    Warehouse,
    /// Any role string the ledger does not know.
    Other,
}

impl Role {
    /// Parses an external role string; unknown values become `Other`.
    pub fn parse(role: &str) -> Role {
        match role.trim().to_ascii_lowercase().as_str() {
            "manager" => Role::Manager,
            "cashier" => Role::Cashier,
            "warehouse" => Role::Warehouse,
            _ => Role::Other,
        }
    }

    /// Whether this role may perform `op` (ignoring tenant scoping).
    pub const fn permits(&self, op: Operation) -> bool {
        match self {
            Role::Manager => true,
            Role::Cashier => matches!(
                op,
                Operation::RecordSale
                    | Operation::Checkout
                    | Operation::RecordDepositRefund
                    | Operation::ViewCatalog
                    | Operation::ViewLedger
            ),
            Role::Warehouse | Role::Other => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Cashier => "cashier",
            Role::Warehouse => "warehouse",
            Role::Other => "other",
        }
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::parse(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Operation
// =============================================================================

/// Operation classes checked by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    RecordSale,
    RecordRestock,
    RecordDepositRefund,
    RecordDepositCollected,
    Checkout,
    ManageCatalog,
    ViewCatalog,
    /// Reading sale and transaction history.
    ViewLedger,
    ViewReports,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::RecordSale => "record_sale",
            Operation::RecordRestock => "record_restock",
            Operation::RecordDepositRefund => "record_deposit_refund",
            Operation::RecordDepositCollected => "record_deposit_collected",
            Operation::Checkout => "checkout",
            Operation::ManageCatalog => "manage_catalog",
            Operation::ViewCatalog => "view_catalog",
            Operation::ViewLedger => "view_ledger",
            Operation::ViewReports => "view_reports",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Actor
// =============================================================================

/// The authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    /// Company the user belongs to; `None` for platform accounts.
    pub tenant_id: Option<String>,
    /// Platform administration capability; bypasses tenant scoping.
    pub is_superuser: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role, tenant_id: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            role,
            tenant_id: Some(tenant_id.into()),
            is_superuser: false,
        }
    }

    pub fn superuser(id: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            role: Role::Manager,
            tenant_id: None,
            is_superuser: true,
        }
    }

    fn belongs_to(&self, ctx: &TenantContext) -> bool {
        self.tenant_id.as_deref() == Some(ctx.tenant_id())
    }
}

/// Approves or rejects `op` for `actor` in `ctx`.
///
/// Pure and cheap; every engine entry point calls this before it opens a
/// storage transaction.
///
/// ```rust
/// use stockledger_core::{authorize, Actor, Operation, Role, TenantContext};
///
/// let ctx = TenantContext::new("acme");
/// let cashier = Actor::new("u-1", Role::Cashier, "acme");
///
/// assert!(authorize(&ctx, &cashier, Operation::RecordSale).is_ok());
/// assert!(authorize(&ctx, &cashier, Operation::RecordRestock).is_err());
/// ```
pub fn authorize(ctx: &TenantContext, actor: &Actor, op: Operation) -> CoreResult<()> {
    if actor.is_superuser {
        return Ok(());
    }

    if !actor.belongs_to(ctx) {
        return Err(CoreError::forbidden(
            format!("{} (outside tenant {})", actor.id, ctx.tenant_id()),
            op,
        ));
    }

    if actor.role.permits(op) {
        Ok(())
    } else {
        Err(CoreError::forbidden(format!("{} ({})", actor.id, actor.role), op))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
