//! # Error Types
//!
//! Domain-specific error types for stockledger-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockledger-core errors (this file)                                   │
//! │  ├── CoreError        - Ledger rule violations, policy failures        │
//! │  └── ValidationError  - Catalog input validation failures              │
//! │                                                                         │
//! │  stockledger-db errors (separate crate)                                │
//! │  └── DbError          - Storage failures, DuplicateKey, Contention     │
//! │                         (wraps CoreError as DbError::Domain)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries the entity and quantities involved so the caller
//! can render "only 3 units available" without a second lookup.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger and policy errors.
///
/// All of these are detected before any mutation is written, so a caller
/// receiving one can rely on the store being unchanged.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product was soft-deactivated and no longer accepts ledger entries.
    #[error("Product {0} is inactive")]
    ProductInactive(String),

    /// Category id does not exist in the tenant.
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Sale id does not exist in the tenant.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Trying to sell more than is on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// record_sale(qty: 5)
    ///      │
    ///      ▼
    /// Lock product row, read quantity = 3
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Lager", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 units of Lager available"
    /// ```
    #[error("Insufficient stock for {name} ({product_id}): only {available} units available, requested {requested}")]
    InsufficientStock {
        product_id: String,
        name: String,
        available: i64,
        requested: i64,
    },

    /// Refunding more containers than are recorded as outstanding.
    #[error("Cannot refund {requested} containers of {name} ({product_id}): only {outstanding} outstanding")]
    ExceedsOutstanding {
        product_id: String,
        name: String,
        outstanding: i64,
        requested: i64,
    },

    /// Deposit operation on a product that carries no deposit.
    #[error("Product {name} ({product_id}) is not returnable")]
    NotReturnable { product_id: String, name: String },

    /// Catalog edit that would drop a returnable flag while customers
    /// still hold deposit-bearing containers.
    #[error("Cannot make {name} ({product_id}) non-returnable: {outstanding} containers still outstanding")]
    ContainersOutstanding {
        product_id: String,
        name: String,
        outstanding: i64,
    },

    /// Actor's role or tenant does not permit the operation.
    #[error("Forbidden: {actor} may not perform {operation}")]
    Forbidden { actor: String, operation: String },

    /// Referenced entity belongs to a different tenant than the request.
    #[error("{entity} {id} belongs to a different tenant than {tenant_id}")]
    TenantMismatch {
        entity: String,
        id: String,
        tenant_id: String,
    },

    /// Quantity is zero, negative, or beyond the per-line maximum.
    #[error("Invalid quantity {quantity}: must be between 1 and {max}")]
    InvalidQuantity { quantity: i64, max: i64 },

    /// Checkout with no line items.
    #[error("A sale needs at least one line item")]
    EmptySale,

    /// A checkout line failed; the whole sale was rolled back.
    #[error("Checkout line {index} (product {product_id}) failed: {source}")]
    CheckoutLineFailed {
        index: usize,
        product_id: String,
        #[source]
        source: Box<CoreError>,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Builds a `Forbidden` error from displayable parts.
    pub fn forbidden(actor: impl Into<String>, operation: impl std::fmt::Display) -> Self {
        CoreError::Forbidden {
            actor: actor.into(),
            operation: operation.to_string(),
        }
    }

    /// Builds a `TenantMismatch` error.
    pub fn tenant_mismatch(
        entity: impl Into<String>,
        id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        CoreError::TenantMismatch {
            entity: entity.into(),
            id: id.into(),
            tenant_id: tenant_id.into(),
        }
    }

    /// Attributes `source` to checkout line `index`.
    pub fn line_failed(index: usize, product_id: impl Into<String>, source: CoreError) -> Self {
        CoreError::CheckoutLineFailed {
            index,
            product_id: product_id.into(),
            source: Box::new(source),
        }
    }

    /// Unwraps `CheckoutLineFailed` to the underlying line error.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::CheckoutLineFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for catalog writes.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Deposit does not agree with the returnable flag.
    #[error("Deposit amount must be {expected} for {kind} products")]
    DepositMismatch {
        expected: &'static str,
        kind: &'static str,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_available_units() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            name: "Lager".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Lager (p-1): only 3 units available, requested 5"
        );
    }

    #[test]
    fn test_exceeds_outstanding_message_states_count() {
        let err = CoreError::ExceedsOutstanding {
            product_id: "p-1".to_string(),
            name: "Lager".to_string(),
            outstanding: 12,
            requested: 999,
        };
        assert!(err.to_string().contains("only 12 outstanding"));
    }

    #[test]
    fn test_checkout_line_root() {
        let inner = CoreError::InsufficientStock {
            product_id: "p-2".to_string(),
            name: "Cola".to_string(),
            available: 1,
            requested: 1000,
        };
        let err = CoreError::CheckoutLineFailed {
            index: 1,
            product_id: "p-2".to_string(),
            source: Box::new(inner),
        };
        assert!(matches!(err.root(), CoreError::InsufficientStock { available: 1, .. }));
        assert!(err.to_string().starts_with("Checkout line 1 (product p-2) failed"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
