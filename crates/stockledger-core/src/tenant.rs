//! # Tenant Context
//!
//! The active tenant of a request, built by the caller and handed to every
//! repository and engine call.
//!
//! ```text
//! API layer ── resolves tenant from host/session ──► TenantContext::new(id)
//!                                                        │
//!             every call: ledger.record_sale(&ctx, &actor, ...)
//! ```
//!
//! There is no "current tenant" anywhere else: no global, no thread-local,
//! nothing hanging off the database connection.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Identifies the tenant an operation runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    tenant_id: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        TenantContext {
            tenant_id: tenant_id.into(),
        }
    }

    #[inline]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Fails with `TenantMismatch` unless `owner_tenant_id` is this tenant.
    ///
    /// ```rust
    /// use stockledger_core::TenantContext;
    ///
    /// let ctx = TenantContext::new("acme");
    /// assert!(ctx.ensure_owns("Product", "p-1", "acme").is_ok());
    /// assert!(ctx.ensure_owns("Product", "p-1", "globex").is_err());
    /// ```
    pub fn ensure_owns(&self, entity: &str, id: &str, owner_tenant_id: &str) -> CoreResult<()> {
        if owner_tenant_id == self.tenant_id {
            Ok(())
        } else {
            Err(CoreError::tenant_mismatch(entity, id, &self.tenant_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_names_entity_and_request_tenant() {
        let ctx = TenantContext::new("acme");
        let err = ctx.ensure_owns("Product", "p-9", "globex").unwrap_err();
        match err {
            CoreError::TenantMismatch { entity, id, tenant_id } => {
                assert_eq!(entity, "Product");
                assert_eq!(id, "p-9");
                assert_eq!(tenant_id, "acme");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
